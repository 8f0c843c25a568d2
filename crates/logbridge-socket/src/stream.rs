use std::fmt;
use std::fmt::Debug;

use futures_util::StreamExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio_util::codec::FramedRead;
use tracing::debug;
use tracing::error;
use tracing::trace;

use logbridge_protocol::api::RawRequest;
use logbridge_protocol::api::Request;
use logbridge_protocol::api::RequestMessage;
use logbridge_protocol::api::ResponseMessage;
use logbridge_protocol::codec::BridgeCodec;

use crate::SocketError;

type FrameStream = FramedRead<OwnedReadHalf, BridgeCodec>;

pub struct BrokerStream {
    inner: FrameStream,
    id: String,
}

impl Debug for BrokerStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Stream({})", self.id)
    }
}

impl BrokerStream {
    pub fn new(id: String, stream: OwnedReadHalf) -> Self {
        Self {
            inner: FramedRead::new(stream, BridgeCodec::new()),
            id,
        }
    }

    /// as server, get next request from client with only its header decoded
    pub async fn next_request_item(&mut self) -> Option<Result<RawRequest, SocketError>> {
        let next = self.inner.next().await?;
        Some(match next {
            Ok(req_bytes) => {
                trace!("received bytes from client len: {}", req_bytes.len());
                RawRequest::decode_frame(req_bytes.freeze()).map_err(|source| {
                    SocketError::Decode {
                        source,
                        msg: "request".to_string(),
                    }
                })
            }
            Err(source) => Err(SocketError::Io {
                source,
                msg: "request stream".to_string(),
            }),
        })
    }

    /// as client, get next response from server
    pub async fn next_response<R>(
        &mut self,
        req_msg: &RequestMessage<R>,
    ) -> Result<ResponseMessage<R::Response>, SocketError>
    where
        R: Request,
    {
        trace!(api = ?R::API_KEY, "waiting for response");
        match self.inner.next().await {
            Some(Ok(resp_bytes)) => {
                let len = resp_bytes.len();
                let response = req_msg
                    .decode_response(resp_bytes.freeze())
                    .map_err(|source| SocketError::Decode {
                        source,
                        msg: std::any::type_name::<R::Response>().to_string(),
                    })?;
                trace!(len, "received response");
                let expected = req_msg.correlation_id();
                if response.correlation_id != expected {
                    return Err(SocketError::CorrelationMismatch {
                        expected,
                        actual: response.correlation_id,
                    });
                }
                Ok(response)
            }
            Some(Err(source)) => {
                error!("error receiving response: {:?}", source);
                Err(SocketError::Io {
                    source,
                    msg: "next response".to_string(),
                })
            }
            None => {
                debug!("no more response. server has terminated connection");
                Err(SocketError::SocketClosed)
            }
        }
    }
}
