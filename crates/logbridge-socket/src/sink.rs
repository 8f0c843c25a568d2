use std::fmt;
use std::fmt::Debug;

use futures_util::SinkExt;
use kafka_protocol::protocol::Encodable;
use tokio::net::tcp::OwnedWriteHalf;
use tokio_util::codec::FramedWrite;
use tracing::instrument;
use tracing::trace;

use logbridge_protocol::api::Request;
use logbridge_protocol::api::RequestMessage;
use logbridge_protocol::api::ResponseMessage;
use logbridge_protocol::codec::BridgeCodec;

use crate::SocketError;

type SinkFrame = FramedWrite<OwnedWriteHalf, BridgeCodec>;

pub struct BrokerSink {
    inner: SinkFrame,
    id: String,
}

impl fmt::Debug for BrokerSink {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Sink({})", self.id)
    }
}

impl BrokerSink {
    pub fn new(sink: OwnedWriteHalf, id: String) -> Self {
        Self {
            inner: SinkFrame::new(sink, BridgeCodec::new()),
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// as client, send request to server
    #[instrument(level = "trace", skip(req_msg), fields(req = ?req_msg))]
    pub async fn send_request<R>(&mut self, req_msg: &RequestMessage<R>) -> Result<(), SocketError>
    where
        R: Request,
    {
        let frame = req_msg.encode_frame().map_err(|source| SocketError::Io {
            source,
            msg: "encoding request".to_string(),
        })?;
        self.inner.send(frame).await?;
        Ok(())
    }

    /// as server, send back response
    #[instrument(level = "trace", skip(resp_msg))]
    pub async fn send_response<P>(
        &mut self,
        resp_msg: &ResponseMessage<P>,
        version: i16,
    ) -> Result<(), SocketError>
    where
        P: Encodable + Debug,
    {
        trace!("sending response {:#?}", &resp_msg);
        let frame = resp_msg.encode_frame(version).map_err(|source| SocketError::Io {
            source,
            msg: "encoding response".to_string(),
        })?;
        self.inner.send(frame).await?;
        Ok(())
    }
}
