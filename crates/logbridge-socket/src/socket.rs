use std::fmt;
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;
use tracing::instrument;

use logbridge_protocol::api::Request;
use logbridge_protocol::api::RequestMessage;
use logbridge_protocol::api::ResponseMessage;
use logbridge_types::defaults::LOGBRIDGE_CONNECTION_RETRIES;

use super::SocketError;
use crate::BrokerSink;
use crate::BrokerStream;

static CONNECTION_RETRIES: Lazy<u64> = Lazy::new(|| {
    use std::env;

    let var_value = env::var(LOGBRIDGE_CONNECTION_RETRIES).unwrap_or_default();
    var_value.parse().unwrap_or(0)
});

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Socket abstract that can send and receive broker messages.
/// Every exchange is bounded by the socket timeout.
pub struct BrokerSocket {
    sink: BrokerSink,
    stream: BrokerStream,
    request_timeout: Duration,
    correlation_id: i32,
}

impl fmt::Debug for BrokerSocket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Socket({})", self.id())
    }
}

impl BrokerSocket {
    pub fn new(sink: BrokerSink, stream: BrokerStream, request_timeout: Duration) -> Self {
        Self {
            sink,
            stream,
            request_timeout,
            correlation_id: 0,
        }
    }

    pub fn split(self) -> (BrokerSink, BrokerStream) {
        (self.sink, self.stream)
    }

    pub fn get_mut_sink(&mut self) -> &mut BrokerSink {
        &mut self.sink
    }

    pub fn get_mut_stream(&mut self) -> &mut BrokerStream {
        &mut self.stream
    }

    pub fn id(&self) -> &str {
        self.sink.id()
    }

    pub fn from_tcp(tcp_stream: TcpStream, request_timeout: Duration) -> Self {
        let id = tcp_stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_owned());
        let (read, write) = tcp_stream.into_split();
        Self::new(
            BrokerSink::new(write, id.clone()),
            BrokerStream::new(id, read),
            request_timeout,
        )
    }

    /// connect to target address, giving up after the socket timeout
    #[instrument]
    pub async fn connect(addr: &str, request_timeout: Duration) -> Result<Self, SocketError> {
        let mut attempt = 0;

        let tcp_stream = loop {
            debug!("trying to connect to addr at: {}", addr);
            let result = match timeout(request_timeout, TcpStream::connect(addr)).await {
                Ok(result) => result.map_err(|source| SocketError::Io {
                    source,
                    msg: format!("connecting to {addr}"),
                }),
                Err(_) => Err(SocketError::Timeout(request_timeout)),
            };

            match result {
                Err(err) if attempt < *CONNECTION_RETRIES => {
                    debug!(%err, "failed attempt {} to connect to {}", attempt + 1, addr);
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                res => break res?,
            }
        };
        tcp_stream.set_nodelay(true)?;
        Ok(Self::from_tcp(tcp_stream, request_timeout))
    }

    /// as client, send request and wait for reply from server
    pub async fn send<R>(
        &mut self,
        req_msg: &mut RequestMessage<R>,
    ) -> Result<ResponseMessage<R::Response>, SocketError>
    where
        R: Request,
    {
        self.correlation_id = self.correlation_id.wrapping_add(1);
        req_msg.set_correlation_id(self.correlation_id);

        let request_timeout = self.request_timeout;
        let sink = &mut self.sink;
        let stream = &mut self.stream;
        let exchange = async move {
            sink.send_request(req_msg).await?;
            stream.next_response(req_msg).await
        };
        match timeout(request_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(SocketError::Timeout(request_timeout)),
        }
    }
}

impl From<(BrokerSink, BrokerStream, Duration)> for BrokerSocket {
    fn from(parts: (BrokerSink, BrokerStream, Duration)) -> Self {
        let (sink, stream, request_timeout) = parts;
        Self::new(sink, stream, request_timeout)
    }
}
