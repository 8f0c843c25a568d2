use std::io::Error as IoError;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum SocketError {
    #[error("socket {msg}")]
    Io { source: IoError, msg: String },
    #[error("Socket closed")]
    SocketClosed,
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {msg}")]
    Decode { source: IoError, msg: String },
    #[error("response correlation id {actual} does not match request {expected}")]
    CorrelationMismatch { expected: i32, actual: i32 },
}

impl SocketError {
    /// true if the response arrived but could not be understood
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

impl From<IoError> for SocketError {
    fn from(err: IoError) -> Self {
        SocketError::Io {
            source: err,
            msg: "".to_string(),
        }
    }
}
