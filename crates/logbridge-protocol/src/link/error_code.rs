//!
//! # Broker Error Codes
//!
//! Codes a broker returns per partition in fetch, offset, metadata and produce responses.
//!

#[derive(thiserror::Error, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum ErrorCode {
    #[error("an unknown server error occurred")]
    UnknownServerError,

    // Not an error
    #[error("no error")]
    #[default]
    None,

    #[error("offset is outside the range of the partition log")]
    OffsetOutOfRange,

    #[error("record batch failed its checksum or is otherwise corrupt")]
    CorruptMessage,

    #[error("topic or partition is not known to the broker")]
    UnknownTopicOrPartition,

    #[error("partition has no leader")]
    LeaderNotAvailable,

    #[error("broker is not the leader for the partition")]
    NotLeaderForPartition,

    #[error("request timed out")]
    RequestTimedOut,

    #[error("message is larger than the broker accepts")]
    MessageTooLarge,

    #[error("unrecognized error code {0}")]
    Other(i16),
}

impl ErrorCode {
    pub fn code(&self) -> i16 {
        match self {
            Self::UnknownServerError => -1,
            Self::None => 0,
            Self::OffsetOutOfRange => 1,
            Self::CorruptMessage => 2,
            Self::UnknownTopicOrPartition => 3,
            Self::LeaderNotAvailable => 5,
            Self::NotLeaderForPartition => 6,
            Self::RequestTimedOut => 7,
            Self::MessageTooLarge => 10,
            Self::Other(code) => *code,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn is_error(&self) -> bool {
        !self.is_ok()
    }
}

impl From<i16> for ErrorCode {
    fn from(code: i16) -> Self {
        match code {
            -1 => Self::UnknownServerError,
            0 => Self::None,
            1 => Self::OffsetOutOfRange,
            2 => Self::CorruptMessage,
            3 => Self::UnknownTopicOrPartition,
            5 => Self::LeaderNotAvailable,
            6 => Self::NotLeaderForPartition,
            7 => Self::RequestTimedOut,
            10 => Self::MessageTooLarge,
            other => Self::Other(other),
        }
    }
}

impl From<ErrorCode> for i16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

#[cfg(test)]
mod test {

    use super::ErrorCode;

    #[test]
    fn test_error_code_from_wire() {
        let code = ErrorCode::from(6);
        assert_eq!(code, ErrorCode::NotLeaderForPartition);
        assert!(code.is_error());
        assert_eq!(i16::from(code), 6);
    }

    #[test]
    fn test_unrecognized_code_is_preserved() {
        let code = ErrorCode::from(87);
        assert_eq!(code, ErrorCode::Other(87));
        assert_eq!(code.code(), 87);
        assert!(ErrorCode::default().is_ok());
    }
}
