use std::io::Error as IoError;

use logbridge_protocol::link::ErrorCode;
use logbridge_socket::SocketError;
use logbridge_types::Offset;
use logbridge_types::PartitionId;

use crate::config::ConfigError;

pub type Result<T, E = BridgeError> = core::result::Result<T, E>;

/// Possible errors that may arise when reading from or writing to a broker
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("socket error on {endpoint}: {source}")]
    Socket {
        endpoint: String,
        #[source]
        source: SocketError,
    },
    #[error("{endpoint} is not the leader of {topic}-{partition}")]
    StaleLeader {
        topic: String,
        partition: PartitionId,
        endpoint: String,
    },
    #[error("failed to decode records of {topic}-{partition}: {source}")]
    Decode {
        topic: String,
        partition: PartitionId,
        #[source]
        source: IoError,
    },
    #[error("Topic not found: {0}")]
    TopicNotFound(String),
    #[error("Partition not found: {0}-{1}")]
    PartitionNotFound(String, PartitionId),
    #[error("No leader available for {0}-{1}")]
    LeaderNotAvailable(String, PartitionId),
    #[error("offset {offset} is out of range for {topic}-{partition}")]
    OffsetOutOfRange {
        topic: String,
        partition: PartitionId,
        offset: Offset,
    },
    #[error("broker error on {topic}-{partition}: {code}")]
    Broker {
        topic: String,
        partition: PartitionId,
        code: ErrorCode,
    },
    #[error("failed to publish to {topic}-{partition}: {code}")]
    Publish {
        topic: String,
        partition: PartitionId,
        code: ErrorCode,
    },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Attempted to create negative offset: {0}")]
    NegativeOffset(i64),
    #[error("next offsets are only known after a complete read pass")]
    NotEvaluated,
    #[error("execution unit did not complete: {0}")]
    Execution(String),
}

/// Coarse classification of [`BridgeError`], used for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Decode,
    Metadata,
    Publish,
    Config,
    Execution,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Socket { .. } | Self::StaleLeader { .. } => ErrorKind::Connection,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::TopicNotFound(_)
            | Self::PartitionNotFound(..)
            | Self::LeaderNotAvailable(..)
            | Self::OffsetOutOfRange { .. }
            | Self::Broker { .. } => ErrorKind::Metadata,
            Self::Publish { .. } => ErrorKind::Publish,
            Self::Config(_) | Self::NegativeOffset(_) => ErrorKind::Config,
            Self::NotEvaluated | Self::Execution(_) => ErrorKind::Execution,
        }
    }

    /// Connection errors are worth retrying after re-resolving the leader.
    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }

    /// Socket failures while talking to `endpoint` about a partition.
    /// A response that arrived but could not be decoded is a decode error, not a connection one.
    pub(crate) fn from_socket(
        err: SocketError,
        endpoint: &str,
        topic: &str,
        partition: PartitionId,
    ) -> Self {
        match err {
            SocketError::Decode { source, .. } => Self::Decode {
                topic: topic.to_owned(),
                partition,
                source,
            },
            source => Self::Socket {
                endpoint: endpoint.to_owned(),
                source,
            },
        }
    }

    /// Maps a per partition broker error code onto the matching variant.
    pub(crate) fn from_code(
        code: ErrorCode,
        topic: &str,
        partition: PartitionId,
        endpoint: &str,
        offset: Offset,
    ) -> Self {
        match code {
            ErrorCode::NotLeaderForPartition => Self::StaleLeader {
                topic: topic.to_owned(),
                partition,
                endpoint: endpoint.to_owned(),
            },
            ErrorCode::UnknownTopicOrPartition => {
                Self::PartitionNotFound(topic.to_owned(), partition)
            }
            ErrorCode::LeaderNotAvailable => Self::LeaderNotAvailable(topic.to_owned(), partition),
            ErrorCode::OffsetOutOfRange => Self::OffsetOutOfRange {
                topic: topic.to_owned(),
                partition,
                offset,
            },
            code => Self::Broker {
                topic: topic.to_owned(),
                partition,
                code,
            },
        }
    }
}
