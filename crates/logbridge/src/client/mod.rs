//!
//! # Wire Client
//!
//! Low level exchanges with a single partition leader.
//!

mod wire;

use async_trait::async_trait;

use logbridge_protocol::record::ConsumerRecord;
use logbridge_types::Offset as RawOffset;
use logbridge_types::PartitionId;

use crate::metadata::BrokerEndpoint;
use crate::PartitionOffsets;
use crate::Result;

pub use self::wire::WireClient;

/// One bounded fetch against a partition leader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub topic: String,
    pub partition: PartitionId,
    pub leader: BrokerEndpoint,
    pub offset: RawOffset,
    /// soft cap, a single batch larger than this is still returned
    pub max_bytes: i32,
}

#[derive(Debug, Default, Clone)]
pub struct FetchResult {
    pub records: Vec<ConsumerRecord>,
    /// offset after the last returned record, or the requested offset if none
    pub next_offset: RawOffset,
    pub high_watermark: RawOffset,
}

impl FetchResult {
    pub fn empty(offset: RawOffset, high_watermark: RawOffset) -> Self {
        Self {
            records: vec![],
            next_offset: offset,
            high_watermark,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Fetch side of the broker protocol, as used by the partition reader
#[async_trait]
pub trait Fetcher: Send {
    async fn fetch(&mut self, request: &FetchRequest) -> Result<FetchResult>;

    async fn fetch_offsets(
        &mut self,
        topic: &str,
        partition: PartitionId,
        leader: &BrokerEndpoint,
    ) -> Result<PartitionOffsets>;
}
