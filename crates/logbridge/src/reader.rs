//!
//! # Partition Reader
//!
//! Sequential bounded fetches over one partition, starting at a known offset.
//!

use tracing::debug;
use tracing::instrument;
use tracing::warn;

use logbridge_protocol::record::ConsumerRecord;
use logbridge_types::Offset as RawOffset;
use logbridge_types::PartitionId;

use crate::client::FetchRequest;
use crate::client::Fetcher;
use crate::config::MAX_FETCH_BYTES;
use crate::metadata::BrokerEndpoint;
use crate::metadata::LeaderResolver;
use crate::Result;

/// Records read from one partition and where the next read should start
#[derive(Debug, Default)]
pub struct PartitionRead {
    pub records: Vec<ConsumerRecord>,
    pub next_offset: RawOffset,
}

/// Reads a partition from a start offset until the leader has nothing more
/// or the record limit is reached.
///
/// A connection error triggers one leader lookup and a retry at the same
/// offset. Failing again at that offset ends the read.
pub struct PartitionReader<F, L> {
    topic: String,
    partition: PartitionId,
    leader: BrokerEndpoint,
    fetcher: F,
    resolver: L,
    max_bytes: i32,
    record_limit: Option<usize>,
}

impl<F, L> PartitionReader<F, L>
where
    F: Fetcher,
    L: LeaderResolver,
{
    pub fn new(
        topic: impl Into<String>,
        partition: PartitionId,
        leader: BrokerEndpoint,
        fetcher: F,
        resolver: L,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            leader,
            fetcher,
            resolver,
            max_bytes: *MAX_FETCH_BYTES,
            record_limit: None,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: i32) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_record_limit(mut self, record_limit: Option<usize>) -> Self {
        self.record_limit = record_limit;
        self
    }

    /// current leader, updated after re-resolution
    pub fn leader(&self) -> &BrokerEndpoint {
        &self.leader
    }

    #[instrument(skip(self), fields(topic = %self.topic, partition = self.partition))]
    pub async fn read(&mut self, start: RawOffset) -> Result<PartitionRead> {
        let mut records: Vec<ConsumerRecord> = vec![];
        let mut offset = start;
        let mut retried = false;

        loop {
            if self.limit_reached(records.len()) {
                break;
            }

            let request = FetchRequest {
                topic: self.topic.clone(),
                partition: self.partition,
                leader: self.leader.clone(),
                offset,
                max_bytes: self.max_bytes,
            };
            match self.fetcher.fetch(&request).await {
                Ok(result) => {
                    retried = false;
                    if result.is_empty() {
                        debug!(offset, high_watermark = result.high_watermark, "partition drained");
                        break;
                    }
                    debug!(offset, records = result.len(), next_offset = result.next_offset, "fetch done");
                    offset = result.next_offset;
                    records.extend(result.records);
                }
                Err(err) if err.is_retriable() && !retried => {
                    warn!(%err, offset, leader = %self.leader, "fetch failed, resolving leader again");
                    retried = true;
                    self.leader = self.resolver.resolve_leader(&self.topic, self.partition).await?;
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(limit) = self.record_limit {
            records.truncate(limit);
        }
        let next_offset = records.last().map(|record| record.offset + 1).unwrap_or(start);
        debug!(records = records.len(), next_offset, "partition read complete");
        Ok(PartitionRead {
            records,
            next_offset,
        })
    }

    fn limit_reached(&self, read: usize) -> bool {
        self.record_limit.is_some_and(|limit| read >= limit)
    }
}
