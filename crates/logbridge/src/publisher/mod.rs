//!
//! # Topic Publisher
//!
//! Buffers records per partition and appends them to the partition leaders.
//!

mod partitioning;

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use kafka_protocol::records::Record;
use tracing::debug;
use tracing::instrument;

use logbridge_protocol::record::NO_TIMESTAMP;
use logbridge_protocol::record::new_record;
use logbridge_types::PartitionId;

use crate::client::WireClient;
use crate::config::PublishConfig;
use crate::metadata::ClusterMetadata;
use crate::metadata::TopicPartitions;
use crate::BridgeError;
use crate::Result;

pub use self::partitioning::Partitioner;
pub use self::partitioning::PartitionerConfig;
pub use self::partitioning::SiphashRoundRobinPartitioner;

/// Publishes records to one topic.
///
/// Records are buffered per partition and sent once `batch_size` of them are
/// waiting, or on [`TopicPublisher::flush`]. Buffered records that were never
/// flushed are discarded by [`TopicPublisher::close`].
pub struct TopicPublisher {
    topic: String,
    partitions: TopicPartitions,
    partitioner_config: PartitionerConfig,
    config: PublishConfig,
    client: WireClient,
    buffers: BTreeMap<PartitionId, Vec<Record>>,
    sent: usize,
}

impl fmt::Debug for TopicPublisher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TopicPublisher")
            .field("topic", &self.topic)
            .field("partitions", &self.partitioner_config.partition_count)
            .field("sent", &self.sent)
            .finish()
    }
}

impl TopicPublisher {
    /// Looks up the partition leaders of `topic`.
    #[instrument(skip(config))]
    pub async fn connect(topic: &str, config: &PublishConfig) -> Result<Self> {
        let partitions = ClusterMetadata::new(config.connection.clone())
            .topic_partitions(topic)
            .await?;
        let partition_count = partitions.partitions.len() as i32;
        debug!(partition_count, "publisher connected");
        Ok(Self {
            topic: topic.to_owned(),
            partitions,
            partitioner_config: PartitionerConfig { partition_count },
            config: config.clone(),
            client: WireClient::new(config.connection.clone()),
            buffers: BTreeMap::new(),
            sent: 0,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// records acknowledged by the leaders so far
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Queues one record; the partitioner picks its partition.
    pub async fn send(&mut self, key: Option<Bytes>, value: Bytes) -> Result<PartitionId> {
        let partition = self.config.partitioner.partition(
            &self.partitioner_config,
            key.as_deref(),
            &value,
        );
        let buffer = self.buffers.entry(partition).or_default();
        let record = new_record(buffer.len() as i64, key, value, NO_TIMESTAMP);
        buffer.push(record);
        if buffer.len() >= self.config.batch_size {
            self.flush_partition(partition).await?;
        }
        Ok(partition)
    }

    /// Sends every buffered record.
    pub async fn flush(&mut self) -> Result<()> {
        let pending: Vec<PartitionId> = self
            .buffers
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(partition, _)| *partition)
            .collect();
        for partition in pending {
            self.flush_partition(partition).await?;
        }
        Ok(())
    }

    async fn flush_partition(&mut self, partition: PartitionId) -> Result<()> {
        let records = self.buffers.remove(&partition).unwrap_or_default();
        if records.is_empty() {
            return Ok(());
        }
        let leader = self
            .partitions
            .leader(partition)
            .cloned()
            .ok_or_else(|| BridgeError::PartitionNotFound(self.topic.clone(), partition))?;
        let count = records.len();
        self.client
            .produce(&self.topic, partition, &leader, records)
            .await?;
        self.sent += count;
        Ok(())
    }

    /// Releases the leader connections. Returns how many records were sent.
    pub fn close(self) -> usize {
        let discarded: usize = self.buffers.values().map(Vec::len).sum();
        if discarded > 0 {
            debug!(topic = %self.topic, discarded, "closing publisher with unsent records");
        }
        self.sent
    }
}
