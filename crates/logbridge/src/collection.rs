//!
//! # Topic Collection
//!
//! A topic read as a distributed collection, one slice per partition.
//!

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use tracing::info;
use tracing::instrument;

use logbridge_protocol::record::ConsumerRecord;
use logbridge_types::Offset as RawOffset;
use logbridge_types::PartitionId;

use crate::client::Fetcher;
use crate::client::WireClient;
use crate::config::ReadConfig;
use crate::engine::DistributedCollection;
use crate::metadata::BrokerEndpoint;
use crate::metadata::ClusterMetadata;
use crate::reader::PartitionReader;
use crate::BridgeError;
use crate::Offset;
use crate::Result;

/// Offset after the last record read, per partition
pub type NextOffsets = BTreeMap<PartitionId, RawOffset>;

/// What to read: a topic, explicit start offsets, and where to start the other partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSpec {
    pub topic: String,
    pub offsets: BTreeMap<PartitionId, RawOffset>,
    pub default_start: Offset,
}

impl ReadSpec {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            offsets: BTreeMap::new(),
            default_start: Offset::beginning(),
        }
    }

    /// Resume from the end offsets of a previous pass.
    pub fn from_next_offsets(topic: impl Into<String>, next: NextOffsets) -> Self {
        Self::new(topic).with_offsets(next)
    }

    pub fn with_offsets(mut self, offsets: BTreeMap<PartitionId, RawOffset>) -> Self {
        self.offsets = offsets;
        self
    }

    pub fn with_offset(mut self, partition: PartitionId, offset: RawOffset) -> Self {
        self.offsets.insert(partition, offset);
        self
    }

    pub fn with_default_start(mut self, default_start: Offset) -> Self {
        self.default_start = default_start;
        self
    }
}

/// One partition of one read pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSlice {
    pub topic: String,
    pub partition: PartitionId,
    pub leader: BrokerEndpoint,
    pub start_offset: RawOffset,
    pass: u64,
}

#[derive(Debug, Default)]
struct PassTracker {
    pass: u64,
    expected: usize,
    next_offsets: NextOffsets,
    failed: bool,
}

impl PassTracker {
    fn start(&mut self, expected: usize) -> u64 {
        self.pass += 1;
        self.expected = expected;
        self.next_offsets.clear();
        self.failed = false;
        self.pass
    }

    fn complete(&mut self, pass: u64, partition: PartitionId, next_offset: RawOffset) {
        if pass == self.pass {
            self.next_offsets.insert(partition, next_offset);
        }
    }

    fn fail(&mut self, pass: u64) {
        if pass == self.pass {
            self.failed = true;
        }
    }

    fn finished(&self) -> Option<&NextOffsets> {
        let done = self.pass > 0 && !self.failed && self.next_offsets.len() == self.expected;
        done.then_some(&self.next_offsets)
    }
}

/// Records of a topic as a [`DistributedCollection`].
///
/// Every evaluation plans again from the [`ReadSpec`]. Clones share the pass
/// tracker, so [`TopicCollection::next_offsets`] can be asked through any clone,
/// including one wrapped by an adapter.
#[derive(Debug, Clone)]
pub struct TopicCollection {
    spec: ReadSpec,
    config: ReadConfig,
    tracker: Arc<Mutex<PassTracker>>,
}

impl TopicCollection {
    pub fn new(spec: ReadSpec, config: ReadConfig) -> Self {
        Self {
            spec,
            config,
            tracker: Arc::new(Mutex::new(PassTracker::default())),
        }
    }

    pub fn spec(&self) -> &ReadSpec {
        &self.spec
    }

    /// End offsets of the latest pass. Only available once every partition of
    /// that pass has been read without failure.
    pub fn next_offsets(&self) -> Result<NextOffsets> {
        self.tracker
            .lock()
            .finished()
            .cloned()
            .ok_or(BridgeError::NotEvaluated)
    }
}

#[async_trait]
impl DistributedCollection for TopicCollection {
    type Item = ConsumerRecord;
    type Slice = PartitionSlice;

    #[instrument(skip(self), fields(topic = %self.spec.topic))]
    async fn slices(&self) -> Result<Vec<PartitionSlice>> {
        let topic = &self.spec.topic;
        let connection = &self.config.connection;
        let partitions = ClusterMetadata::new(connection.clone())
            .topic_partitions(topic)
            .await?;

        for (partition, offset) in &self.spec.offsets {
            if partitions.leader(*partition).is_none() {
                return Err(BridgeError::PartitionNotFound(topic.clone(), *partition));
            }
            if *offset < 0 {
                return Err(BridgeError::NegativeOffset(*offset));
            }
        }

        let mut client = WireClient::new(connection.clone());
        let mut planned = Vec::with_capacity(partitions.partitions.len());
        for assignment in &partitions.partitions {
            let start_offset = match self.spec.offsets.get(&assignment.partition) {
                Some(offset) => *offset,
                None => {
                    let offsets = client
                        .fetch_offsets(topic, assignment.partition, &assignment.leader)
                        .await?;
                    self.spec.default_start.resolve(&offsets)
                }
            };
            debug!(partition = assignment.partition, start_offset, leader = %assignment.leader, "planned partition");
            planned.push((assignment.partition, assignment.leader.clone(), start_offset));
        }

        let pass = self.tracker.lock().start(planned.len());
        info!(pass, partitions = planned.len(), "planned read pass");
        Ok(planned
            .into_iter()
            .map(|(partition, leader, start_offset)| PartitionSlice {
                topic: topic.clone(),
                partition,
                leader,
                start_offset,
                pass,
            })
            .collect())
    }

    #[instrument(skip(self, slice), fields(topic = %slice.topic, partition = slice.partition, offset = slice.start_offset))]
    async fn compute(&self, slice: PartitionSlice) -> Result<Vec<ConsumerRecord>> {
        let connection = self.config.connection.clone();
        let mut reader = PartitionReader::new(
            slice.topic.clone(),
            slice.partition,
            slice.leader.clone(),
            WireClient::new(connection.clone()),
            ClusterMetadata::new(connection),
        )
        .with_max_bytes(self.config.max_bytes)
        .with_record_limit(self.config.record_limit);

        match reader.read(slice.start_offset).await {
            Ok(read) => {
                self.tracker
                    .lock()
                    .complete(slice.pass, slice.partition, read.next_offset);
                Ok(read.records)
            }
            Err(err) => {
                self.tracker.lock().fail(slice.pass);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod test {

    use std::collections::BTreeMap;

    use crate::config::ConnectionConfig;
    use crate::config::ReadConfig;
    use crate::BridgeError;
    use crate::Offset;

    use super::PassTracker;
    use super::ReadSpec;
    use super::TopicCollection;

    #[test]
    fn test_pass_tracker_requires_every_partition() {
        let mut tracker = PassTracker::default();
        assert!(tracker.finished().is_none());

        let pass = tracker.start(2);
        tracker.complete(pass, 0, 10);
        assert!(tracker.finished().is_none());
        tracker.complete(pass, 1, 3);
        assert_eq!(
            tracker.finished().cloned(),
            Some(BTreeMap::from([(0, 10), (1, 3)]))
        );
    }

    #[test]
    fn test_pass_tracker_failure_and_stale_passes() {
        let mut tracker = PassTracker::default();
        let first = tracker.start(1);
        let second = tracker.start(1);
        tracker.complete(first, 0, 99);
        assert!(tracker.finished().is_none());

        tracker.complete(second, 0, 5);
        assert!(tracker.finished().is_some());

        let third = tracker.start(2);
        tracker.complete(third, 0, 5);
        tracker.fail(third);
        tracker.complete(third, 1, 5);
        assert!(tracker.finished().is_none());
    }

    #[test]
    fn test_read_spec_from_next_offsets() {
        let spec = ReadSpec::from_next_offsets("t", BTreeMap::from([(0, 6)]))
            .with_default_start(Offset::end());
        assert_eq!(spec.offsets.get(&0), Some(&6));
        assert_eq!(spec.default_start, Offset::end());
        assert_eq!(ReadSpec::new("t").default_start, Offset::beginning());
    }

    #[test]
    fn test_next_offsets_before_evaluation() {
        let config = ReadConfig::builder()
            .connection(ConnectionConfig::new(["localhost:9092"]))
            .build()
            .expect("config");
        let collection = TopicCollection::new(ReadSpec::new("t"), config);
        assert!(matches!(
            collection.clone().next_offsets(),
            Err(BridgeError::NotEvaluated)
        ));
    }
}
