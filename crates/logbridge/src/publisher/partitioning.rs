use std::fmt::Debug;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;

use siphasher::sip::SipHasher;

use logbridge_types::PartitionCount;
use logbridge_types::PartitionId;

/// A trait for defining a partitioning strategy for key/value records.
///
/// A Partitioner is given the key and value of a record and the partition
/// layout of the topic, and picks the partition the record is sent to.
/// Records without keys get `None`.
///
/// See [`SiphashRoundRobinPartitioner`] for a reference implementation.
pub trait Partitioner: Debug + Send + Sync {
    fn partition(
        &self,
        config: &PartitionerConfig,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> PartitionId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionerConfig {
    pub partition_count: PartitionCount,
}

/// A [`Partitioner`] which combines hashing and round-robin partition assignment
///
/// - Records with keys get their keys hashed with siphash
/// - Records without keys get assigned to partitions using round-robin
#[derive(Debug, Default)]
pub struct SiphashRoundRobinPartitioner {
    index: AtomicI32,
}

impl SiphashRoundRobinPartitioner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Partitioner for SiphashRoundRobinPartitioner {
    fn partition(
        &self,
        config: &PartitionerConfig,
        maybe_key: Option<&[u8]>,
        _value: &[u8],
    ) -> PartitionId {
        let partition_count = config.partition_count.max(1);
        match maybe_key {
            Some(key) => partition_siphash(key, partition_count),
            None => {
                let index = self.index.fetch_add(1, Ordering::Relaxed);
                index.rem_euclid(partition_count)
            }
        }
    }
}

fn partition_siphash(key: &[u8], partition_count: PartitionCount) -> PartitionId {
    let mut hasher = SipHasher::new();
    key.hash(&mut hasher);
    let hashed = hasher.finish();

    (hashed % partition_count as u64) as PartitionId
}
