use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use kafka_protocol::records::Record;
use parking_lot::Mutex;

use logbridge_protocol::link::ErrorCode;
use logbridge_protocol::record::encode_batch;
use logbridge_types::BrokerId;
use logbridge_types::Offset;

pub(crate) type SharedState = Arc<Mutex<ClusterState>>;

#[derive(Debug, Default)]
pub(crate) struct ClusterState {
    pub brokers: Vec<(BrokerId, u16)>,
    pub topics: BTreeMap<String, Vec<PartitionLog>>,
    pub requests: BTreeMap<i16, usize>,
}

impl ClusterState {
    pub fn partition(&self, topic: &str, partition: i32) -> Option<&PartitionLog> {
        let index = usize::try_from(partition).ok()?;
        self.topics.get(topic)?.get(index)
    }

    pub fn partition_mut(&mut self, topic: &str, partition: i32) -> Option<&mut PartitionLog> {
        let index = usize::try_from(partition).ok()?;
        self.topics.get_mut(topic)?.get_mut(index)
    }
}

/// Encoded batches of one partition
#[derive(Debug)]
pub(crate) struct PartitionLog {
    /// broker that actually serves the partition
    pub leader: BrokerId,
    /// broker reported by metadata, may lag behind `leader`
    pub advertised_leader: BrokerId,
    pub batches: Vec<StoredBatch>,
    pub high_watermark: Offset,
}

#[derive(Debug)]
pub(crate) struct StoredBatch {
    pub base_offset: Offset,
    pub last_offset: Offset,
    pub bytes: Bytes,
}

impl PartitionLog {
    pub fn new(leader: BrokerId) -> Self {
        Self {
            leader,
            advertised_leader: leader,
            batches: vec![],
            high_watermark: 0,
        }
    }

    /// Assigns offsets and the append time to the records and stores them
    /// as one batch; returns its base offset.
    pub fn append(&mut self, mut records: Vec<Record>, now_ms: i64) -> Result<Offset, ErrorCode> {
        if records.is_empty() {
            return Ok(self.high_watermark);
        }
        let base_offset = self.high_watermark;
        for (index, record) in records.iter_mut().enumerate() {
            record.offset = base_offset + index as Offset;
            record.timestamp = now_ms;
        }
        let count = records.len() as Offset;
        let bytes = encode_batch(&records).map_err(|_| ErrorCode::CorruptMessage)?;
        self.batches.push(StoredBatch {
            base_offset,
            last_offset: base_offset + count - 1,
            bytes,
        });
        self.high_watermark += count;
        Ok(base_offset)
    }

    /// Whole batches holding `offset` and after, cut at `max_bytes`.
    pub fn read(&self, offset: Offset, max_bytes: usize) -> Bytes {
        let mut out = Vec::new();
        for batch in self.batches.iter().filter(|batch| batch.last_offset >= offset) {
            if out.len() >= max_bytes {
                break;
            }
            out.extend_from_slice(&batch.bytes);
        }
        out.truncate(max_bytes);
        Bytes::from(out)
    }

    /// Drops the oldest batches, as retention would.
    pub fn drop_front(&mut self, batches: usize) {
        let count = batches.min(self.batches.len());
        self.batches.drain(..count);
    }

    pub fn start_offset(&self) -> Offset {
        self.batches
            .first()
            .map(|batch| batch.base_offset)
            .unwrap_or(self.high_watermark)
    }
}

#[cfg(test)]
mod test {

    use bytes::Bytes;
    use kafka_protocol::records::Record;

    use logbridge_protocol::record::NO_TIMESTAMP;
    use logbridge_protocol::record::RawRecordSet;
    use logbridge_protocol::record::new_record;

    use super::PartitionLog;

    fn records(values: &[&'static str]) -> Vec<Record> {
        values
            .iter()
            .map(|value| new_record(0, None, Bytes::copy_from_slice(value.as_bytes()), NO_TIMESTAMP))
            .collect()
    }

    #[test]
    fn test_append_assigns_offsets() {
        let mut log = PartitionLog::new(0);
        assert_eq!(log.append(records(&["a", "b"]), 1), Ok(0));
        assert_eq!(log.append(records(&["c"]), 2), Ok(2));
        assert_eq!(log.high_watermark, 3);
        assert_eq!(log.batches[1].last_offset, 2);

        let decoded = RawRecordSet(log.read(0, usize::MAX))
            .decode_batches()
            .expect("decode");
        let offsets: Vec<_> = decoded.records.iter().map(|record| record.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
        assert_eq!(decoded.records[2].timestamp, 2);
    }

    #[test]
    fn test_read_cuts_at_max_bytes() {
        let mut log = PartitionLog::new(0);
        log.append(records(&["a", "b"]), 1).expect("append");
        log.append(records(&["c"]), 1).expect("append");

        let all = RawRecordSet(log.read(0, usize::MAX)).decode_batches().expect("decode");
        assert_eq!(all.batches, 2);
        assert!(all.truncated.is_none());

        let from_second = RawRecordSet(log.read(2, usize::MAX)).decode_batches().expect("decode");
        assert_eq!(from_second.batches, 1);

        let cut = RawRecordSet(log.read(0, 20)).decode_batches().expect("decode");
        assert_eq!(cut.batches, 0);
        assert!(cut.truncated.is_some());
    }

    #[test]
    fn test_drop_front_moves_start() {
        let mut log = PartitionLog::new(0);
        log.append(records(&["a", "b"]), 1).expect("append");
        log.append(records(&["c"]), 1).expect("append");
        log.drop_front(1);
        assert_eq!(log.start_offset(), 2);
        assert_eq!(log.high_watermark, 3);
        log.drop_front(5);
        assert_eq!(log.start_offset(), 3);
    }
}
