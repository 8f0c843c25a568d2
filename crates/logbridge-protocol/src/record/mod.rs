mod batch;
mod set;

use std::io::Error as IoError;

use bytes::Bytes;
use bytes::BytesMut;
use kafka_protocol::records::Compression;
use kafka_protocol::records::NO_PRODUCER_ID;
use kafka_protocol::records::NO_SEQUENCE;
use kafka_protocol::records::Record;
use kafka_protocol::records::RecordBatchEncoder;
use kafka_protocol::records::RecordEncodeOptions;
use kafka_protocol::records::TimestampType;
use tracing::trace;

use logbridge_types::Offset;
use logbridge_types::PartitionId;
use logbridge_types::Timestamp;

use crate::wire_error;

pub use self::batch::BATCH_PREAMBLE_SIZE;
pub use self::batch::MAGIC;
pub use self::batch::decode_batch;
pub use self::batch::peek_preamble;
pub use self::batch::verify_batch_crc;
pub use self::set::DecodedBatches;
pub use self::set::RawRecordSet;
pub use self::set::Truncated;

pub const NO_TIMESTAMP: Timestamp = -1;

type CompressFn = fn(&mut BytesMut, &mut BytesMut, Compression) -> anyhow::Result<()>;

/// A record ready to be batched. Offsets are assigned by the broker; the
/// offset set here only orders records inside their batch.
pub fn new_record(offset: Offset, key: Option<Bytes>, value: Bytes, timestamp: Timestamp) -> Record {
    Record {
        transactional: false,
        control: false,
        partition_leader_epoch: 0,
        producer_id: NO_PRODUCER_ID,
        producer_epoch: -1,
        timestamp_type: TimestampType::Creation,
        offset,
        sequence: NO_SEQUENCE,
        timestamp,
        key,
        value: Some(value),
        headers: Default::default(),
    }
}

/// Encodes records as one uncompressed v2 batch. The first record's offset
/// becomes the batch base offset.
pub fn encode_batch(records: &[Record]) -> Result<Bytes, IoError> {
    let mut buf = BytesMut::new();
    let options = RecordEncodeOptions {
        version: MAGIC,
        compression: Compression::None,
    };
    RecordBatchEncoder::encode_with_custom_compression::<_, _, CompressFn>(
        &mut buf,
        records.iter(),
        &options,
        None,
    )
    .map_err(|err| wire_error("record batch", err))?;
    trace!(records = records.len(), len = buf.len(), "encoded batch");
    Ok(buf.freeze())
}

/// A record as handed to readers, with its absolute position in the partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRecord {
    pub partition: PartitionId,
    pub offset: Offset,
    pub timestamp: Timestamp,
    pub key: Option<Bytes>,
    pub value: Bytes,
}

impl ConsumerRecord {
    /// Null values read back as empty.
    pub fn from_record(partition: PartitionId, record: Record) -> Self {
        Self {
            partition,
            offset: record.offset,
            timestamp: record.timestamp,
            key: record.key,
            value: record.value.unwrap_or_default(),
        }
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    /// `NO_TIMESTAMP` when the producer did not set one
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_key_value(self) -> (Option<Bytes>, Bytes) {
        (self.key, self.value)
    }
}

#[cfg(test)]
mod test {

    use bytes::Bytes;

    use super::ConsumerRecord;
    use super::NO_TIMESTAMP;
    use super::decode_batch;
    use super::encode_batch;
    use super::new_record;

    #[test]
    fn test_batch_keeps_keys_and_order() {
        let records = vec![
            new_record(0, Some(Bytes::from_static(b"k")), Bytes::from_static(b"dog"), 5),
            new_record(1, None, Bytes::from_static(b"cat"), 5),
        ];
        let bytes = encode_batch(&records).expect("encode");

        let decoded = decode_batch(bytes).expect("decode");
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].key.as_deref(), Some(&b"k"[..]));
        assert_eq!(decoded[1].offset, 1);
        assert_eq!(decoded[1].value.as_deref(), Some(&b"cat"[..]));
    }

    #[test]
    fn test_consumer_record_from_null_value() {
        let mut record = new_record(7, None, Bytes::new(), NO_TIMESTAMP);
        record.value = None;
        let consumer = ConsumerRecord::from_record(3, record);
        assert_eq!(consumer.partition(), 3);
        assert_eq!(consumer.offset(), 7);
        assert!(consumer.key().is_none());
        assert!(consumer.value().is_empty());
    }
}
