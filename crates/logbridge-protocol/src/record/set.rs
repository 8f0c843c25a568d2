use std::io::Error;
use std::io::ErrorKind;

use bytes::Bytes;
use kafka_protocol::records::Record;
use tracing::trace;

use logbridge_types::PartitionId;

use super::BATCH_PREAMBLE_SIZE;
use super::ConsumerRecord;
use super::decode_batch;
use super::peek_preamble;

/// Record set bytes as returned by a fetch, possibly cut in the middle of a batch.
#[derive(Default, Debug, Clone)]
pub struct RawRecordSet(pub Bytes);

/// A batch that did not fit in the fetched bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncated {
    /// not even the batch preamble is complete
    Preamble { position: usize },
    /// the batch starting at `position` needs `required_bytes` in total
    Batch {
        position: usize,
        required_bytes: usize,
    },
}

impl Truncated {
    /// Fetch size that would have included the cut batch, if known.
    pub fn fetch_size_hint(&self) -> Option<usize> {
        match self {
            Self::Preamble { .. } => None,
            Self::Batch {
                position,
                required_bytes,
            } => Some(position + required_bytes),
        }
    }
}

#[derive(Default, Debug)]
pub struct DecodedBatches {
    pub batches: usize,
    pub records: Vec<Record>,
    pub truncated: Option<Truncated>,
}

impl DecodedBatches {
    /// Data records in log order; control records are dropped.
    pub fn into_consumer_records(self, partition: PartitionId) -> Vec<ConsumerRecord> {
        self.records
            .into_iter()
            .filter(|record| !record.control)
            .map(|record| ConsumerRecord::from_record(partition, record))
            .collect()
    }
}

impl RawRecordSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decodes complete batches and reports a trailing partial batch instead of failing.
    /// Corruption inside a complete batch is still an error.
    pub fn decode_batches(&self) -> Result<DecodedBatches, Error> {
        let mut decoded = DecodedBatches::default();
        let mut position = 0;
        let total = self.0.len();

        while position < total {
            let rest = &self.0[position..];
            let Some((base_offset, batch_len)) = peek_preamble(rest) else {
                trace!(position, "partial batch preamble");
                decoded.truncated = Some(Truncated::Preamble { position });
                break;
            };
            if batch_len < 0 {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("negative batch length {batch_len} at offset {base_offset}"),
                ));
            }
            let required_bytes = BATCH_PREAMBLE_SIZE + batch_len as usize;
            if rest.len() < required_bytes {
                trace!(
                    position,
                    base_offset,
                    required_bytes,
                    available = rest.len(),
                    "partial batch"
                );
                decoded.truncated = Some(Truncated::Batch {
                    position,
                    required_bytes,
                });
                break;
            }

            let batch = self.0.slice(position..position + required_bytes);
            decoded.records.extend(decode_batch(batch)?);
            decoded.batches += 1;
            position += required_bytes;
        }

        Ok(decoded)
    }
}

impl From<Bytes> for RawRecordSet {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod test {

    use bytes::Bytes;
    use bytes::BytesMut;

    use crate::record::encode_batch;
    use crate::record::new_record;

    use super::RawRecordSet;
    use super::Truncated;

    fn batch_at(base_offset: i64, values: &[&'static str]) -> Bytes {
        let records: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                new_record(base_offset + index as i64, None, Bytes::copy_from_slice(value.as_bytes()), 0)
            })
            .collect();
        encode_batch(&records).expect("encode")
    }

    fn raw_of(batches: &[Bytes]) -> Bytes {
        let mut out = BytesMut::new();
        for batch in batches {
            out.extend_from_slice(batch);
        }
        out.freeze()
    }

    #[test]
    fn test_raw_complete_batches() {
        let raw = RawRecordSet(raw_of(&[batch_at(0, &["a"]), batch_at(1, &["b", "c"])]));
        let decoded = raw.decode_batches().expect("decode");
        assert_eq!(decoded.batches, 2);
        assert!(decoded.truncated.is_none());

        let records = decoded.into_consumer_records(4);
        let offsets: Vec<_> = records.iter().map(|record| record.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
        assert_eq!(records[2].value(), b"c");
        assert_eq!(records[2].partition(), 4);
    }

    #[test]
    fn test_raw_trailing_partial_batch() {
        let first = batch_at(0, &["a"]);
        let second = batch_at(1, &["bbbbbbbbbb"]);
        let first_len = first.len();
        let second_len = second.len();
        let full = raw_of(&[first, second]);

        let raw = RawRecordSet(full.slice(..full.len() - 4));
        let decoded = raw.decode_batches().expect("decode");
        assert_eq!(decoded.batches, 1);
        assert_eq!(
            decoded.truncated,
            Some(Truncated::Batch {
                position: first_len,
                required_bytes: second_len
            })
        );
        assert_eq!(
            decoded.truncated.and_then(|t| t.fetch_size_hint()),
            Some(full.len())
        );
    }

    #[test]
    fn test_raw_partial_preamble() {
        let full = batch_at(5, &["a"]);
        let raw = RawRecordSet(full.slice(..7));
        let decoded = raw.decode_batches().expect("decode");
        assert_eq!(decoded.batches, 0);
        assert!(decoded.records.is_empty());
        assert_eq!(decoded.truncated, Some(Truncated::Preamble { position: 0 }));
    }

    #[test]
    fn test_raw_corrupt_complete_batch_fails() {
        let mut bytes = batch_at(0, &["abc"]).to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let raw = RawRecordSet(Bytes::from(bytes));
        assert!(raw.decode_batches().is_err());
    }
}
