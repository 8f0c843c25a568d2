use std::io::Error;
use std::io::ErrorKind;
use std::mem::size_of;

use bytes::Buf;
use bytes::Bytes;
use kafka_protocol::records::Compression;
use kafka_protocol::records::Record;
use kafka_protocol::records::RecordBatchDecoder;
use tracing::trace;

use logbridge_types::Offset;

use crate::wire_error;

pub const MAGIC: i8 = 2;

/// size of the offset and length
pub const BATCH_PREAMBLE_SIZE: usize = size_of::<Offset>() + size_of::<i32>();

// leader epoch and magic sit between the preamble and the crc
const CRC_POSITION: usize = BATCH_PREAMBLE_SIZE + size_of::<i32>() + size_of::<i8>();
const CRC_BODY_POSITION: usize = CRC_POSITION + size_of::<u32>();

type DecompressFn = fn(&mut Bytes, Compression) -> anyhow::Result<Bytes>;

/// Reads the base offset and batch length without consuming anything.
pub fn peek_preamble(src: &[u8]) -> Option<(Offset, i32)> {
    if src.len() < BATCH_PREAMBLE_SIZE {
        return None;
    }
    let mut preamble = &src[..BATCH_PREAMBLE_SIZE];
    Some((preamble.get_i64(), preamble.get_i32()))
}

/// Checks the crc32c of one complete batch against the value it carries.
pub fn verify_batch_crc(batch: &[u8]) -> Result<(), Error> {
    if batch.len() < CRC_BODY_POSITION {
        return Err(Error::new(
            ErrorKind::UnexpectedEof,
            format!("batch of {} bytes has no crc", batch.len()),
        ));
    }
    let magic = batch[CRC_POSITION - 1] as i8;
    if magic != MAGIC {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("unsupported batch magic {magic}"),
        ));
    }
    let mut crc_bytes = &batch[CRC_POSITION..CRC_BODY_POSITION];
    let expected = crc_bytes.get_u32();
    let actual = crc32c::crc32c(&batch[CRC_BODY_POSITION..]);
    if expected != actual {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("batch crc {actual:#010x} does not match {expected:#010x}"),
        ));
    }
    Ok(())
}

/// Decodes one complete, uncompressed batch into records with absolute offsets.
pub fn decode_batch(mut batch: Bytes) -> Result<Vec<Record>, Error> {
    verify_batch_crc(&batch)?;
    let records =
        RecordBatchDecoder::decode_with_custom_compression::<Bytes, DecompressFn>(&mut batch, None)
            .map_err(|err| wire_error("record batch", err))?;
    trace!(records = records.len(), "decoded batch");
    Ok(records)
}

#[cfg(test)]
mod test {

    use bytes::Bytes;

    use crate::record::encode_batch;
    use crate::record::new_record;

    use super::BATCH_PREAMBLE_SIZE;
    use super::peek_preamble;
    use super::verify_batch_crc;

    fn sample() -> Vec<u8> {
        let mut records = vec![];
        for offset in 0..3 {
            records.push(new_record(40 + offset, None, Bytes::from_static(b"abc"), 1));
        }
        encode_batch(&records).expect("encode").to_vec()
    }

    #[test]
    fn test_preamble_reads_base_offset_and_length() {
        let bytes = sample();
        let (base_offset, batch_len) = peek_preamble(&bytes).expect("preamble");
        assert_eq!(base_offset, 40);
        assert_eq!(BATCH_PREAMBLE_SIZE + batch_len as usize, bytes.len());
        assert!(peek_preamble(&bytes[..BATCH_PREAMBLE_SIZE - 1]).is_none());
    }

    #[test]
    fn test_crc_detects_flipped_byte() {
        let mut bytes = sample();
        assert!(verify_batch_crc(&bytes).is_ok());
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(verify_batch_crc(&bytes).is_err());
    }
}
