use std::io::Error as IoError;
use std::io::ErrorKind;

use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tokio_util::codec::Encoder;
use tracing::trace;

/// Frames every message with a 4 byte big endian length.
#[derive(Debug, Default)]
pub struct BridgeCodec {}

impl BridgeCodec {
    pub fn new() -> Self {
        Self {}
    }
}

impl Decoder for BridgeCodec {
    type Item = BytesMut;
    type Error = IoError;

    fn decode(&mut self, bytes: &mut BytesMut) -> Result<Option<BytesMut>, Self::Error> {
        let len = bytes.len();
        if len < 4 {
            trace!(len, "not enough bytes for frame size");
            return Ok(None);
        }

        let packet_len = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if packet_len < 0 {
            return Err(IoError::new(
                ErrorKind::InvalidData,
                format!("negative frame size: {packet_len}"),
            ));
        }
        let frame_len = packet_len as usize + 4;
        if frame_len <= len {
            trace!(
                frame_len,
                excess = len - frame_len,
                "full frame in buffer"
            );
            let mut buf = bytes.split_to(frame_len);
            Ok(Some(buf.split_off(4)))
        } else {
            trace!(len, frame_len, "partial frame, waiting");
            bytes.reserve(frame_len - len);
            Ok(None)
        }
    }
}

impl Encoder<Bytes> for BridgeCodec {
    type Error = IoError;

    fn encode(&mut self, src: Bytes, buf: &mut BytesMut) -> Result<(), IoError> {
        let size = i32::try_from(src.len()).map_err(|_| {
            IoError::new(
                ErrorKind::InvalidInput,
                format!("frame of {} bytes is too large", src.len()),
            )
        })?;
        trace!(size, "encoding frame");
        buf.reserve(4 + src.len());
        buf.put_i32(size);
        buf.extend_from_slice(&src);
        Ok(())
    }
}

#[cfg(test)]
mod test {

    use std::time::Duration;

    use bytes::Bytes;
    use bytes::BytesMut;
    use futures_util::SinkExt;
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::net::TcpStream;
    use tokio_util::codec::Decoder as _;
    use tokio_util::codec::Encoder as _;
    use tokio_util::codec::Framed;

    use super::BridgeCodec;

    #[test]
    fn test_decode_waits_for_full_frame() {
        let mut codec = BridgeCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x00, 0x03, 0x01][..]);
        assert!(codec.decode(&mut buf).expect("decode").is_none());

        buf.extend_from_slice(&[0x02, 0x03, 0x00]);
        let frame = codec.decode(&mut buf).expect("decode").expect("frame");
        assert_eq!(frame.as_ref(), &[0x01, 0x02, 0x03]);
        assert_eq!(buf.as_ref(), &[0x00]);
    }

    #[test]
    fn test_decode_negative_size() {
        let mut codec = BridgeCodec::new();
        let mut buf = BytesMut::from(&[0xff, 0xff, 0xff, 0xff][..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_encode_prefixes_length() {
        let mut codec = BridgeCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Bytes::from_static(b"abc"), &mut buf)
            .expect("encode");
        assert_eq!(buf.as_ref(), &[0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[tokio::test]
    async fn test_framed_payload_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let data = Bytes::from_static(b"hello");

        let server_data = data.clone();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut framed = Framed::new(stream, BridgeCodec::new());
            for _ in 0..2_u8 {
                framed.send(server_data.clone()).await.expect("send");
            }
        });

        let stream = TcpStream::connect(addr).await.expect("connect");
        let mut framed = Framed::new(stream, BridgeCodec::new());
        for _ in 0..2_u8 {
            let bytes = framed.next().await.expect("frame").expect("bytes");
            assert_eq!(bytes.as_ref(), data.as_ref());
        }
        server.await.expect("server");
    }

    #[tokio::test]
    async fn test_frame_split_across_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let payload = 1000_i32.to_be_bytes();
            stream.write_all(&[0, 0, 0, 4]).await.expect("len");
            stream.write_all(&payload[..1]).await.expect("head");
            tokio::time::sleep(Duration::from_millis(10)).await;
            stream.write_all(&payload[1..]).await.expect("tail");
        });

        let stream = TcpStream::connect(addr).await.expect("connect");
        let mut framed = Framed::new(stream, BridgeCodec::new());
        let bytes = framed.next().await.expect("frame").expect("bytes");
        let value = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(value, 1000);
        server.await.expect("server");
    }
}
