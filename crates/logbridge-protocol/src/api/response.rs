use std::io::Error as IoError;

use bytes::Bytes;
use bytes::BytesMut;
use kafka_protocol::messages::ResponseHeader;
use kafka_protocol::protocol::Decodable;
use kafka_protocol::protocol::Encodable;
use tracing::trace;

use crate::wire_error;

use super::RESPONSE_HEADER_VERSION;

#[derive(Debug, Default)]
pub struct ResponseMessage<P> {
    pub correlation_id: i32,
    pub response: P,
}

impl<P> ResponseMessage<P> {
    pub fn new(correlation_id: i32, response: P) -> Self {
        Self {
            correlation_id,
            response,
        }
    }
}

impl<P> ResponseMessage<P>
where
    P: Decodable,
{
    pub fn decode_frame(mut frame: Bytes, version: i16) -> Result<Self, IoError> {
        let header = ResponseHeader::decode(&mut frame, RESPONSE_HEADER_VERSION)
            .map_err(|err| wire_error("response header", err))?;
        trace!(correlation_id = header.correlation_id, "decoded response header");
        let response =
            P::decode(&mut frame, version).map_err(|err| wire_error("response body", err))?;
        Ok(Self::new(header.correlation_id, response))
    }
}

impl<P> ResponseMessage<P>
where
    P: Encodable,
{
    pub fn encode_frame(&self, version: i16) -> Result<Bytes, IoError> {
        let mut buf = BytesMut::new();
        ResponseHeader::default()
            .with_correlation_id(self.correlation_id)
            .encode(&mut buf, RESPONSE_HEADER_VERSION)
            .map_err(|err| wire_error("response header", err))?;
        self.response
            .encode(&mut buf, version)
            .map_err(|err| wire_error("response body", err))?;
        trace!(correlation_id = self.correlation_id, len = buf.len(), "encoded response");
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod test {

    use bytes::Bytes;
    use kafka_protocol::messages::MetadataResponse;
    use kafka_protocol::messages::metadata_response::MetadataResponseBroker;
    use kafka_protocol::messages::BrokerId;
    use kafka_protocol::protocol::StrBytes;

    use super::ResponseMessage;

    #[test]
    fn test_response_correlation_prefix() {
        let broker = MetadataResponseBroker::default()
            .with_node_id(BrokerId::from(4))
            .with_host(StrBytes::from_static_str("h"))
            .with_port(9092);
        let message = ResponseMessage::new(7, MetadataResponse::default().with_brokers(vec![broker]));
        let frame = message.encode_frame(1).expect("encode");
        assert_eq!(&frame[..4], &[0, 0, 0, 7]);

        let decoded: ResponseMessage<MetadataResponse> =
            ResponseMessage::decode_frame(frame, 1).expect("decode");
        assert_eq!(decoded.correlation_id, 7);
        assert_eq!(decoded.response.brokers[0].node_id.0, 4);
    }

    #[test]
    fn test_short_body_fails() {
        let frame = Bytes::from_static(&[0, 0, 0, 7, 0, 0]);
        let decoded = ResponseMessage::<MetadataResponse>::decode_frame(frame, 1);
        assert!(decoded.is_err());
    }
}
