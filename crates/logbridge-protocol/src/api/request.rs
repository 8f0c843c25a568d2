use std::io::Error as IoError;

use bytes::Bytes;
use bytes::BytesMut;
use kafka_protocol::messages::ApiKey;
use kafka_protocol::messages::RequestHeader;
use kafka_protocol::protocol::Decodable;
use kafka_protocol::protocol::Encodable;
use kafka_protocol::protocol::StrBytes;
use tracing::trace;

use logbridge_types::defaults::CLIENT_ID;

use crate::wire_error;

use super::REQUEST_HEADER_VERSION;
use super::Request;
use super::response::ResponseMessage;

/// A request body framed with its header. The header carries the pinned
/// api version the body is encoded with.
#[derive(Debug)]
pub struct RequestMessage<R> {
    pub header: RequestHeader,
    pub request: R,
}

impl<R> Default for RequestMessage<R>
where
    R: Request,
{
    fn default() -> Self {
        Self::new_request(R::default())
    }
}

impl<R> RequestMessage<R>
where
    R: Request,
{
    /// Pair a decoded header with its body. The api key is not checked.
    pub fn new(header: RequestHeader, request: R) -> Self {
        Self { header, request }
    }

    pub fn new_request(request: R) -> Self {
        Self {
            header: Self::create_header(),
            request,
        }
    }

    pub fn create_header() -> RequestHeader {
        RequestHeader::default()
            .with_request_api_key(R::API_KEY as i16)
            .with_request_api_version(R::API_VERSION)
            .with_correlation_id(1)
            .with_client_id(Some(StrBytes::from_static_str(CLIENT_ID)))
    }

    pub fn set_client_id<T>(mut self, client_id: T) -> Self
    where
        T: Into<String>,
    {
        self.header.client_id = Some(StrBytes::from_string(client_id.into()));
        self
    }

    pub fn correlation_id(&self) -> i32 {
        self.header.correlation_id
    }

    pub fn set_correlation_id(&mut self, id: i32) -> &mut Self {
        self.header.correlation_id = id;
        self
    }

    pub fn api_version(&self) -> i16 {
        self.header.request_api_version
    }

    pub fn new_response(&self, response: R::Response) -> ResponseMessage<R::Response> {
        ResponseMessage::new(self.header.correlation_id, response)
    }

    /// Header followed by body, without the frame length.
    pub fn encode_frame(&self) -> Result<Bytes, IoError> {
        let mut buf = BytesMut::new();
        self.header
            .encode(&mut buf, REQUEST_HEADER_VERSION)
            .map_err(|err| wire_error("request header", err))?;
        self.request
            .encode(&mut buf, self.api_version())
            .map_err(|err| wire_error("request body", err))?;
        trace!(api_key = ?R::API_KEY, len = buf.len(), "encoded request");
        Ok(buf.freeze())
    }

    pub fn decode_response(&self, frame: Bytes) -> Result<ResponseMessage<R::Response>, IoError> {
        ResponseMessage::decode_frame(frame, self.api_version())
    }
}

/// A request frame whose header is decoded and whose body is not yet.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub header: RequestHeader,
    body: Bytes,
}

impl RawRequest {
    pub fn decode_frame(mut frame: Bytes) -> Result<Self, IoError> {
        let header = RequestHeader::decode(&mut frame, REQUEST_HEADER_VERSION)
            .map_err(|err| wire_error("request header", err))?;
        Ok(Self {
            header,
            body: frame,
        })
    }

    /// `None` for api keys this crate does not know
    pub fn api_key(&self) -> Option<ApiKey> {
        ApiKey::try_from(self.header.request_api_key).ok()
    }

    pub fn into_request<R: Request>(self) -> Result<RequestMessage<R>, IoError> {
        let mut body = self.body;
        let request = R::decode(&mut body, self.header.request_api_version)
            .map_err(|err| wire_error("request body", err))?;
        Ok(RequestMessage::new(self.header, request))
    }
}

#[cfg(test)]
mod test {

    use kafka_protocol::messages::ApiKey;
    use kafka_protocol::messages::FetchRequest;
    use kafka_protocol::messages::MetadataRequest;
    use kafka_protocol::messages::TopicName;
    use kafka_protocol::messages::metadata_request::MetadataRequestTopic;
    use kafka_protocol::protocol::StrBytes;

    use logbridge_types::defaults::CLIENT_ID;

    use super::RawRequest;
    use super::RequestMessage;

    #[test]
    fn test_header_layout() {
        let mut request = RequestMessage::new_request(MetadataRequest::default());
        request.set_correlation_id(9);
        let frame = request.encode_frame().expect("encode");

        // api key 3, version 1, correlation id 9, then the client id string
        assert_eq!(&frame[..8], &[0x00, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x09]);
        let client_len = i16::from_be_bytes([frame[8], frame[9]]) as usize;
        assert_eq!(&frame[10..10 + client_len], CLIENT_ID.as_bytes());
    }

    #[test]
    fn test_server_side_decode() {
        let topic = MetadataRequestTopic::default().with_name(Some(TopicName::from(
            StrBytes::from_static_str("events"),
        )));
        let request =
            RequestMessage::new_request(MetadataRequest::default().with_topics(Some(vec![topic])));
        let frame = request.encode_frame().expect("encode");

        let raw = RawRequest::decode_frame(frame).expect("header");
        assert_eq!(raw.api_key(), Some(ApiKey::Metadata));
        let decoded = raw.into_request::<MetadataRequest>().expect("body");
        let topics = decoded.request.topics.expect("topics");
        assert_eq!(
            topics[0].name.as_ref().map(|name| name.as_str()),
            Some("events")
        );
    }

    #[test]
    fn test_body_of_wrong_api_fails() {
        let request = RequestMessage::new_request(MetadataRequest::default());
        let frame = request.encode_frame().expect("encode");
        let raw = RawRequest::decode_frame(frame).expect("header");
        assert!(raw.into_request::<FetchRequest>().is_err());
    }
}
