mod request;
mod response;

use std::fmt::Debug;

use kafka_protocol::messages::ApiKey;
use kafka_protocol::messages::FetchRequest;
use kafka_protocol::messages::FetchResponse;
use kafka_protocol::messages::ListOffsetsRequest;
use kafka_protocol::messages::ListOffsetsResponse;
use kafka_protocol::messages::MetadataRequest;
use kafka_protocol::messages::MetadataResponse;
use kafka_protocol::messages::ProduceRequest;
use kafka_protocol::messages::ProduceResponse;
use kafka_protocol::protocol::Decodable;
use kafka_protocol::protocol::Encodable;

pub use self::request::RawRequest;
pub use self::request::RequestMessage;
pub use self::response::ResponseMessage;

/// Largest payload a broker will ever hand out in a single fetch.
pub const MAX_BYTES: i32 = 52428800;

/// Header versions of the pinned apis. None of them use flexible encoding.
pub const REQUEST_HEADER_VERSION: i16 = 1;
pub const RESPONSE_HEADER_VERSION: i16 = 0;

/// A request body paired with the response it produces, at the one api
/// version logbridge speaks.
pub trait Request: Encodable + Decodable + Default + Debug {
    const API_KEY: ApiKey;

    const API_VERSION: i16;

    type Response: Encodable + Decodable + Default + Debug;
}

macro_rules! pinned_api {
    ($req:ty, $resp:ty, $key:expr, $version:literal) => {
        impl Request for $req {
            const API_KEY: ApiKey = $key;
            const API_VERSION: i16 = $version;
            type Response = $resp;
        }
    };
}

pinned_api!(MetadataRequest, MetadataResponse, ApiKey::Metadata, 1);
pinned_api!(ListOffsetsRequest, ListOffsetsResponse, ApiKey::ListOffsets, 1);
pinned_api!(FetchRequest, FetchResponse, ApiKey::Fetch, 5);
pinned_api!(ProduceRequest, ProduceResponse, ApiKey::Produce, 3);
