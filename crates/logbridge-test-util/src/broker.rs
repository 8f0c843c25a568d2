use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use kafka_protocol::messages::ApiKey;
use kafka_protocol::messages::BrokerId as WireBrokerId;
use kafka_protocol::messages::FetchRequest;
use kafka_protocol::messages::FetchResponse;
use kafka_protocol::messages::ListOffsetsRequest;
use kafka_protocol::messages::ListOffsetsResponse;
use kafka_protocol::messages::MetadataRequest;
use kafka_protocol::messages::MetadataResponse;
use kafka_protocol::messages::ProduceRequest;
use kafka_protocol::messages::ProduceResponse;
use kafka_protocol::messages::TopicName;
use kafka_protocol::messages::fetch_response::FetchableTopicResponse;
use kafka_protocol::messages::fetch_response::PartitionData;
use kafka_protocol::messages::list_offsets_response::ListOffsetsPartitionResponse;
use kafka_protocol::messages::list_offsets_response::ListOffsetsTopicResponse;
use kafka_protocol::messages::metadata_response::MetadataResponseBroker;
use kafka_protocol::messages::metadata_response::MetadataResponsePartition;
use kafka_protocol::messages::metadata_response::MetadataResponseTopic;
use kafka_protocol::messages::produce_response::PartitionProduceResponse;
use kafka_protocol::messages::produce_response::TopicProduceResponse;
use kafka_protocol::protocol::StrBytes;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::instrument;
use tracing::trace;

use logbridge_protocol::api::RawRequest;
use logbridge_protocol::api::Request;
use logbridge_protocol::api::RequestMessage;
use logbridge_protocol::link::ErrorCode;
use logbridge_protocol::record::RawRecordSet;
use logbridge_socket::BrokerSink;
use logbridge_socket::BrokerSocket;
use logbridge_socket::SocketError;
use logbridge_types::BrokerId;

use crate::state::ClusterState;
use crate::state::SharedState;

pub(crate) const LOOPBACK: &str = "127.0.0.1";

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

const EARLIEST_TIMESTAMP: i64 = -2;

/// Accepts connections until the task is aborted. Connections end with it.
#[instrument(skip(listener, state))]
pub(crate) async fn serve(id: BrokerId, listener: TcpListener, state: SharedState) {
    let mut connections = JoinSet::new();
    loop {
        match listener.accept().await {
            Ok((tcp, addr)) => {
                debug!(%addr, "accepted connection");
                connections.spawn(handle_connection(id, tcp, state.clone()));
            }
            Err(err) => {
                debug!(%err, "listener failed");
                break;
            }
        }
    }
}

async fn handle_connection(id: BrokerId, tcp: TcpStream, state: SharedState) {
    let (mut sink, mut stream) = BrokerSocket::from_tcp(tcp, CONNECTION_TIMEOUT).split();
    loop {
        let result = match stream.next_request_item().await {
            Some(Ok(request)) => respond(id, request, &state, &mut sink).await,
            Some(Err(err)) => {
                debug!(%err, "error decoding request, ending connection");
                break;
            }
            None => {
                trace!("connection closed by client");
                break;
            }
        };
        if let Err(err) = result {
            debug!(%err, "error answering request, ending connection");
            break;
        }
    }
}

async fn respond(
    id: BrokerId,
    raw: RawRequest,
    state: &SharedState,
    sink: &mut BrokerSink,
) -> Result<(), SocketError> {
    match raw.api_key() {
        Some(ApiKey::Metadata) => {
            let request = decode_body::<MetadataRequest>(raw)?;
            let response = handle_metadata(&request.request, &mut state.lock());
            reply(sink, &request, response).await
        }
        Some(ApiKey::ListOffsets) => {
            let request = decode_body::<ListOffsetsRequest>(raw)?;
            let response = handle_list_offsets(id, &request.request, &mut state.lock());
            reply(sink, &request, response).await
        }
        Some(ApiKey::Fetch) => {
            let request = decode_body::<FetchRequest>(raw)?;
            let response = handle_fetch(id, &request.request, &mut state.lock());
            reply(sink, &request, response).await
        }
        Some(ApiKey::Produce) => {
            let mut request = decode_body::<ProduceRequest>(raw)?;
            let response = handle_produce(id, &mut request.request, &mut state.lock());
            reply(sink, &request, response).await
        }
        other => Err(SocketError::Decode {
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                format!("api {other:?} is not served"),
            ),
            msg: "request".to_string(),
        }),
    }
}

fn decode_body<R: Request>(raw: RawRequest) -> Result<RequestMessage<R>, SocketError> {
    raw.into_request().map_err(|source| SocketError::Decode {
        source,
        msg: "request body".to_string(),
    })
}

async fn reply<R: Request>(
    sink: &mut BrokerSink,
    request: &RequestMessage<R>,
    response: R::Response,
) -> Result<(), SocketError> {
    let message = request.new_response(response);
    sink.send_response(&message, request.api_version()).await
}

fn count_request(state: &mut ClusterState, api_key: ApiKey) {
    *state.requests.entry(api_key as i16).or_default() += 1;
}

fn topic_name(name: &str) -> TopicName {
    TopicName::from(StrBytes::from_string(name.to_owned()))
}

fn handle_metadata(request: &MetadataRequest, state: &mut ClusterState) -> MetadataResponse {
    count_request(state, ApiKey::Metadata);
    let brokers = state
        .brokers
        .iter()
        .map(|(node_id, port)| {
            MetadataResponseBroker::default()
                .with_node_id(WireBrokerId::from(*node_id))
                .with_host(StrBytes::from_static_str(LOOPBACK))
                .with_port(i32::from(*port))
        })
        .collect();

    let names: Vec<String> = match &request.topics {
        Some(topics) => topics
            .iter()
            .filter_map(|topic| topic.name.as_ref())
            .map(|name| name.as_str().to_owned())
            .collect(),
        None => state.topics.keys().cloned().collect(),
    };
    let topics = names
        .into_iter()
        .map(|name| match state.topics.get(&name) {
            Some(partitions) => MetadataResponseTopic::default()
                .with_name(Some(topic_name(&name)))
                .with_partitions(
                    partitions
                        .iter()
                        .enumerate()
                        .map(|(index, log)| {
                            let leader = WireBrokerId::from(log.advertised_leader);
                            MetadataResponsePartition::default()
                                .with_partition_index(index as i32)
                                .with_leader_id(leader)
                                .with_replica_nodes(vec![leader])
                                .with_isr_nodes(vec![leader])
                        })
                        .collect(),
                ),
            None => MetadataResponseTopic::default()
                .with_error_code(ErrorCode::UnknownTopicOrPartition.code())
                .with_name(Some(topic_name(&name))),
        })
        .collect();

    MetadataResponse::default()
        .with_brokers(brokers)
        .with_topics(topics)
}

fn handle_list_offsets(
    id: BrokerId,
    request: &ListOffsetsRequest,
    state: &mut ClusterState,
) -> ListOffsetsResponse {
    count_request(state, ApiKey::ListOffsets);
    let topics = request
        .topics
        .iter()
        .map(|topic| {
            let partitions = topic
                .partitions
                .iter()
                .map(|partition| {
                    let index = partition.partition_index;
                    let response = ListOffsetsPartitionResponse::default()
                        .with_partition_index(index)
                        .with_timestamp(-1);
                    match state.partition(topic.name.as_str(), index) {
                        None => response.with_error_code(ErrorCode::UnknownTopicOrPartition.code()),
                        Some(log) if log.leader != id => {
                            response.with_error_code(ErrorCode::NotLeaderForPartition.code())
                        }
                        // timestamps are not indexed, every lookup but the earliest gets the end
                        Some(log) if partition.timestamp == EARLIEST_TIMESTAMP => {
                            response.with_offset(log.start_offset())
                        }
                        Some(log) => response.with_offset(log.high_watermark),
                    }
                })
                .collect();
            ListOffsetsTopicResponse::default()
                .with_name(topic.name.clone())
                .with_partitions(partitions)
        })
        .collect();
    ListOffsetsResponse::default().with_topics(topics)
}

fn handle_fetch(id: BrokerId, request: &FetchRequest, state: &mut ClusterState) -> FetchResponse {
    count_request(state, ApiKey::Fetch);
    let request_max = usize::try_from(request.max_bytes).unwrap_or(0);
    let responses = request
        .topics
        .iter()
        .map(|topic| {
            let partitions = topic
                .partitions
                .iter()
                .map(|partition| {
                    let index = partition.partition;
                    let offset = partition.fetch_offset;
                    let response = PartitionData::default().with_partition_index(index);
                    match state.partition(topic.topic.as_str(), index) {
                        None => response.with_error_code(ErrorCode::UnknownTopicOrPartition.code()),
                        Some(log) if log.leader != id => {
                            response.with_error_code(ErrorCode::NotLeaderForPartition.code())
                        }
                        Some(log) if offset < log.start_offset() || offset > log.high_watermark => {
                            response.with_error_code(ErrorCode::OffsetOutOfRange.code())
                        }
                        Some(log) => {
                            let partition_max =
                                usize::try_from(partition.partition_max_bytes).unwrap_or(0);
                            let bytes = log.read(offset, request_max.min(partition_max));
                            trace!(offset, len = bytes.len(), "serving fetch");
                            response
                                .with_high_watermark(log.high_watermark)
                                .with_last_stable_offset(log.high_watermark)
                                .with_log_start_offset(log.start_offset())
                                .with_records(Some(bytes))
                        }
                    }
                })
                .collect();
            FetchableTopicResponse::default()
                .with_topic(topic.topic.clone())
                .with_partitions(partitions)
        })
        .collect();

    FetchResponse::default().with_responses(responses)
}

fn handle_produce(
    id: BrokerId,
    request: &mut ProduceRequest,
    state: &mut ClusterState,
) -> ProduceResponse {
    count_request(state, ApiKey::Produce);
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default();

    let responses = std::mem::take(&mut request.topic_data)
        .into_iter()
        .map(|topic| {
            let partitions = topic
                .partition_data
                .into_iter()
                .map(|partition| {
                    let index = partition.index;
                    let response = PartitionProduceResponse::default().with_index(index);
                    let Some(log) = state.partition_mut(topic.name.as_str(), index) else {
                        return response
                            .with_error_code(ErrorCode::UnknownTopicOrPartition.code());
                    };
                    if log.leader != id {
                        return response.with_error_code(ErrorCode::NotLeaderForPartition.code());
                    }
                    let raw = RawRecordSet(partition.records.unwrap_or_default());
                    let records = match raw.decode_batches() {
                        Ok(decoded) if decoded.truncated.is_none() => decoded.records,
                        Ok(_) | Err(_) => {
                            debug!(index, "rejecting unreadable produce batch");
                            return response.with_error_code(ErrorCode::CorruptMessage.code());
                        }
                    };
                    match log.append(records, now_ms) {
                        Ok(base_offset) => response.with_base_offset(base_offset),
                        Err(code) => response.with_error_code(code.code()),
                    }
                })
                .collect();
            TopicProduceResponse::default()
                .with_name(topic.name)
                .with_partition_responses(partitions)
        })
        .collect();

    ProduceResponse::default().with_responses(responses)
}
