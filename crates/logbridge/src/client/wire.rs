use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use kafka_protocol::messages::BrokerId;
use kafka_protocol::messages::FetchRequest as FetchMessage;
use kafka_protocol::messages::FetchResponse;
use kafka_protocol::messages::ListOffsetsRequest;
use kafka_protocol::messages::ListOffsetsResponse;
use kafka_protocol::messages::ProduceRequest;
use kafka_protocol::messages::ProduceResponse;
use kafka_protocol::messages::fetch_request::FetchPartition;
use kafka_protocol::messages::fetch_request::FetchTopic;
use kafka_protocol::messages::fetch_response::PartitionData;
use kafka_protocol::messages::list_offsets_request::ListOffsetsPartition;
use kafka_protocol::messages::list_offsets_request::ListOffsetsTopic;
use kafka_protocol::messages::list_offsets_response::ListOffsetsPartitionResponse;
use kafka_protocol::messages::produce_request::PartitionProduceData;
use kafka_protocol::messages::produce_request::TopicProduceData;
use kafka_protocol::messages::produce_response::PartitionProduceResponse;
use kafka_protocol::records::Record;
use tracing::debug;
use tracing::instrument;
use tracing::trace;

use logbridge_protocol::api::MAX_BYTES;
use logbridge_protocol::api::Request;
use logbridge_protocol::api::RequestMessage;
use logbridge_protocol::link::ErrorCode;
use logbridge_protocol::record::RawRecordSet;
use logbridge_protocol::record::Truncated;
use logbridge_protocol::record::encode_batch;
use logbridge_socket::BrokerSocket;
use logbridge_types::Offset as RawOffset;
use logbridge_types::PartitionId;

use crate::config::ConnectionConfig;
use crate::metadata::BrokerEndpoint;
use crate::metadata::topic_name;
use crate::BridgeError;
use crate::PartitionOffsets;
use crate::Result;

use super::FetchRequest;
use super::FetchResult;
use super::Fetcher;

/// ListOffsets timestamps asking for the log start and the high water mark
const EARLIEST_TIMESTAMP: i64 = -2;
const LATEST_TIMESTAMP: i64 = -1;

/// Produce acks: wait for the leader only
const LEADER_ACK: i16 = 1;

const CONSUMER_REPLICA_ID: i32 = -1;

/// Talks to partition leaders, keeping one socket per endpoint.
///
/// A socket is dropped on any failure, so the next request to that
/// endpoint reconnects. Requests are never retried here.
pub struct WireClient {
    config: ConnectionConfig,
    sockets: HashMap<String, BrokerSocket>,
}

impl fmt::Debug for WireClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WireClient")
            .field("client_id", &self.config.client_id())
            .field("connections", &self.sockets.len())
            .finish()
    }
}

impl WireClient {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            sockets: HashMap::new(),
        }
    }

    /// number of cached leader connections
    pub fn connections(&self) -> usize {
        self.sockets.len()
    }

    async fn send_receive<R>(
        &mut self,
        leader: &BrokerEndpoint,
        request: R,
        topic: &str,
        partition: PartitionId,
    ) -> Result<R::Response>
    where
        R: Request + Send + Sync,
        R::Response: Send,
    {
        let addr = leader.addr();
        let mut socket = match self.sockets.remove(&addr) {
            Some(socket) => socket,
            None => {
                debug!(%addr, "connecting to leader");
                BrokerSocket::connect(&addr, self.config.socket_timeout)
                    .await
                    .map_err(|err| BridgeError::from_socket(err, &addr, topic, partition))?
            }
        };

        let mut message = RequestMessage::new_request(request).set_client_id(self.config.client_id());
        match socket.send(&mut message).await {
            Ok(response) => {
                self.sockets.insert(addr, socket);
                Ok(response.response)
            }
            Err(err) => {
                debug!(%addr, %err, "dropping leader connection");
                Err(BridgeError::from_socket(err, &addr, topic, partition))
            }
        }
    }

    async fn fetch_partition(
        &mut self,
        request: &FetchRequest,
        max_bytes: i32,
    ) -> Result<PartitionData> {
        let partition = FetchPartition::default()
            .with_partition(request.partition)
            .with_fetch_offset(request.offset)
            .with_partition_max_bytes(max_bytes);
        let topic = FetchTopic::default()
            .with_topic(topic_name(&request.topic))
            .with_partitions(vec![partition]);
        let message = FetchMessage::default()
            .with_replica_id(BrokerId::from(CONSUMER_REPLICA_ID))
            .with_max_wait_ms(0)
            .with_min_bytes(0)
            .with_max_bytes(max_bytes)
            .with_topics(vec![topic]);

        let response = self
            .send_receive(&request.leader, message, &request.topic, request.partition)
            .await?;
        find_fetch_partition(response, &request.topic, request.partition).ok_or_else(|| {
            BridgeError::PartitionNotFound(request.topic.clone(), request.partition)
        })
    }

    /// Appends records to a partition, returning the base offset the leader assigned.
    #[instrument(skip(self, leader, records), fields(records = records.len()))]
    pub async fn produce(
        &mut self,
        topic: &str,
        partition: PartitionId,
        leader: &BrokerEndpoint,
        mut records: Vec<Record>,
    ) -> Result<RawOffset> {
        for (index, record) in records.iter_mut().enumerate() {
            record.offset = index as RawOffset;
        }
        let batch = encode_batch(&records).map_err(|err| {
            debug!(%err, "records do not form a batch");
            BridgeError::Publish {
                topic: topic.to_owned(),
                partition,
                code: ErrorCode::CorruptMessage,
            }
        })?;

        let timeout_ms = i32::try_from(self.config.socket_timeout.as_millis()).unwrap_or(i32::MAX);
        let request = ProduceRequest::default()
            .with_acks(LEADER_ACK)
            .with_timeout_ms(timeout_ms)
            .with_topic_data(vec![
                TopicProduceData::default()
                    .with_name(topic_name(topic))
                    .with_partition_data(vec![
                        PartitionProduceData::default()
                            .with_index(partition)
                            .with_records(Some(batch)),
                    ]),
            ]);
        let response = self
            .send_receive(leader, request, topic, partition)
            .await?;

        let partition_response = find_produce_partition(response, topic, partition)
            .ok_or_else(|| BridgeError::PartitionNotFound(topic.to_owned(), partition))?;
        let code = ErrorCode::from(partition_response.error_code);
        if code.is_error() {
            return Err(BridgeError::Publish {
                topic: topic.to_owned(),
                partition,
                code,
            });
        }
        debug!(base_offset = partition_response.base_offset, "records appended");
        Ok(partition_response.base_offset)
    }
}

#[async_trait]
impl Fetcher for WireClient {
    /// Fetches records at the requested offset.
    ///
    /// When the leader cuts the response before the first complete batch, the fetch is
    /// repeated with room for that batch, up to [`MAX_BYTES`].
    #[instrument(
        skip(self, request),
        fields(topic = %request.topic, partition = request.partition, offset = request.offset)
    )]
    async fn fetch(&mut self, request: &FetchRequest) -> Result<FetchResult> {
        let mut max_bytes = request.max_bytes;

        loop {
            let response = self.fetch_partition(request, max_bytes).await?;
            let code = ErrorCode::from(response.error_code);
            if code == ErrorCode::OffsetOutOfRange {
                // past the end is an empty read, only offsets before the log start fail
                let offsets = self
                    .fetch_offsets(&request.topic, request.partition, &request.leader)
                    .await?;
                if request.offset >= offsets.high_watermark {
                    debug!(high_watermark = offsets.high_watermark, "offset past the end of the log");
                    return Ok(FetchResult::empty(request.offset, offsets.high_watermark));
                }
            }
            if code.is_error() {
                return Err(BridgeError::from_code(
                    code,
                    &request.topic,
                    request.partition,
                    &request.leader.addr(),
                    request.offset,
                ));
            }

            let high_watermark = response.high_watermark;
            if request.offset >= high_watermark {
                debug!(high_watermark, "no records at offset");
                return Ok(FetchResult::empty(request.offset, high_watermark));
            }

            let raw = RawRecordSet(response.records.unwrap_or_default());
            let decoded = raw.decode_batches().map_err(|source| BridgeError::Decode {
                topic: request.topic.clone(),
                partition: request.partition,
                source,
            })?;
            let truncated = decoded.truncated;
            trace!(batches = decoded.batches, ?truncated, "decoded fetch response");

            let records: Vec<_> = decoded
                .into_consumer_records(request.partition)
                .into_iter()
                .filter(|record| record.offset >= request.offset)
                .collect();

            if let Some(last) = records.last() {
                let next_offset = last.offset + 1;
                debug!(records = records.len(), next_offset, max_bytes, "fetched records");
                return Ok(FetchResult {
                    records,
                    next_offset,
                    high_watermark,
                });
            }

            match truncated {
                Some(truncated) if max_bytes < MAX_BYTES => {
                    max_bytes = enlarged_max_bytes(&truncated, max_bytes);
                    debug!(max_bytes, "batch exceeds fetch size, enlarging");
                }
                Some(_) => {
                    return Err(BridgeError::Broker {
                        topic: request.topic.clone(),
                        partition: request.partition,
                        code: ErrorCode::MessageTooLarge,
                    });
                }
                None => {
                    debug!(high_watermark, "no complete records at offset");
                    return Ok(FetchResult::empty(request.offset, high_watermark));
                }
            }
        }
    }

    #[instrument(skip(self, leader))]
    async fn fetch_offsets(
        &mut self,
        topic: &str,
        partition: PartitionId,
        leader: &BrokerEndpoint,
    ) -> Result<PartitionOffsets> {
        let start_offset = self
            .list_offset(topic, partition, leader, EARLIEST_TIMESTAMP)
            .await?;
        let high_watermark = self
            .list_offset(topic, partition, leader, LATEST_TIMESTAMP)
            .await?;
        let offsets = PartitionOffsets {
            start_offset,
            high_watermark,
        };
        debug!(?offsets, "partition offsets");
        Ok(offsets)
    }
}

impl WireClient {
    async fn list_offset(
        &mut self,
        topic: &str,
        partition: PartitionId,
        leader: &BrokerEndpoint,
        timestamp: i64,
    ) -> Result<RawOffset> {
        let request = ListOffsetsRequest::default()
            .with_replica_id(BrokerId::from(CONSUMER_REPLICA_ID))
            .with_topics(vec![
                ListOffsetsTopic::default()
                    .with_name(topic_name(topic))
                    .with_partitions(vec![
                        ListOffsetsPartition::default()
                            .with_partition_index(partition)
                            .with_timestamp(timestamp),
                    ]),
            ]);
        let response = self
            .send_receive(leader, request, topic, partition)
            .await?;
        let partition_response = find_offsets_partition(response, topic, partition)
            .ok_or_else(|| BridgeError::PartitionNotFound(topic.to_owned(), partition))?;
        let code = ErrorCode::from(partition_response.error_code);
        if code.is_error() {
            return Err(BridgeError::from_code(
                code,
                topic,
                partition,
                &leader.addr(),
                -1,
            ));
        }
        trace!(timestamp, offset = partition_response.offset, "listed offset");
        Ok(partition_response.offset)
    }
}

fn find_fetch_partition(
    response: FetchResponse,
    topic: &str,
    partition: PartitionId,
) -> Option<PartitionData> {
    response
        .responses
        .into_iter()
        .filter(|response| response.topic.as_str() == topic)
        .flat_map(|response| response.partitions)
        .find(|data| data.partition_index == partition)
}

fn find_offsets_partition(
    response: ListOffsetsResponse,
    topic: &str,
    partition: PartitionId,
) -> Option<ListOffsetsPartitionResponse> {
    response
        .topics
        .into_iter()
        .filter(|response| response.name.as_str() == topic)
        .flat_map(|response| response.partitions)
        .find(|data| data.partition_index == partition)
}

fn find_produce_partition(
    response: ProduceResponse,
    topic: &str,
    partition: PartitionId,
) -> Option<PartitionProduceResponse> {
    response
        .responses
        .into_iter()
        .filter(|response| response.name.as_str() == topic)
        .flat_map(|response| response.partition_responses)
        .find(|data| data.index == partition)
}

/// Size for the next attempt: the declared size of the cut batch when it is known
/// and larger, otherwise double. Never above [`MAX_BYTES`].
fn enlarged_max_bytes(truncated: &Truncated, max_bytes: i32) -> i32 {
    let doubled = max_bytes.saturating_mul(2);
    let wanted = truncated
        .fetch_size_hint()
        .and_then(|hint| i32::try_from(hint).ok())
        .filter(|hint| *hint > max_bytes)
        .unwrap_or(doubled);
    wanted.min(MAX_BYTES)
}
