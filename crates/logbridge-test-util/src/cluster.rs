use std::io::Error as IoError;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use bytes::Bytes;
use kafka_protocol::messages::ApiKey;
use kafka_protocol::records::Record;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::debug;

use logbridge_protocol::record::NO_TIMESTAMP;
use logbridge_protocol::record::new_record;
use logbridge_types::BrokerId;
use logbridge_types::Offset;
use logbridge_types::PartitionId;

use crate::broker::serve;
use crate::broker::LOOPBACK;
use crate::state::ClusterState;
use crate::state::PartitionLog;
use crate::state::SharedState;

/// Brokers listening on loopback ports, sharing one in memory log store.
///
/// Dropping the cluster stops every broker and closes their connections.
pub struct TestCluster {
    state: SharedState,
    tasks: JoinSet<()>,
}

impl TestCluster {
    pub async fn start(brokers: usize) -> Result<Self, IoError> {
        let state: SharedState = Arc::new(Mutex::new(ClusterState::default()));
        let mut tasks = JoinSet::new();
        for id in 0..brokers.max(1) {
            let id = id as BrokerId;
            let listener = TcpListener::bind((LOOPBACK, 0)).await?;
            let port = listener.local_addr()?.port();
            debug!(id, port, "test broker listening");
            state.lock().brokers.push((id, port));
            tasks.spawn(serve(id, listener, state.clone()));
        }
        Ok(Self { state, tasks })
    }

    /// `host:port` of every broker
    pub fn bootstrap(&self) -> Vec<String> {
        self.state
            .lock()
            .brokers
            .iter()
            .map(|(_, port)| format!("{LOOPBACK}:{port}"))
            .collect()
    }

    pub fn broker_ids(&self) -> Vec<BrokerId> {
        self.state.lock().brokers.iter().map(|(id, _)| *id).collect()
    }

    /// Creates a topic, assigning leaders round robin over the brokers.
    pub fn create_topic(&self, name: &str, partitions: PartitionId) {
        let mut state = self.state.lock();
        let brokers: Vec<BrokerId> = state.brokers.iter().map(|(id, _)| *id).collect();
        let logs = (0..partitions.max(0) as usize)
            .map(|index| PartitionLog::new(brokers[index % brokers.len()]))
            .collect();
        state.topics.insert(name.to_owned(), logs);
    }

    pub fn leader(&self, topic: &str, partition: PartitionId) -> Option<BrokerId> {
        self.state.lock().partition(topic, partition).map(|log| log.leader)
    }

    /// Moves leadership and updates metadata to match.
    pub fn move_leader(&self, topic: &str, partition: PartitionId, broker: BrokerId) {
        if let Some(log) = self.state.lock().partition_mut(topic, partition) {
            log.leader = broker;
            log.advertised_leader = broker;
        }
    }

    /// Moves leadership while metadata keeps reporting the previous leader.
    pub fn move_leader_silently(&self, topic: &str, partition: PartitionId, broker: BrokerId) {
        if let Some(log) = self.state.lock().partition_mut(topic, partition) {
            log.leader = broker;
        }
    }

    /// Appends values as one batch, bypassing the wire. Returns the base offset.
    pub fn append<I, V>(&self, topic: &str, partition: PartitionId, values: I) -> Offset
    where
        I: IntoIterator<Item = V>,
        V: Into<Bytes>,
    {
        let records: Vec<Record> = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| new_record(index as Offset, None, value.into(), NO_TIMESTAMP))
            .collect();
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or_default();
        let mut state = self.state.lock();
        let log = state
            .partition_mut(topic, partition)
            .expect("partition exists");
        log.append(records, now_ms).expect("batch encodes")
    }

    pub fn high_watermark(&self, topic: &str, partition: PartitionId) -> Option<Offset> {
        self.state
            .lock()
            .partition(topic, partition)
            .map(|log| log.high_watermark)
    }

    /// Flips the last byte of a stored batch so its crc no longer matches.
    pub fn corrupt_batch(&self, topic: &str, partition: PartitionId, batch: usize) -> bool {
        let mut state = self.state.lock();
        let Some(stored) = state
            .partition_mut(topic, partition)
            .and_then(|log| log.batches.get_mut(batch))
        else {
            return false;
        };
        let mut bytes = stored.bytes.to_vec();
        if let Some(last) = bytes.last_mut() {
            *last ^= 0xFF;
        }
        stored.bytes = Bytes::from(bytes);
        true
    }

    /// Drops the oldest batches of a partition, moving its start offset.
    pub fn truncate_front(&self, topic: &str, partition: PartitionId, batches: usize) -> Option<Offset> {
        let mut state = self.state.lock();
        let log = state.partition_mut(topic, partition)?;
        log.drop_front(batches);
        Some(log.start_offset())
    }

    /// requests of one api served so far, across all brokers
    pub fn requests(&self, api: ApiKey) -> usize {
        self.state
            .lock()
            .requests
            .get(&(api as i16))
            .copied()
            .unwrap_or_default()
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        self.tasks.abort_all();
    }
}

#[cfg(test)]
mod test {

    use std::time::Duration;

    use kafka_protocol::messages::ApiKey;
    use kafka_protocol::messages::FetchRequest;
    use kafka_protocol::messages::ListOffsetsRequest;
    use kafka_protocol::messages::MetadataRequest;
    use kafka_protocol::messages::TopicName;
    use kafka_protocol::messages::fetch_request::FetchPartition;
    use kafka_protocol::messages::fetch_request::FetchTopic;
    use kafka_protocol::messages::list_offsets_request::ListOffsetsPartition;
    use kafka_protocol::messages::list_offsets_request::ListOffsetsTopic;
    use kafka_protocol::messages::metadata_request::MetadataRequestTopic;
    use kafka_protocol::protocol::StrBytes;

    use logbridge_protocol::api::RequestMessage;
    use logbridge_protocol::link::ErrorCode;
    use logbridge_socket::BrokerSocket;

    use super::TestCluster;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn name(topic: &'static str) -> TopicName {
        TopicName::from(StrBytes::from_static_str(topic))
    }

    fn fetch(topic: &'static str, offset: i64) -> FetchRequest {
        let partition = FetchPartition::default()
            .with_partition(0)
            .with_fetch_offset(offset)
            .with_partition_max_bytes(1024);
        FetchRequest::default().with_max_bytes(1024).with_topics(vec![
            FetchTopic::default()
                .with_topic(name(topic))
                .with_partitions(vec![partition]),
        ])
    }

    #[tokio::test]
    async fn test_metadata_reports_leaders() {
        let cluster = TestCluster::start(2).await.expect("start");
        cluster.create_topic("t", 3);
        let bootstrap = cluster.bootstrap();

        let mut socket = BrokerSocket::connect(&bootstrap[1], TIMEOUT)
            .await
            .expect("connect");
        let request = MetadataRequest::default().with_topics(Some(vec![
            MetadataRequestTopic::default().with_name(Some(name("t"))),
        ]));
        let mut request = RequestMessage::new_request(request);
        let response = socket.send(&mut request).await.expect("metadata").response;

        assert_eq!(response.brokers.len(), 2);
        let topic = &response.topics[0];
        let leaders: Vec<_> = topic.partitions.iter().map(|p| p.leader_id.0).collect();
        assert_eq!(leaders, vec![0, 1, 0]);
        assert_eq!(cluster.requests(ApiKey::Metadata), 1);
    }

    #[tokio::test]
    async fn test_non_leader_rejects_fetch() {
        let cluster = TestCluster::start(2).await.expect("start");
        cluster.create_topic("t", 1);
        cluster.append("t", 0, ["a", "b"]);
        let bootstrap = cluster.bootstrap();

        let mut follower = BrokerSocket::connect(&bootstrap[1], TIMEOUT)
            .await
            .expect("connect");
        let mut request = RequestMessage::new_request(fetch("t", 0));
        let response = follower.send(&mut request).await.expect("fetch").response;
        let partition = &response.responses[0].partitions[0];
        assert_eq!(
            ErrorCode::from(partition.error_code),
            ErrorCode::NotLeaderForPartition
        );

        cluster.move_leader("t", 0, 1);
        let mut request = RequestMessage::new_request(fetch("t", 0));
        let response = follower.send(&mut request).await.expect("fetch").response;
        let partition = &response.responses[0].partitions[0];
        assert_eq!(ErrorCode::from(partition.error_code), ErrorCode::None);
        assert_eq!(partition.high_watermark, 2);
        assert!(partition.records.as_ref().is_some_and(|records| !records.is_empty()));
    }

    #[tokio::test]
    async fn test_list_offsets_after_truncation() {
        let cluster = TestCluster::start(1).await.expect("start");
        cluster.create_topic("t", 1);
        cluster.append("t", 0, ["a", "b"]);
        cluster.append("t", 0, ["c"]);
        assert_eq!(cluster.truncate_front("t", 0, 1), Some(2));

        let mut socket = BrokerSocket::connect(&cluster.bootstrap()[0], TIMEOUT)
            .await
            .expect("connect");
        let mut offsets = vec![];
        for timestamp in [-2, -1] {
            let request = ListOffsetsRequest::default().with_topics(vec![
                ListOffsetsTopic::default()
                    .with_name(name("t"))
                    .with_partitions(vec![
                        ListOffsetsPartition::default()
                            .with_partition_index(0)
                            .with_timestamp(timestamp),
                    ]),
            ]);
            let mut request = RequestMessage::new_request(request);
            let response = socket.send(&mut request).await.expect("offsets").response;
            offsets.push(response.topics[0].partitions[0].offset);
        }
        assert_eq!(offsets, vec![2, 3]);

        let mut request = RequestMessage::new_request(fetch("t", 0));
        let response = socket.send(&mut request).await.expect("fetch").response;
        assert_eq!(
            ErrorCode::from(response.responses[0].partitions[0].error_code),
            ErrorCode::OffsetOutOfRange
        );
    }
}
