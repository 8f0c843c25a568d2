//!
//! # Cluster Metadata
//!
//! Partition and leader discovery through any bootstrap broker.
//!

use std::fmt;

use async_trait::async_trait;
use kafka_protocol::messages::MetadataRequest;
use kafka_protocol::messages::MetadataResponse;
use kafka_protocol::messages::TopicName;
use kafka_protocol::messages::metadata_request::MetadataRequestTopic;
use kafka_protocol::protocol::StrBytes;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use logbridge_protocol::api::RequestMessage;
use logbridge_protocol::link::ErrorCode;
use logbridge_socket::BrokerSocket;
use logbridge_types::BrokerId;
use logbridge_types::PartitionId;

use crate::config::ConnectionConfig;
use crate::BridgeError;
use crate::Result;

/// Leader id of a partition that currently has none
const NO_LEADER: BrokerId = -1;

/// A broker that can be connected to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrokerEndpoint {
    pub id: BrokerId,
    pub host: String,
    pub port: u16,
}

impl BrokerEndpoint {
    pub fn new<S: Into<String>>(id: BrokerId, host: S, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLeader {
    pub partition: PartitionId,
    pub leader: BrokerEndpoint,
}

/// Every partition of a topic with its current leader, ordered by partition
#[derive(Debug, Clone)]
pub struct TopicPartitions {
    pub topic: String,
    pub partitions: Vec<PartitionLeader>,
}

impl TopicPartitions {
    pub fn leader(&self, partition: PartitionId) -> Option<&BrokerEndpoint> {
        self.partitions
            .iter()
            .find(|p| p.partition == partition)
            .map(|p| &p.leader)
    }

    pub fn partition_ids(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.partitions.iter().map(|p| p.partition)
    }
}

/// Finds the current leader of a partition
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LeaderResolver: Send + Sync {
    async fn resolve_leader(&self, topic: &str, partition: PartitionId) -> Result<BrokerEndpoint>;
}

/// Metadata client backed by the bootstrap brokers.
/// Brokers are tried in order until one answers.
#[derive(Debug, Clone)]
pub struct ClusterMetadata {
    config: ConnectionConfig,
}

impl ClusterMetadata {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self))]
    pub async fn topic_partitions(&self, topic: &str) -> Result<TopicPartitions> {
        let response = self.fetch_metadata(topic).await?;
        to_topic_partitions(topic, &response)
    }

    async fn fetch_metadata(&self, topic: &str) -> Result<MetadataResponse> {
        let mut last_error = None;
        for addr in &self.config.bootstrap {
            debug!(%addr, topic, "requesting metadata");
            match self.request_metadata(addr, topic).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(%addr, %err, "bootstrap broker did not answer metadata request");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(BridgeError::Config(
            crate::config::ConfigError::NoBootstrap,
        )))
    }

    async fn request_metadata(&self, addr: &str, topic: &str) -> Result<MetadataResponse> {
        let to_error = |err| BridgeError::from_socket(err, addr, topic, -1);
        let mut socket = BrokerSocket::connect(addr, self.config.socket_timeout)
            .await
            .map_err(to_error)?;
        let request = MetadataRequest::default().with_topics(Some(vec![
            MetadataRequestTopic::default().with_name(Some(topic_name(topic))),
        ]));
        let mut message =
            RequestMessage::new_request(request).set_client_id(self.config.client_id());
        let response = socket.send(&mut message).await.map_err(to_error)?;
        Ok(response.response)
    }
}

#[async_trait]
impl LeaderResolver for ClusterMetadata {
    async fn resolve_leader(&self, topic: &str, partition: PartitionId) -> Result<BrokerEndpoint> {
        let partitions = self.topic_partitions(topic).await?;
        partitions
            .leader(partition)
            .cloned()
            .ok_or_else(|| BridgeError::PartitionNotFound(topic.to_owned(), partition))
    }
}

pub(crate) fn topic_name(topic: &str) -> TopicName {
    TopicName::from(StrBytes::from_string(topic.to_owned()))
}

fn to_topic_partitions(topic: &str, response: &MetadataResponse) -> Result<TopicPartitions> {
    let topic_metadata = response
        .topics
        .iter()
        .find(|metadata| metadata.name.as_ref().is_some_and(|name| name.as_str() == topic))
        .ok_or_else(|| BridgeError::TopicNotFound(topic.to_owned()))?;
    match ErrorCode::from(topic_metadata.error_code) {
        ErrorCode::None => {}
        ErrorCode::UnknownTopicOrPartition => {
            return Err(BridgeError::TopicNotFound(topic.to_owned()));
        }
        code => {
            return Err(BridgeError::Broker {
                topic: topic.to_owned(),
                partition: -1,
                code,
            });
        }
    }

    let mut partitions = Vec::with_capacity(topic_metadata.partitions.len());
    for partition in &topic_metadata.partitions {
        let index = partition.partition_index;
        let leader_id = partition.leader_id.0;
        if ErrorCode::from(partition.error_code).is_error() || leader_id == NO_LEADER {
            return Err(BridgeError::LeaderNotAvailable(topic.to_owned(), index));
        }
        let broker = response
            .brokers
            .iter()
            .find(|broker| broker.node_id.0 == leader_id)
            .ok_or_else(|| BridgeError::LeaderNotAvailable(topic.to_owned(), index))?;
        let port = u16::try_from(broker.port)
            .map_err(|_| BridgeError::LeaderNotAvailable(topic.to_owned(), index))?;
        partitions.push(PartitionLeader {
            partition: index,
            leader: BrokerEndpoint::new(leader_id, broker.host.as_str(), port),
        });
    }
    partitions.sort_by_key(|p| p.partition);

    Ok(TopicPartitions {
        topic: topic.to_owned(),
        partitions,
    })
}

#[cfg(test)]
mod test {

    use std::time::Duration;

    use kafka_protocol::messages::BrokerId;
    use kafka_protocol::messages::MetadataResponse;
    use kafka_protocol::messages::metadata_response::MetadataResponseBroker;
    use kafka_protocol::messages::metadata_response::MetadataResponsePartition;
    use kafka_protocol::messages::metadata_response::MetadataResponseTopic;
    use kafka_protocol::protocol::StrBytes;
    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use logbridge_protocol::link::ErrorCode;

    use crate::config::ConnectionConfig;
    use crate::BridgeError;
    use crate::ErrorKind;

    use super::ClusterMetadata;
    use super::to_topic_partitions;
    use super::topic_name;

    fn broker(id: i32, host: &'static str, port: i32) -> MetadataResponseBroker {
        MetadataResponseBroker::default()
            .with_node_id(BrokerId::from(id))
            .with_host(StrBytes::from_static_str(host))
            .with_port(port)
    }

    fn response(leaders: &[(i32, i32)]) -> MetadataResponse {
        let partitions = leaders
            .iter()
            .map(|(partition, leader)| {
                MetadataResponsePartition::default()
                    .with_partition_index(*partition)
                    .with_leader_id(BrokerId::from(*leader))
            })
            .collect();
        let topic = MetadataResponseTopic::default()
            .with_name(Some(topic_name("t")))
            .with_partitions(partitions);
        MetadataResponse::default()
            .with_brokers(vec![broker(0, "a", 9000), broker(1, "b", 9001)])
            .with_topics(vec![topic])
    }

    #[test]
    fn test_partitions_sorted_with_leaders() {
        let partitions = to_topic_partitions("t", &response(&[(1, 1), (0, 0)])).expect("ok");
        let ids: Vec<_> = partitions.partition_ids().collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(partitions.leader(1).map(|l| l.addr()), Some("b:9001".to_owned()));
    }

    #[test]
    fn test_missing_topic() {
        let err = to_topic_partitions("other", &response(&[(0, 0)])).expect_err("missing");
        assert!(matches!(err, BridgeError::TopicNotFound(_)));
    }

    #[test]
    fn test_unknown_topic_code() {
        let mut response = response(&[]);
        response.topics[0].error_code = ErrorCode::UnknownTopicOrPartition.code();
        let err = to_topic_partitions("t", &response).expect_err("unknown");
        assert!(matches!(err, BridgeError::TopicNotFound(_)));
    }

    #[test]
    fn test_partition_without_leader() {
        let err = to_topic_partitions("t", &response(&[(0, -1)])).expect_err("no leader");
        assert!(matches!(err, BridgeError::LeaderNotAvailable(_, 0)));
    }

    #[test]
    fn test_leader_not_in_broker_list() {
        let err = to_topic_partitions("t", &response(&[(0, 5)])).expect_err("unknown broker");
        assert!(matches!(err, BridgeError::LeaderNotAvailable(_, 0)));
    }

    #[tokio::test]
    async fn test_unreadable_metadata_is_decode_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();

        let server = tokio::spawn(async move {
            let (mut tcp, _) = listener.accept().await.expect("accept");
            let mut request = [0_u8; 64];
            let _ = tcp.read(&mut request).await.expect("request");
            // a correlation id and nothing else, too short for any metadata body
            tcp.write_all(&[0, 0, 0, 6, 0, 0, 0, 1, 0, 0])
                .await
                .expect("reply");
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let config = ConnectionConfig::new(vec![addr]).with_socket_timeout(Duration::from_secs(2));
        let err = ClusterMetadata::new(config)
            .topic_partitions("t")
            .await
            .expect_err("undecodable");
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(!err.is_retriable());
        server.await.expect("server");
    }
}
