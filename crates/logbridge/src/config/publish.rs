use std::sync::Arc;

use derive_builder::Builder;

use logbridge_types::defaults::CLIENT_PUBLISH_BATCH_SIZE;

use crate::publisher::Partitioner;
use crate::publisher::SiphashRoundRobinPartitioner;

use super::ConfigError;
use super::ConnectionConfig;

fn default_partitioner() -> Arc<dyn Partitioner> {
    Arc::new(SiphashRoundRobinPartitioner::new())
}

/// Options used to adjust the behavior of the publisher.
/// Create this struct with [`PublishConfigBuilder`].
#[derive(Debug, Builder, Clone)]
#[builder(build_fn(private, name = "build_impl"))]
pub struct PublishConfig {
    pub connection: ConnectionConfig,
    /// records buffered per partition before a produce request is sent
    #[builder(default = "CLIENT_PUBLISH_BATCH_SIZE")]
    pub batch_size: usize,
    /// assigns the partition of each record
    #[builder(default = "default_partitioner()")]
    pub partitioner: Arc<dyn Partitioner>,
}

impl PublishConfig {
    pub fn builder() -> PublishConfigBuilder {
        PublishConfigBuilder::default()
    }
}

impl PublishConfigBuilder {
    pub fn build(&self) -> Result<PublishConfig, ConfigError> {
        let config = self
            .build_impl()
            .map_err(|e| ConfigError::MissingOption(e.to_string()))?;
        config.connection.validate()?;
        if config.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "batch_size",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {

    use crate::config::ConnectionConfig;

    use super::PublishConfig;

    #[test]
    fn test_publish_config_defaults() {
        let config = PublishConfig::builder()
            .connection(ConnectionConfig::new(["localhost:9092"]))
            .build()
            .expect("config");
        assert_eq!(config.batch_size, 100);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let result = PublishConfig::builder()
            .connection(ConnectionConfig::new(["localhost:9092"]))
            .batch_size(0)
            .build();
        assert!(result.is_err());
    }
}
