use derive_builder::Builder;
use once_cell::sync::Lazy;

use logbridge_protocol::api::MAX_BYTES;
use logbridge_types::defaults::CLIENT_MAX_FETCH_BYTES;
use logbridge_types::defaults::LOGBRIDGE_MAX_FETCH_BYTES;

use super::ConfigError;
use super::ConnectionConfig;

/// Default fetch size, overridable through the environment.
pub static MAX_FETCH_BYTES: Lazy<i32> = Lazy::new(|| {
    use std::env;

    let var_value = env::var(LOGBRIDGE_MAX_FETCH_BYTES).unwrap_or_default();
    let max_bytes: i32 = var_value.parse().unwrap_or(CLIENT_MAX_FETCH_BYTES);
    max_bytes
});

/// Configures how partitions of a topic are read
#[derive(Debug, Builder, Clone)]
#[builder(build_fn(private, name = "build_impl"))]
pub struct ReadConfig {
    pub connection: ConnectionConfig,
    /// soft cap on the bytes returned by one fetch
    #[builder(default = "*MAX_FETCH_BYTES")]
    pub max_bytes: i32,
    /// stop reading a partition after this many records
    #[builder(default, setter(strip_option))]
    pub record_limit: Option<usize>,
}

impl ReadConfig {
    pub fn builder() -> ReadConfigBuilder {
        ReadConfigBuilder::default()
    }
}

impl ReadConfigBuilder {
    pub fn build(&self) -> Result<ReadConfig, ConfigError> {
        let config = self
            .build_impl()
            .map_err(|e| ConfigError::MissingOption(e.to_string()))?;
        config.connection.validate()?;
        if config.max_bytes <= 0 || config.max_bytes > MAX_BYTES {
            return Err(ConfigError::InvalidValue {
                name: "max_bytes",
                reason: format!("{} is outside 1..={MAX_BYTES}", config.max_bytes),
            });
        }
        Ok(config)
    }
}
