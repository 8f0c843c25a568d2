use std::env;
use std::fs::read_to_string;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use logbridge_types::defaults::LOGBRIDGE_CONFIG;

use super::ConfigError;
use super::ConnectionConfig;
use super::PublishConfig;
use super::ReadConfig;

/// Layout of a logbridge TOML config file
///
/// ```toml
/// [connection]
/// bootstrap = ["localhost:9092"]
/// socket_timeout = "5s"
///
/// [read]
/// max_bytes = 65536
///
/// [publish]
/// batch_size = 500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub connection: ConnectionConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<ReadSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadSection {
    pub max_bytes: Option<i32>,
    pub record_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishSection {
    pub batch_size: Option<usize>,
}

impl ConfigFile {
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            read: None,
            publish: None,
        }
    }

    /// Load from `path`, or from the file named by `LOGBRIDGE_CONFIG` when no path is given.
    pub fn load(path: Option<PathBuf>) -> Result<Option<Self>, ConfigError> {
        let path = match path.or_else(|| env::var(LOGBRIDGE_CONFIG).ok().map(PathBuf::from)) {
            Some(path) => path,
            None => return Ok(None),
        };
        Self::from_file(path).map(Some)
    }

    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        debug!(path = %path_ref.display(), "loading config file");
        let file_str = read_to_string(path_ref).map_err(|source| ConfigError::ConfigFileError {
            msg: path_ref.display().to_string(),
            source,
        })?;
        Self::from_toml(&file_str, &path_ref.display().to_string())
    }

    pub fn from_toml(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::TomlError {
            msg: origin.to_owned(),
            source,
        })?;
        config.connection.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn read_config(&self) -> Result<ReadConfig, ConfigError> {
        let mut builder = ReadConfig::builder();
        builder.connection(self.connection.clone());
        if let Some(read) = &self.read {
            if let Some(max_bytes) = read.max_bytes {
                builder.max_bytes(max_bytes);
            }
            if let Some(limit) = read.record_limit {
                builder.record_limit(limit);
            }
        }
        builder.build()
    }

    pub fn publish_config(&self) -> Result<PublishConfig, ConfigError> {
        let mut builder = PublishConfig::builder();
        builder.connection(self.connection.clone());
        if let Some(batch_size) = self.publish.as_ref().and_then(|p| p.batch_size) {
            builder.batch_size(batch_size);
        }
        builder.build()
    }
}
