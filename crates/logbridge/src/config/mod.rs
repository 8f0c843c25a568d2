//!
//! # Client Configuration
//!
//! Connection settings shared by readers and publishers, plus the per path configs.
//!

mod connection;
mod file;
mod publish;
mod read;

use std::io::Error as IoError;

use thiserror::Error;

pub use self::connection::ConnectionConfig;
pub use self::file::ConfigFile;
pub use self::file::PublishSection;
pub use self::file::ReadSection;
pub use self::publish::PublishConfig;
pub use self::publish::PublishConfigBuilder;
pub use self::read::MAX_FETCH_BYTES;
pub use self::read::ReadConfig;
pub use self::read::ReadConfigBuilder;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file {msg}")]
    ConfigFileError { msg: String, source: IoError },
    #[error("Failed to deserialize logbridge config {msg}")]
    TomlError {
        msg: String,
        source: toml::de::Error,
    },
    #[error("Failed to serialize logbridge config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("at least one bootstrap broker is required")]
    NoBootstrap,
    #[error("invalid bootstrap address {0:?}, expected host:port")]
    InvalidBootstrap(String),
    #[error("Missing required config option: {0}")]
    MissingOption(String),
    #[error("invalid {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}
