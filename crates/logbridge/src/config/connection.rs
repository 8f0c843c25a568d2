use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use logbridge_types::defaults::CLIENT_ID;
use logbridge_types::defaults::CLIENT_SOCKET_TIMEOUT_MS;

use super::ConfigError;

fn default_socket_timeout() -> Duration {
    Duration::from_millis(CLIENT_SOCKET_TIMEOUT_MS)
}

/// Where and how to reach the brokers
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// `host:port` of brokers used for metadata discovery
    pub bootstrap: Vec<String>,

    /// sent in every request header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// bound on connecting and on every request/response exchange
    #[serde(default = "default_socket_timeout", with = "humantime_serde")]
    pub socket_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new<I, S>(bootstrap: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bootstrap: bootstrap.into_iter().map(Into::into).collect(),
            client_id: None,
            socket_timeout: default_socket_timeout(),
        }
    }

    pub fn with_client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_socket_timeout(mut self, socket_timeout: Duration) -> Self {
        self.socket_timeout = socket_timeout;
        self
    }

    pub fn client_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or(CLIENT_ID)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bootstrap.is_empty() {
            return Err(ConfigError::NoBootstrap);
        }
        for addr in &self.bootstrap {
            let valid = addr
                .rsplit_once(':')
                .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                .unwrap_or(false);
            if !valid {
                return Err(ConfigError::InvalidBootstrap(addr.clone()));
            }
        }
        if self.socket_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "socket_timeout",
                reason: "must be greater than zero".to_owned(),
            });
        }
        Ok(())
    }
}
