pub const PRODUCT_NAME: &str = "logbridge";
pub const CLIENT_ID: &str = "logbridge-client";

// Broker defaults
pub const BROKER_DEFAULT_HOST: &str = "localhost";
pub const BROKER_DEFAULT_PORT: u16 = 9092;

// Client defaults
pub const CLIENT_SOCKET_TIMEOUT_MS: u64 = 10_000;
pub const CLIENT_MAX_FETCH_BYTES: i32 = 1_000_000;
pub const CLIENT_PUBLISH_BATCH_SIZE: usize = 100;

// Env
pub const LOGBRIDGE_CONFIG: &str = "LOGBRIDGE_CONFIG";
pub const LOGBRIDGE_MAX_FETCH_BYTES: &str = "LOGBRIDGE_MAX_FETCH_BYTES";
pub const LOGBRIDGE_CONNECTION_RETRIES: &str = "LOGBRIDGE_CONNECTION_RETRIES";
