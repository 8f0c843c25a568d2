//! In process broker for tests.
//!
//! [`TestCluster`] speaks the Kafka wire protocol on loopback ports. It keeps
//! partitions in memory, cuts fetch responses at the requested size and can move
//! partition leadership around while clients are connected.

mod broker;
mod cluster;
mod state;

pub use self::cluster::TestCluster;

/// Installs a fmt subscriber writing to the test output, filtered by `RUST_LOG`.
/// Safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
