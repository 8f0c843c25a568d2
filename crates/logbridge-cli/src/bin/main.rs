use clap::Parser;
use tracing_subscriber::EnvFilter;

use logbridge_cli::Root;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let root = Root::parse();
    root.process().await
}
