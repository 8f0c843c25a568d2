//!
//! # Logbridge CLI
//!
//! `logbridge read` and `logbridge write` over the library's collections.
//!

mod read;
mod write;

use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;

use logbridge::config::ConfigFile;
use logbridge::config::ConnectionConfig;

pub use self::read::ReadOpt;
pub use self::write::WriteOpt;

#[derive(Debug, Parser)]
#[command(name = "logbridge", version, about = "Bridge broker topics and batch jobs")]
pub struct Root {
    #[command(flatten)]
    pub target: TargetOpt,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Read every partition of a topic once and print the records
    Read(ReadOpt),
    /// Publish lines from stdin or a file to a topic
    Write(WriteOpt),
}

/// Where the brokers are
#[derive(Debug, Clone, clap::Args)]
pub struct TargetOpt {
    /// Path to a TOML config file, `LOGBRIDGE_CONFIG` is used when omitted
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Bootstrap broker, overrides the config file
    #[arg(short = 'B', long, global = true, value_name = "host:port")]
    pub bootstrap: Vec<String>,
}

impl TargetOpt {
    /// Config file contents, with the bootstrap list replaced when given on the command line
    pub fn load(&self) -> Result<ConfigFile> {
        let file = ConfigFile::load(self.config.clone()).context("loading config file")?;
        let file = match (file, self.bootstrap.is_empty()) {
            (Some(mut file), false) => {
                file.connection.bootstrap = self.bootstrap.clone();
                file
            }
            (Some(file), true) => file,
            (None, false) => ConfigFile::new(ConnectionConfig::new(self.bootstrap.clone())),
            (None, true) => anyhow::bail!("no brokers given, use --bootstrap or --config"),
        };
        Ok(file)
    }
}

impl Root {
    pub async fn process(self) -> Result<()> {
        let config = self.target.load()?;
        match self.command {
            Command::Read(opt) => opt.process(config).await,
            Command::Write(opt) => opt.process(config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Command;
    use super::Root;

    fn parse(command: &str) -> Result<Root, clap::Error> {
        Root::try_parse_from(command.split_whitespace())
    }

    #[test]
    fn test_read_parsing() {
        let root = parse("logbridge -B localhost:9092 read events --offset 0:6 --offset 2:10 --from-end")
            .expect("parses");
        assert_eq!(root.target.bootstrap, vec!["localhost:9092".to_owned()]);
        match root.command {
            Command::Read(opt) => {
                assert_eq!(opt.topic, "events");
                assert_eq!(opt.offsets, vec![(0, 6), (2, 10)]);
                assert!(opt.from_end);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_write_parsing() {
        let root = parse("logbridge write events --key-separator = --config /tmp/lb.toml")
            .expect("parses");
        assert!(root.target.config.is_some());
        match root.command {
            Command::Write(opt) => assert_eq!(opt.key_separator.as_deref(), Some("=")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_bad_offset_is_rejected() {
        assert!(parse("logbridge read events --offset zero").is_err());
        assert!(parse("logbridge").is_err());
    }

    #[test]
    fn test_bootstrap_without_file() {
        let root = parse("logbridge -B a:1 -B b:2 read t").expect("parses");
        let config = root.target.load().expect("config");
        assert_eq!(config.connection.bootstrap, vec!["a:1".to_owned(), "b:2".to_owned()]);
    }
}
