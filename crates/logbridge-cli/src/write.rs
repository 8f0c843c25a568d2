use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use bytes::Bytes;
use clap::Args;

use logbridge::config::ConfigFile;
use logbridge::engine::LocalEngine;
use logbridge::engine::ParallelCollection;
use logbridge::write_to_broker;
use logbridge::write_with_keys_to_broker;

/// Publish one record per input line
#[derive(Debug, Args)]
pub struct WriteOpt {
    /// Topic name
    #[arg(value_name = "topic")]
    pub topic: String,

    /// Read lines from this file instead of stdin
    #[arg(short, long, value_name = "path")]
    pub file: Option<PathBuf>,

    /// Split each line at the first separator into key and value
    #[arg(long, value_name = "separator")]
    pub key_separator: Option<String>,

    /// Records buffered per partition before they are sent
    #[arg(long, value_name = "integer")]
    pub batch_size: Option<usize>,

    /// Number of slices the input is split into
    #[arg(long, default_value_t = 1, value_name = "integer")]
    pub slices: usize,
}

impl WriteOpt {
    pub async fn process(self, mut file: ConfigFile) -> Result<()> {
        if self.batch_size.is_some() {
            file.publish.get_or_insert_with(Default::default).batch_size = self.batch_size;
        }
        let config = file.publish_config()?;
        let lines = self.read_lines()?;
        let engine = LocalEngine::default();

        let sent = match &self.key_separator {
            Some(separator) => {
                let pairs = lines
                    .iter()
                    .map(|line| split_key_value(line, separator))
                    .collect::<Result<Vec<_>>>()?;
                let source = Arc::new(ParallelCollection::from_vec(pairs, self.slices));
                write_with_keys_to_broker(source, &self.topic, &config, &engine).await?
            }
            None => {
                let source = Arc::new(ParallelCollection::from_vec(lines, self.slices));
                write_to_broker(source, &self.topic, &config, &engine).await?
            }
        };
        eprintln!("sent {sent} records to {}", self.topic);
        Ok(())
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        let reader: Box<dyn BufRead> = match &self.file {
            Some(path) => Box::new(BufReader::new(
                File::open(path).with_context(|| format!("opening {}", path.display()))?,
            )),
            None => Box::new(std::io::stdin().lock()),
        };
        let mut lines = vec![];
        for line in reader.lines() {
            let line = line?;
            if !line.is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }
}

fn split_key_value(line: &str, separator: &str) -> Result<(Bytes, Bytes)> {
    let (key, value) = line
        .split_once(separator)
        .with_context(|| format!("line {line:?} has no key separator {separator:?}"))?;
    Ok((
        Bytes::copy_from_slice(key.as_bytes()),
        Bytes::copy_from_slice(value.as_bytes()),
    ))
}
