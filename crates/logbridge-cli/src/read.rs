use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::debug;

use logbridge::config::ConfigFile;
use logbridge::engine::collect;
use logbridge::engine::LocalEngine;
use logbridge::ConsumerRecord;
use logbridge::Offset;
use logbridge::ReadSpec;
use logbridge::TopicCollection;
use logbridge_types::PartitionId;

/// Read a topic once, from explicit offsets or the start of each partition
#[derive(Debug, Args)]
pub struct ReadOpt {
    /// Topic name
    #[arg(value_name = "topic")]
    pub topic: String,

    /// Start a partition at an offset, e.g. `0:120`. Repeat for more partitions
    #[arg(short, long = "offset", value_name = "partition:offset", value_parser = parse_partition_offset)]
    pub offsets: Vec<(PartitionId, i64)>,

    /// Start partitions without an explicit offset at the end of the log
    #[arg(long)]
    pub from_end: bool,

    /// Soft cap on the bytes returned by one fetch
    #[arg(short = 'b', long = "maxbytes", value_name = "integer")]
    pub max_bytes: Option<i32>,

    /// Stop each partition after this many records
    #[arg(short, long, value_name = "integer")]
    pub limit: Option<usize>,

    /// Partitions read at the same time
    #[arg(long, default_value_t = 4, value_name = "integer")]
    pub parallelism: usize,

    /// Print records in "[key] value" format, with "[null]" for no key
    #[arg(short, long)]
    pub key_value: bool,
}

impl ReadOpt {
    pub async fn process(self, mut file: ConfigFile) -> Result<()> {
        let read = file.read.get_or_insert_with(Default::default);
        if self.max_bytes.is_some() {
            read.max_bytes = self.max_bytes;
        }
        if self.limit.is_some() {
            read.record_limit = self.limit;
        }
        let config = file.read_config()?;

        let default_start = if self.from_end {
            Offset::end()
        } else {
            Offset::beginning()
        };
        let spec = ReadSpec::new(&self.topic)
            .with_offsets(self.offsets.iter().copied().collect())
            .with_default_start(default_start);
        debug!(?spec, "reading topic");

        let collection = Arc::new(TopicCollection::new(spec, config));
        let records = collect(collection.clone(), &LocalEngine::new(self.parallelism)).await?;

        let mut out = std::io::stdout().lock();
        for record in &records {
            writeln!(out, "{}", format_record(record, self.key_value))?;
        }
        out.flush()?;

        eprintln!("next offsets: {}", format_offsets(&collection.next_offsets()?));
        Ok(())
    }
}

fn parse_partition_offset(value: &str) -> Result<(PartitionId, i64), String> {
    let (partition, offset) = value
        .split_once(':')
        .ok_or_else(|| format!("expected partition:offset, got {value:?}"))?;
    let partition = partition
        .trim()
        .parse()
        .map_err(|err| format!("invalid partition {partition:?}: {err}"))?;
    let offset: i64 = offset
        .trim()
        .parse()
        .map_err(|err| format!("invalid offset {offset:?}: {err}"))?;
    if offset < 0 {
        return Err(format!("offset must not be negative, got {offset}"));
    }
    Ok((partition, offset))
}

fn format_record(record: &ConsumerRecord, key_value: bool) -> String {
    let value = String::from_utf8_lossy(record.value());
    if key_value {
        let key = record
            .key()
            .map(|key| String::from_utf8_lossy(key).into_owned())
            .unwrap_or_else(|| "null".to_owned());
        format!("[{key}] {value}")
    } else {
        value.into_owned()
    }
}

fn format_offsets(offsets: &BTreeMap<PartitionId, i64>) -> String {
    offsets
        .iter()
        .map(|(partition, offset)| format!("{partition}:{offset}"))
        .collect::<Vec<_>>()
        .join(",")
}
