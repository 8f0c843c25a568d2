//! Broker topics as partition aligned distributed collections.
//!
//! Reading goes through [`TopicCollection`], which plans one slice per partition and
//! reads each one with a [`reader::PartitionReader`]. Writing goes through
//! [`write_to_broker`] and [`write_with_keys_to_broker`].
//!
//! ```no_run
//! # async fn run() -> logbridge::Result<()> {
//! use std::sync::Arc;
//!
//! use logbridge::config::{ConnectionConfig, ReadConfig};
//! use logbridge::engine::{collect, LocalEngine};
//! use logbridge::{ReadSpec, TopicCollection};
//!
//! let config = ReadConfig::builder()
//!     .connection(ConnectionConfig::new(["localhost:9092"]))
//!     .build()?;
//! let collection = Arc::new(TopicCollection::new(ReadSpec::new("events"), config));
//! let records = collect(collection.clone(), &LocalEngine::default()).await?;
//! let next = collection.next_offsets()?;
//! # let _ = (records, next);
//! # Ok(())
//! # }
//! ```

mod error;
mod offset;
mod write;

pub mod client;
pub mod collection;
pub mod config;
pub mod engine;
pub mod metadata;
pub mod publisher;
pub mod reader;

pub use error::{BridgeError, ErrorKind, Result};
pub use offset::{Offset, PartitionOffsets};
pub use collection::{NextOffsets, PartitionSlice, ReadSpec, TopicCollection};
pub use publisher::TopicPublisher;
pub use write::{write_to_broker, write_with_keys_to_broker};

pub use logbridge_protocol::record::ConsumerRecord;
pub use logbridge_types::PartitionId;
