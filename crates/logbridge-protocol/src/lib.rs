//! Framing, pinned api versions and record batch handling for talking to
//! Kafka compatible brokers. Message schemas come from `kafka-protocol`.

pub mod link;

#[cfg(feature = "api")]
pub mod api;

#[cfg(feature = "codec")]
pub mod codec;

#[cfg(feature = "record")]
pub mod record;

use std::fmt::Display;
use std::io::Error as IoError;
use std::io::ErrorKind;

pub use kafka_protocol;

/// Wraps a `kafka-protocol` encode or decode failure.
pub fn wire_error<E: Display>(context: &str, err: E) -> IoError {
    IoError::new(ErrorKind::InvalidData, format!("{context}: {err}"))
}
