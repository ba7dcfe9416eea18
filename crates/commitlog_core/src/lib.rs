//! # Commitlog Core
//!
//! Segmented, append-only commit log.
//!
//! This crate provides:
//! - [`Record`] and its CBOR encoding
//! - [`Segment`]: one store plus one index covering a contiguous offset range
//! - [`Log`]: the ordered segment list with rotation, retention and recovery
//! - [`LogReader`]: raw sequential access to every store
//!
//! Offsets are assigned by the log, start at
//! [`SegmentConfig::initial_offset`] and grow by one per record across
//! segment boundaries.
//!
//! ## Example
//!
//! ```rust
//! use commitlog_core::{Config, Log, Record};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let log = Log::open(dir.path(), Config::default()).unwrap();
//!
//! let offset = log.append(&mut Record::new(b"hello".to_vec())).unwrap();
//! assert_eq!(offset, 0);
//! assert_eq!(log.read(offset).unwrap().value, b"hello");
//! assert!(log.read(1).unwrap_err().is_offset_out_of_range());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod log;
mod reader;
mod record;
mod segment;

pub use config::{Config, SegmentConfig};
pub use error::{CoreError, CoreResult};
pub use log::Log;
pub use reader::LogReader;
pub use record::Record;
pub use segment::{segment_path, Segment, SegmentInfo, INDEX_EXT, STORE_EXT};
