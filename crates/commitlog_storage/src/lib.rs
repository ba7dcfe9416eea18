//! # Commitlog Storage
//!
//! Byte-level files for the commit log.
//!
//! Every segment of the log is backed by two files:
//!
//! - a [`Store`] (`<base_offset>.store`) holding length-prefixed payloads
//! - an [`Index`] (`<base_offset>.index`) mapping segment-relative offsets to
//!   store positions
//!
//! Neither file knows what a record is. Record encoding, offset assignment
//! and segment rotation live in `commitlog_core`.
//!
//! ## File Formats
//!
//! ```text
//! store: | len (8, BE) | payload (len) | len (8, BE) | payload (len) | ...
//! index: | rel_offset (4, BE) | position (8, BE) | ...
//! ```
//!
//! ## Example
//!
//! ```rust
//! use commitlog_storage::{Index, Store};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = Store::open(&dir.path().join("0.store")).unwrap();
//! let index = Index::open(&dir.path().join("0.index"), 1024).unwrap();
//!
//! let (_, position) = store.append(b"hello").unwrap();
//! index.write(0, position).unwrap();
//!
//! let (_, position) = index.read(-1).unwrap();
//! assert_eq!(store.read(position).unwrap(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod index;
mod store;

pub use error::{StorageError, StorageResult};
pub use index::Index;
pub use store::Store;

/// Width of the big-endian length header in front of every store entry.
pub const LEN_WIDTH: u64 = 8;

/// Width of the relative offset field of an index entry.
pub const OFFSET_WIDTH: u64 = 4;

/// Width of the store position field of an index entry.
pub const POSITION_WIDTH: u64 = 8;

/// Width of one index entry.
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;
