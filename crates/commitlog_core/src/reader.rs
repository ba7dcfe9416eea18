//! Sequential reader over the raw bytes of a log.

use commitlog_storage::{StorageError, Store};
use std::io::{self, Read};
use std::sync::Arc;

/// Reads every store of a log back to back, oldest segment first.
///
/// The output is the concatenation of the store files: length-prefixed
/// CBOR records, exactly as they sit on disk. Useful for snapshots and
/// offline verification.
#[derive(Debug)]
pub struct LogReader {
    stores: Vec<Arc<Store>>,
    current: usize,
    position: u64,
}

impl LogReader {
    pub(crate) fn new(stores: Vec<Arc<Store>>) -> Self {
        Self {
            stores,
            current: 0,
            position: 0,
        }
    }
}

impl Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while let Some(store) = self.stores.get(self.current) {
            let n = store.read_at(buf, self.position).map_err(into_io)?;
            if n > 0 {
                self.position += n as u64;
                return Ok(n);
            }
            self.current += 1;
            self.position = 0;
        }

        Ok(0)
    }
}

fn into_io(err: StorageError) -> io::Error {
    match err {
        StorageError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}
