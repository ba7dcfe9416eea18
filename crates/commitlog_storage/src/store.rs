//! Append-only store of length-prefixed payloads.

use crate::error::{StorageError, StorageResult};
use crate::LEN_WIDTH;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A store file holding `[8-byte big-endian length][payload]` entries.
///
/// Appends go through a buffered writer, so they are not guaranteed to be on
/// stable storage until [`Store::flush`], [`Store::close`] or any read.
/// Reads always flush first, which gives read-after-write consistency within
/// the process.
///
/// # Thread Safety
///
/// A single mutex serializes every operation on the store. The buffered
/// writer, the file and the tracked size are only ever touched together.
///
/// # Example
///
/// ```no_run
/// use commitlog_storage::Store;
/// use std::path::Path;
///
/// let store = Store::open(Path::new("0.store")).unwrap();
/// let (_, position) = store.append(b"hello").unwrap();
/// assert_eq!(store.read(position).unwrap(), b"hello");
/// ```
pub struct Store {
    path: PathBuf,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    /// `None` once the store has been closed.
    writer: Option<BufWriter<File>>,
    /// Logical size, including bytes still sitting in the buffer.
    size: u64,
}

impl StoreInner {
    fn writer(&mut self) -> StorageResult<&mut BufWriter<File>> {
        self.writer.as_mut().ok_or(StorageError::Closed)
    }

    /// Flushes the buffer and hands back the underlying file.
    fn flushed_file(&mut self) -> StorageResult<&mut File> {
        let writer = self.writer()?;
        writer.flush()?;
        Ok(writer.get_mut())
    }
}

impl Store {
    /// Opens or creates a store file.
    ///
    /// The store size is initialized from the current file length, so an
    /// existing store resumes appending where it left off.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(StoreInner {
                writer: Some(BufWriter::new(file)),
                size,
            }),
        })
    }

    /// Appends one payload.
    ///
    /// Returns `(bytes_written, position)` where `bytes_written` includes the
    /// 8-byte length header and `position` is where the entry starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the write fails.
    pub fn append(&self, payload: &[u8]) -> StorageResult<(u64, u64)> {
        let mut inner = self.inner.lock();
        let position = inner.size;

        let writer = inner.writer()?;
        writer.write_all(&(payload.len() as u64).to_be_bytes())?;
        writer.write_all(payload)?;

        let written = LEN_WIDTH + payload.len() as u64;
        inner.size += written;

        Ok((written, position))
    }

    /// Reads the payload of the entry starting at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`] if the header or the payload
    /// extends beyond the store, or an I/O error if the read fails.
    pub fn read(&self, position: u64) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let size = inner.size;
        let file = inner.flushed_file()?;

        let payload_start = position.saturating_add(LEN_WIDTH);
        if payload_start > size {
            return Err(StorageError::ReadPastEnd {
                position,
                len: LEN_WIDTH,
                size,
            });
        }

        let mut header = [0u8; LEN_WIDTH as usize];
        read_exact_at(file, &mut header, position)?;
        let len = u64::from_be_bytes(header);

        if payload_start.saturating_add(len) > size {
            return Err(StorageError::ReadPastEnd {
                position: payload_start,
                len,
                size,
            });
        }

        let len = usize::try_from(len)
            .map_err(|_| StorageError::Corrupted(format!("entry length {len} overflows")))?;
        let mut payload = vec![0u8; len];
        read_exact_at(file, &mut payload, payload_start)?;

        Ok(payload)
    }

    /// Fills `buf` with raw store bytes starting at `offset`.
    ///
    /// Returns the number of bytes read, which is 0 at the end of the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the read fails.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<usize> {
        let mut inner = self.inner.lock();
        let size = inner.size;
        let file = inner.flushed_file()?;

        if offset >= size || buf.is_empty() {
            return Ok(0);
        }

        let available = usize::try_from(size - offset).unwrap_or(usize::MAX);
        let n = buf.len().min(available);
        read_exact_at(file, &mut buf[..n], offset)?;

        Ok(n)
    }

    /// Returns the logical size of the store in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    /// Returns the path to the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once the store has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().writer.is_none()
    }

    /// Pushes buffered appends to the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the flush fails.
    pub fn flush(&self) -> StorageResult<()> {
        self.inner.lock().writer()?.flush()?;
        Ok(())
    }

    /// Truncates the store to `new_size` bytes.
    ///
    /// Used to drop a torn tail that was appended but never indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size or
    /// the truncation fails.
    pub fn truncate(&self, new_size: u64) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        let size = inner.size;

        if new_size > size {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate store to size {new_size} which is greater than current size {size}"
                ),
            )));
        }

        let file = inner.flushed_file()?;
        file.set_len(new_size)?;
        file.sync_all()?;
        inner.size = new_size;

        Ok(())
    }

    /// Flushes and closes the store.
    ///
    /// Closing an already closed store is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or sync fails.
    pub fn close(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock();

        if let Some(mut writer) = inner.writer.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        Ok(())
    }

    /// Closes the store and deletes its file.
    ///
    /// # Errors
    ///
    /// Returns an error if closing or deleting fails.
    pub fn remove(&self) -> StorageResult<()> {
        self.close()?;
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("size", &inner.size)
            .field("closed", &inner.writer.is_none())
            .finish()
    }
}

fn read_exact_at(file: &mut File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}
