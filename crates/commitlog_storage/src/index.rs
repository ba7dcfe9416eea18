//! Fixed-width offset index.

use crate::error::{StorageError, StorageResult};
use crate::{ENTRY_WIDTH, OFFSET_WIDTH};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An index file mapping segment-relative offsets to store positions.
///
/// Each entry is [`ENTRY_WIDTH`] bytes: a 4-byte big-endian relative offset
/// followed by an 8-byte big-endian store position. Entries are appended in
/// the same order as store entries.
///
/// The backing file grows one entry at a time up to `max_bytes`, so its
/// length always reflects real content. Opening an index whose length is
/// not a whole number of entries (a write torn by a crash) trims the partial
/// entry.
///
/// # Thread Safety
///
/// A single mutex guards the file handle and the tracked size.
pub struct Index {
    path: PathBuf,
    max_bytes: u64,
    inner: Mutex<IndexInner>,
}

struct IndexInner {
    /// `None` once the index has been closed.
    file: Option<File>,
    size: u64,
}

impl IndexInner {
    fn file(&mut self) -> StorageResult<&mut File> {
        self.file.as_mut().ok_or(StorageError::Closed)
    }

    fn entries(&self) -> u64 {
        self.size / ENTRY_WIDTH
    }
}

impl Index {
    /// Opens or creates an index file that may grow up to `max_bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or trimmed.
    pub fn open(path: &Path, max_bytes: u64) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        let size = len - len % ENTRY_WIDTH;
        if size != len {
            file.set_len(size)?;
            file.sync_all()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            inner: Mutex::new(IndexInner {
                file: Some(file),
                size,
            }),
        })
    }

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::IndexFull`] if another entry would exceed the
    /// byte cap, or an I/O error if the write fails.
    pub fn write(&self, relative_offset: u32, position: u64) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        let size = inner.size;

        if size + ENTRY_WIDTH > self.max_bytes {
            return Err(StorageError::IndexFull {
                size,
                max: self.max_bytes,
            });
        }

        let mut entry = [0u8; ENTRY_WIDTH as usize];
        entry[..OFFSET_WIDTH as usize].copy_from_slice(&relative_offset.to_be_bytes());
        entry[OFFSET_WIDTH as usize..].copy_from_slice(&position.to_be_bytes());

        let file = inner.file()?;
        file.seek(SeekFrom::Start(size))?;
        file.write_all(&entry)?;

        inner.size += ENTRY_WIDTH;
        Ok(())
    }

    /// Reads entry `entry` as `(relative_offset, position)`.
    ///
    /// `entry == -1` reads the last entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::OutOfRange`] for an empty index, any negative
    /// value other than `-1`, or an entry past the end.
    pub fn read(&self, entry: i64) -> StorageResult<(u32, u64)> {
        let mut inner = self.inner.lock();
        let entries = inner.entries();

        let out_of_range = StorageError::OutOfRange { entry, entries };
        let slot = match entry {
            -1 if entries > 0 => entries - 1,
            e if e >= 0 && (e as u64) < entries => e as u64,
            _ => return Err(out_of_range),
        };

        let mut buf = [0u8; ENTRY_WIDTH as usize];
        let file = inner.file()?;
        file.seek(SeekFrom::Start(slot * ENTRY_WIDTH))?;
        file.read_exact(&mut buf)?;

        let (offset, position) = buf.split_at(OFFSET_WIDTH as usize);
        let offset = u32::from_be_bytes(
            offset
                .try_into()
                .map_err(|_| StorageError::Corrupted("short index offset".into()))?,
        );
        let position = u64::from_be_bytes(
            position
                .try_into()
                .map_err(|_| StorageError::Corrupted("short index position".into()))?,
        );

        Ok((offset, position))
    }

    /// Drops every entry past the first `entries`.
    ///
    /// Used on recovery when the last entries point at store bytes that never
    /// reached the disk.
    ///
    /// # Errors
    ///
    /// Returns an error if `entries` exceeds the current entry count or the
    /// truncation fails.
    pub fn truncate(&self, entries: u64) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        let current = inner.entries();

        if entries > current {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot truncate index to {entries} entries, it has {current}"),
            )));
        }

        let new_size = entries * ENTRY_WIDTH;
        let file = inner.file()?;
        file.set_len(new_size)?;
        file.sync_all()?;
        inner.size = new_size;

        Ok(())
    }

    /// Returns the used size of the index in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    /// Returns the number of entries in the index.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.inner.lock().entries()
    }

    /// Returns the byte cap this index was opened with.
    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Returns the path to the index file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Syncs the index, truncates it to its used size and closes it.
    ///
    /// Closing an already closed index is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync or truncation fails.
    pub fn close(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        let size = inner.size;

        if let Some(file) = inner.file.take() {
            file.set_len(size)?;
            file.sync_all()?;
        }

        Ok(())
    }

    /// Closes the index and deletes its file.
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

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Index")
            .field("path", &self.path)
            .field("size", &inner.size)
            .field("max_bytes", &self.max_bytes)
            .field("closed", &inner.file.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn index_write_and_read() {
        let dir = tempdir().unwrap();
        let index = Index::open(&dir.path().join("0.index"), 1024).unwrap();

        assert!(matches!(
            index.read(-1),
            Err(StorageError::OutOfRange { entries: 0, .. })
        ));

        let entries = [(0u32, 0u64), (1, 10)];
        for (off, pos) in entries {
            index.write(off, pos).unwrap();
        }
        for (i, want) in entries.iter().enumerate() {
            assert_eq!(index.read(i as i64).unwrap(), *want);
        }

        assert_eq!(index.read(-1).unwrap(), (1, 10));
        assert!(index.read(2).unwrap_err().is_out_of_range());
        assert!(index.read(-2).unwrap_err().is_out_of_range());
        assert_eq!(index.size(), 2 * ENTRY_WIDTH);
        assert_eq!(index.entries(), 2);
    }

    #[test]
    fn index_full() {
        let dir = tempdir().unwrap();
        let index = Index::open(&dir.path().join("0.index"), ENTRY_WIDTH * 2).unwrap();

        index.write(0, 0).unwrap();
        index.write(1, 19).unwrap();
        let result = index.write(2, 38);
        assert!(matches!(result, Err(StorageError::IndexFull { .. })));
        assert_eq!(index.entries(), 2);
    }

    #[test]
    fn index_reopen_recovers_last_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.index");

        {
            let index = Index::open(&path, 1024).unwrap();
            index.write(0, 0).unwrap();
            index.write(1, 19).unwrap();
            index.close().unwrap();
        }

        assert_eq!(fs::metadata(&path).unwrap().len(), 2 * ENTRY_WIDTH);

        let index = Index::open(&path, 1024).unwrap();
        assert_eq!(index.read(-1).unwrap(), (1, 19));
    }

    #[test]
    fn index_open_trims_partial_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.index");

        {
            let index = Index::open(&path, 1024).unwrap();
            index.write(0, 0).unwrap();
            index.close().unwrap();
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[0xAB; 5]).unwrap();
        }

        let index = Index::open(&path, 1024).unwrap();
        assert_eq!(index.entries(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), ENTRY_WIDTH);
        assert_eq!(index.read(-1).unwrap(), (0, 0));
    }

    #[test]
    fn index_truncate_drops_entries() {
        let dir = tempdir().unwrap();
        let index = Index::open(&dir.path().join("0.index"), 1024).unwrap();
        for i in 0..3u32 {
            index.write(i, u64::from(i) * 20).unwrap();
        }

        index.truncate(1).unwrap();
        assert_eq!(index.entries(), 1);
        assert_eq!(index.read(-1).unwrap(), (0, 0));

        index.write(1, 20).unwrap();
        assert_eq!(index.read(1).unwrap(), (1, 20));

        assert!(index.truncate(5).is_err());
    }

    #[test]
    fn index_closed_operations_fail() {
        let dir = tempdir().unwrap();
        let index = Index::open(&dir.path().join("0.index"), 1024).unwrap();
        index.write(0, 0).unwrap();
        index.close().unwrap();

        assert!(index.close().is_ok());
        assert!(matches!(index.write(1, 1), Err(StorageError::Closed)));
        assert!(matches!(index.read(0), Err(StorageError::Closed)));
    }

    #[test]
    fn index_remove_deletes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.index");
        let index = Index::open(&path, 1024).unwrap();

        index.remove().unwrap();
        assert!(!path.exists());
    }
}
