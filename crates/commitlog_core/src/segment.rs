//! A segment pairs one store with one index.

use crate::config::SegmentConfig;
use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use commitlog_storage::{Index, Store, ENTRY_WIDTH, LEN_WIDTH};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// File extension of segment store files.
pub const STORE_EXT: &str = "store";

/// File extension of segment index files.
pub const INDEX_EXT: &str = "index";

/// A bounded, contiguous range of offsets backed by a store and an index.
///
/// Index entries hold offsets relative to `base_offset`, so
/// `next_offset - base_offset` always equals the number of index entries.
///
/// `append` takes `&mut self`: the store write and the index write of one
/// record happen as a single unit under whatever guards the segment.
#[derive(Debug)]
pub struct Segment {
    store: Arc<Store>,
    index: Index,
    base_offset: u64,
    next_offset: u64,
    config: SegmentConfig,
}

/// Size and range summary of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    /// First offset of the segment.
    pub base_offset: u64,
    /// Offset the next record appended to this segment would get.
    pub next_offset: u64,
    /// Store size in bytes.
    pub store_size: u64,
    /// Index size in bytes.
    pub index_size: u64,
}

impl Segment {
    /// Opens or creates the segment starting at `base_offset` in `dir`.
    ///
    /// The next offset is recovered from the last index entry. Index entries
    /// pointing past the end of the store are dropped, and store bytes past
    /// the last indexed record are truncated.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be opened or repaired.
    pub fn open(dir: &Path, base_offset: u64, config: &SegmentConfig) -> CoreResult<Self> {
        let store = Store::open(&segment_path(dir, base_offset, STORE_EXT))?;
        let index = Index::open(
            &segment_path(dir, base_offset, INDEX_EXT),
            config.max_index_bytes,
        )?;

        let mut segment = Self {
            store: Arc::new(store),
            index,
            base_offset,
            next_offset: base_offset,
            config: config.clone(),
        };
        segment.recover()?;

        debug!(
            base_offset,
            next_offset = segment.next_offset,
            store_size = segment.store.size(),
            "opened segment"
        );

        Ok(segment)
    }

    fn recover(&mut self) -> CoreResult<()> {
        let store_size = self.store.size();

        let committed_end = loop {
            let (relative, position) = match self.index.read(-1) {
                Ok(entry) => entry,
                Err(e) if e.is_out_of_range() => break (None, 0),
                Err(e) => return Err(e.into()),
            };

            let mut header = [0u8; LEN_WIDTH as usize];
            let n = self.store.read_at(&mut header, position)?;
            let end = position
                .saturating_add(LEN_WIDTH)
                .saturating_add(u64::from_be_bytes(header));

            if n == header.len() && end <= store_size {
                break (Some(relative), end);
            }

            let entries = self.index.entries();
            warn!(
                base_offset = self.base_offset,
                relative, position, "dropping index entry past end of store"
            );
            self.index.truncate(entries - 1)?;
        };

        let (last_relative, end) = committed_end;
        if store_size > end {
            warn!(
                base_offset = self.base_offset,
                store_size, end, "truncating unindexed store tail"
            );
            self.store.truncate(end)?;
        }

        self.next_offset = match last_relative {
            Some(relative) => self.base_offset + u64::from(relative) + 1,
            None => self.base_offset,
        };
        Ok(())
    }

    /// Appends a record, stamping it with the next offset.
    ///
    /// Returns the assigned offset. On failure the next offset is unchanged
    /// and nothing of the record remains visible.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, the store write or the index write
    /// fails.
    pub fn append(&mut self, record: &mut Record) -> CoreResult<u64> {
        let offset = self.next_offset;
        let next_offset = offset
            .checked_add(1)
            .ok_or_else(|| CoreError::invalid_config("offset space exhausted"))?;
        let relative = u32::try_from(offset - self.base_offset).map_err(|_| {
            CoreError::invalid_config("segment holds more records than a relative offset can address")
        })?;

        record.offset = offset;
        let data = record.encode()?;

        let (_, position) = self.store.append(&data)?;

        if let Err(e) = self.index.write(relative, position) {
            if let Err(rollback) = self.store.truncate(position) {
                warn!(
                    base_offset = self.base_offset,
                    position,
                    error = %rollback,
                    "failed to roll back store append"
                );
            }
            return Err(e.into());
        }

        self.next_offset = next_offset;
        Ok(offset)
    }

    /// Reads the record at an absolute offset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OffsetOutOfRange`] if this segment has no record
    /// at `offset`, or a storage/codec error if reading fails.
    pub fn read(&self, offset: u64) -> CoreResult<Record> {
        if !self.contains(offset) {
            return Err(CoreError::out_of_range(offset));
        }

        let relative = i64::try_from(offset - self.base_offset)
            .map_err(|_| CoreError::out_of_range(offset))?;
        let (_, position) = self.index.read(relative).map_err(|e| {
            if e.is_out_of_range() {
                CoreError::out_of_range(offset)
            } else {
                e.into()
            }
        })?;

        let data = self.store.read(position)?;
        Record::decode(&data)
    }

    /// Returns true once either file has reached its cap.
    ///
    /// The index counts as maxed when it has no room for another entry.
    #[must_use]
    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.config.max_store_bytes
            || self.index.size() + ENTRY_WIDTH > self.config.max_index_bytes
    }

    /// Returns true if `offset` has a record in this segment.
    #[must_use]
    pub fn contains(&self, offset: u64) -> bool {
        self.base_offset <= offset && offset < self.next_offset
    }

    /// Returns the first offset of this segment.
    #[must_use]
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Returns the offset the next appended record will get.
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Returns the number of records in this segment.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.next_offset - self.base_offset
    }

    /// Returns true if the segment holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the store size in bytes.
    #[must_use]
    pub fn store_size(&self) -> u64 {
        self.store.size()
    }

    /// Returns the index size in bytes.
    #[must_use]
    pub fn index_size(&self) -> u64 {
        self.index.size()
    }

    /// Returns a size and range summary.
    #[must_use]
    pub fn info(&self) -> SegmentInfo {
        SegmentInfo {
            base_offset: self.base_offset,
            next_offset: self.next_offset,
            store_size: self.store.size(),
            index_size: self.index.size(),
        }
    }

    pub(crate) fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// Closes the index, then the store.
    ///
    /// # Errors
    ///
    /// Returns an error if either file fails to close.
    pub fn close(&self) -> CoreResult<()> {
        self.index.close()?;
        self.store.close()?;
        Ok(())
    }

    /// Removes the index file, then the store file.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be closed or deleted.
    pub fn remove(&self) -> CoreResult<()> {
        self.index.remove()?;
        self.store.remove()?;
        Ok(())
    }
}

/// Returns the path of a segment file.
pub fn segment_path(dir: &Path, base_offset: u64, ext: &str) -> PathBuf {
    dir.join(format!("{base_offset}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use commitlog_storage::StorageError;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::tempdir;

    fn config(max_store_bytes: u64, max_index_bytes: u64) -> SegmentConfig {
        SegmentConfig {
            max_store_bytes,
            max_index_bytes,
            initial_offset: 0,
        }
    }

    fn encoded_len(value: &[u8], offset: u64) -> u64 {
        let record = Record {
            value: value.to_vec(),
            offset,
        };
        record.encode().unwrap().len() as u64 + LEN_WIDTH
    }

    #[test]
    fn segment_append_and_read() {
        let dir = tempdir().unwrap();
        let mut segment = Segment::open(dir.path(), 16, &config(1024, ENTRY_WIDTH * 3)).unwrap();

        assert_eq!(segment.next_offset(), 16);
        assert!(!segment.is_maxed());

        for i in 0..3u64 {
            let mut record = Record::new(b"hello world".to_vec());
            let offset = segment.append(&mut record).unwrap();
            assert_eq!(offset, 16 + i);
            assert_eq!(record.offset, offset);

            let got = segment.read(offset).unwrap();
            assert_eq!(got.value, b"hello world");
            assert_eq!(got.offset, offset);
        }

        // maxed index
        assert!(segment.is_maxed());
        let store_size = segment.store_size();
        let result = segment.append(&mut Record::new(b"one more".to_vec()));
        assert!(matches!(
            result,
            Err(CoreError::Storage(StorageError::IndexFull { .. }))
        ));
        assert_eq!(segment.next_offset(), 19);
        assert_eq!(segment.store_size(), store_size);
        assert_eq!(segment.len(), 3);
    }

    #[test]
    fn segment_maxed_by_store() {
        let dir = tempdir().unwrap();
        let value = b"hello world";
        let width = encoded_len(value, 16);

        let mut segment = Segment::open(dir.path(), 16, &config(width * 3, 1024)).unwrap();
        for _ in 0..3 {
            assert!(!segment.is_maxed());
            segment.append(&mut Record::new(value.to_vec())).unwrap();
        }
        assert!(segment.is_maxed());
    }

    #[test]
    fn segment_reopen_recovers_next_offset() {
        let dir = tempdir().unwrap();
        let cfg = config(1024, 1024);

        {
            let mut segment = Segment::open(dir.path(), 16, &cfg).unwrap();
            for _ in 0..3 {
                segment.append(&mut Record::new(b"x".to_vec())).unwrap();
            }
            segment.close().unwrap();
        }

        let segment = Segment::open(dir.path(), 16, &cfg).unwrap();
        assert_eq!(segment.next_offset(), 19);
        assert_eq!(segment.read(18).unwrap().offset, 18);
    }

    #[test]
    fn segment_read_out_of_range() {
        let dir = tempdir().unwrap();
        let mut segment = Segment::open(dir.path(), 16, &config(1024, 1024)).unwrap();
        segment.append(&mut Record::new(b"x".to_vec())).unwrap();

        assert!(segment.read(15).unwrap_err().is_offset_out_of_range());
        assert!(segment.read(17).unwrap_err().is_offset_out_of_range());
        assert!(segment.read(16).is_ok());
    }

    #[test]
    fn segment_recovery_truncates_unindexed_store_tail() {
        let dir = tempdir().unwrap();
        let cfg = config(1024, 1024);

        let indexed_size = {
            let mut segment = Segment::open(dir.path(), 0, &cfg).unwrap();
            segment.append(&mut Record::new(b"kept".to_vec())).unwrap();
            segment.close().unwrap();
            segment.info().store_size
        };

        // a record that reached the store but never the index
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(segment_path(dir.path(), 0, STORE_EXT))
                .unwrap();
            file.write_all(&5u64.to_be_bytes()).unwrap();
            file.write_all(b"torn!").unwrap();
        }

        let mut segment = Segment::open(dir.path(), 0, &cfg).unwrap();
        assert_eq!(segment.next_offset(), 1);
        assert_eq!(segment.info().store_size, indexed_size);

        let offset = segment.append(&mut Record::new(b"next".to_vec())).unwrap();
        assert_eq!(offset, 1);
        assert_eq!(segment.read(1).unwrap().value, b"next");
    }

    #[test]
    fn segment_recovery_drops_index_entries_past_store() {
        let dir = tempdir().unwrap();
        let cfg = config(1024, 1024);

        {
            let mut segment = Segment::open(dir.path(), 0, &cfg).unwrap();
            segment.append(&mut Record::new(b"kept".to_vec())).unwrap();
            segment.close().unwrap();
        }

        // an index entry whose store bytes were lost
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(segment_path(dir.path(), 0, INDEX_EXT))
                .unwrap();
            file.write_all(&1u32.to_be_bytes()).unwrap();
            file.write_all(&4096u64.to_be_bytes()).unwrap();
        }

        let segment = Segment::open(dir.path(), 0, &cfg).unwrap();
        assert_eq!(segment.next_offset(), 1);
        assert_eq!(segment.read(0).unwrap().value, b"kept");
    }

    #[test]
    fn segment_rejects_append_past_last_offset() {
        let dir = tempdir().unwrap();
        let mut segment = Segment::open(dir.path(), u64::MAX - 1, &config(1024, 1024)).unwrap();

        assert_eq!(
            segment.append(&mut Record::new(b"last".to_vec())).unwrap(),
            u64::MAX - 1
        );
        let store_size = segment.store_size();

        let result = segment.append(&mut Record::new(b"overflow".to_vec()));
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
        assert_eq!(segment.next_offset(), u64::MAX);
        assert_eq!(segment.store_size(), store_size);
    }

    #[test]
    fn segment_remove_deletes_files() {
        let dir = tempdir().unwrap();
        let segment = Segment::open(dir.path(), 7, &config(1024, 1024)).unwrap();

        segment.remove().unwrap();
        assert!(!segment_path(dir.path(), 7, STORE_EXT).exists());
        assert!(!segment_path(dir.path(), 7, INDEX_EXT).exists());
    }
}
