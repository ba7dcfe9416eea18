//! The segmented log.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::reader::LogReader;
use crate::record::Record;
use crate::segment::{Segment, SegmentInfo, INDEX_EXT, STORE_EXT};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Advisory lock file held while a log is open.
const LOCK_FILE: &str = "LOCK";

/// An append-only, segmented commit log.
///
/// The log owns an ordered list of segments with disjoint, contiguous offset
/// ranges. The last segment is the active one and takes every append; once
/// it is maxed a new segment is opened at its next offset.
///
/// ```text
/// <dir>/
/// ├─ LOCK
/// ├─ 0.store    0.index
/// ├─ 120.store  120.index
/// └─ 240.store  240.index   <- active
/// ```
///
/// # Thread Safety
///
/// A read-write lock guards the segment list. Appends, rotation, truncation
/// and lifecycle operations take it exclusively; reads share it, so a reader
/// never sees a half-rotated list. Share a `Log` between threads with `Arc`.
#[derive(Debug)]
pub struct Log {
    dir: PathBuf,
    config: Config,
    inner: RwLock<LogInner>,
}

#[derive(Debug)]
struct LogInner {
    segments: Vec<Segment>,
    /// `None` once the log has been closed.
    lock_file: Option<File>,
}

impl LogInner {
    fn ensure_open(&self) -> CoreResult<()> {
        if self.lock_file.is_none() {
            return Err(CoreError::Closed);
        }
        Ok(())
    }

    fn active(&mut self) -> CoreResult<&mut Segment> {
        self.segments.last_mut().ok_or(CoreError::Closed)
    }
}

impl Log {
    /// Opens the log in `dir`, creating the directory if needed.
    ///
    /// Existing segments are discovered from their file names. A directory
    /// without segments gets one at `config.segment.initial_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for unusable caps,
    /// [`CoreError::DirectoryLocked`] if another process has the directory
    /// open, or an I/O error.
    pub fn open(dir: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        config.validate()?;
        let dir = dir.as_ref().to_path_buf();
        let inner = load(&dir, &config)?;

        info!(
            dir = %dir.display(),
            segments = inner.segments.len(),
            "opened log"
        );

        Ok(Self {
            dir,
            config,
            inner: RwLock::new(inner),
        })
    }

    /// Appends a record and returns the offset it was given.
    ///
    /// `record.offset` is overwritten with that offset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after close, or the segment error if the
    /// write fails. If the active segment is maxed and a new one cannot be
    /// opened, nothing is written and the error is returned.
    pub fn append(&self, record: &mut Record) -> CoreResult<u64> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;

        if inner.active()?.is_maxed() {
            self.rotate(&mut inner)?;
        }

        let active = inner.active()?;
        let offset = active.append(record)?;

        // The record is committed; a failed rotation is retried on the next append.
        if active.is_maxed() {
            if let Err(e) = self.rotate(&mut inner) {
                warn!(error = %e, "failed to rotate after append");
            }
        }

        Ok(offset)
    }

    fn rotate(&self, inner: &mut LogInner) -> CoreResult<()> {
        let base_offset = inner.active()?.next_offset();
        let segment = Segment::open(&self.dir, base_offset, &self.config.segment)?;
        debug!(base_offset, "rotated to new segment");
        inner.segments.push(segment);
        Ok(())
    }

    /// Reads the record at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OffsetOutOfRange`] if no retained segment holds
    /// `offset`, including offsets not written yet.
    pub fn read(&self, offset: u64) -> CoreResult<Record> {
        let inner = self.inner.read();
        inner.ensure_open()?;

        inner
            .segments
            .iter()
            .find(|s| s.contains(offset))
            .ok_or_else(|| CoreError::out_of_range(offset))?
            .read(offset)
    }

    /// Returns the base offset of the oldest retained segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after close.
    pub fn lowest_offset(&self) -> CoreResult<u64> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        inner
            .segments
            .first()
            .map(Segment::base_offset)
            .ok_or(CoreError::Closed)
    }

    /// Returns the last offset held by the log, or `None` if it holds no
    /// records.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after close.
    pub fn highest_offset(&self) -> CoreResult<Option<u64>> {
        let inner = self.inner.read();
        inner.ensure_open()?;

        let (Some(first), Some(last)) = (inner.segments.first(), inner.segments.last()) else {
            return Err(CoreError::Closed);
        };
        if last.next_offset() == first.base_offset() {
            return Ok(None);
        }
        Ok(Some(last.next_offset() - 1))
    }

    /// Returns the offset the next append will receive.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after close.
    pub fn next_offset(&self) -> CoreResult<u64> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        inner
            .segments
            .last()
            .map(Segment::next_offset)
            .ok_or(CoreError::Closed)
    }

    /// Removes every segment whose highest offset is at most `lowest`.
    ///
    /// The log stays appendable: if the active segment qualifies, a fresh
    /// segment is opened at its next offset first. Returns the number of
    /// segments removed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after close, or an I/O error if a
    /// segment cannot be removed.
    pub fn truncate(&self, lowest: u64) -> CoreResult<usize> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;

        let expired = |s: &Segment| !s.is_empty() && s.next_offset() - 1 <= lowest;

        let active = inner.segments.last().ok_or(CoreError::Closed)?;
        if expired(active) {
            let base_offset = active.next_offset();
            let segment = Segment::open(&self.dir, base_offset, &self.config.segment)?;
            debug!(base_offset, "opened segment to replace truncated active segment");
            inner.segments.push(segment);
        }

        let last = inner.segments.len() - 1;
        let (removed, kept): (Vec<_>, Vec<_>) = inner
            .segments
            .drain(..)
            .enumerate()
            .partition(|(i, s)| *i < last && expired(s));
        inner.segments = kept.into_iter().map(|(_, s)| s).collect();

        for (_, segment) in &removed {
            segment.remove()?;
        }

        info!(lowest, removed = removed.len(), "truncated log");
        Ok(removed.len())
    }

    /// Returns a reader over the raw bytes of every store, oldest first.
    ///
    /// The reader works on the segments present at call time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after close.
    pub fn reader(&self) -> CoreResult<LogReader> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        Ok(LogReader::new(
            inner.segments.iter().map(Segment::store).collect(),
        ))
    }

    /// Returns a summary of every retained segment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after close.
    pub fn segments(&self) -> CoreResult<Vec<SegmentInfo>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        Ok(inner.segments.iter().map(Segment::info).collect())
    }

    /// Returns the log directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the configuration the log was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns true once the log has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.read().lock_file.is_none()
    }

    /// Closes every segment and releases the directory lock.
    ///
    /// Closing an already closed log is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment fails to close.
    pub fn close(&self) -> CoreResult<()> {
        let mut inner = self.inner.write();
        if inner.lock_file.is_none() {
            return Ok(());
        }
        close_inner(&mut inner)?;
        info!(dir = %self.dir.display(), "closed log");
        Ok(())
    }

    /// Closes the log and deletes its directory.
    ///
    /// # Errors
    ///
    /// Returns an error if closing or deleting fails.
    pub fn remove(&self) -> CoreResult<()> {
        let mut inner = self.inner.write();
        if inner.lock_file.is_some() {
            close_inner(&mut inner)?;
        }
        fs::remove_dir_all(&self.dir)?;
        info!(dir = %self.dir.display(), "removed log");
        Ok(())
    }

    /// Deletes all data and reopens an empty log with the same config.
    ///
    /// # Errors
    ///
    /// Returns an error if removing or reopening fails.
    pub fn reset(&self) -> CoreResult<()> {
        let mut inner = self.inner.write();
        if inner.lock_file.is_some() {
            close_inner(&mut inner)?;
        }
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        *inner = load(&self.dir, &self.config)?;
        info!(dir = %self.dir.display(), "reset log");
        Ok(())
    }
}

fn load(dir: &Path, config: &Config) -> CoreResult<LogInner> {
    fs::create_dir_all(dir)?;
    if !dir.is_dir() {
        return Err(CoreError::invalid_config(format!(
            "path is not a directory: {}",
            dir.display()
        )));
    }

    let lock_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(dir.join(LOCK_FILE))?;
    if lock_file.try_lock_exclusive().is_err() {
        return Err(CoreError::DirectoryLocked);
    }

    let mut segments = discover_base_offsets(dir)?
        .into_iter()
        .map(|base| Segment::open(dir, base, &config.segment))
        .collect::<CoreResult<Vec<_>>>()?;

    match segments.last() {
        None => {
            let base = config.segment.initial_offset;
            segments.push(Segment::open(dir, base, &config.segment)?);
        }
        Some(active) if active.is_maxed() => {
            let base = active.next_offset();
            segments.push(Segment::open(dir, base, &config.segment)?);
        }
        Some(_) => {}
    }

    Ok(LogInner {
        segments,
        lock_file: Some(lock_file),
    })
}

/// Collects base offsets from `<base>.store` and `<base>.index` names.
fn discover_base_offsets(dir: &Path) -> CoreResult<BTreeSet<u64>> {
    let mut bases = BTreeSet::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_segment_file = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == STORE_EXT || ext == INDEX_EXT);
        if !is_segment_file {
            continue;
        }

        if let Some(base) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<u64>().ok())
        {
            bases.insert(base);
        }
    }

    Ok(bases)
}

fn close_inner(inner: &mut LogInner) -> CoreResult<()> {
    for segment in &inner.segments {
        segment.close()?;
    }
    inner.segments.clear();

    if let Some(lock_file) = inner.lock_file.take() {
        lock_file.unlock()?;
    }
    Ok(())
}
