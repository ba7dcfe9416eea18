//! Integration tests for the segmented log.

use commitlog_core::{Config, CoreError, Log, Record};
use commitlog_storage::{ENTRY_WIDTH, LEN_WIDTH};
use proptest::prelude::*;
use std::io::Read;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

/// Three records per segment.
fn small_config() -> Config {
    Config::new().max_index_bytes(ENTRY_WIDTH * 3)
}

fn append_values(log: &Log, count: u64) -> Vec<u64> {
    (0..count)
        .map(|i| {
            log.append(&mut Record::new(format!("record-{i}").into_bytes()))
                .unwrap()
        })
        .collect()
}

#[test]
fn append_and_read_back() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), Config::default()).unwrap();

    let mut record = Record::new(b"hello world".to_vec());
    let offset = log.append(&mut record).unwrap();
    assert_eq!(offset, 0);
    assert_eq!(record.offset, 0);

    let read = log.read(offset).unwrap();
    assert_eq!(read.value, b"hello world");
    assert_eq!(read.offset, 0);
}

#[test]
fn caller_offset_is_overwritten() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), Config::default()).unwrap();

    let mut record = Record {
        value: b"x".to_vec(),
        offset: 99,
    };
    assert_eq!(log.append(&mut record).unwrap(), 0);
    assert_eq!(log.read(0).unwrap().offset, 0);
}

#[test]
fn read_past_end_is_out_of_range() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), Config::default()).unwrap();

    assert!(matches!(
        log.read(0),
        Err(CoreError::OffsetOutOfRange { offset: 0 })
    ));

    append_values(&log, 1);
    assert!(matches!(
        log.read(1),
        Err(CoreError::OffsetOutOfRange { offset: 1 })
    ));
}

#[test]
fn initial_offset_is_honored() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), Config::new().initial_offset(16)).unwrap();

    assert_eq!(log.lowest_offset().unwrap(), 16);
    assert_eq!(log.highest_offset().unwrap(), None);
    assert_eq!(log.next_offset().unwrap(), 16);

    assert_eq!(append_values(&log, 2), vec![16, 17]);
    assert_eq!(log.highest_offset().unwrap(), Some(17));
    assert!(log.read(15).unwrap_err().is_offset_out_of_range());
}

#[test]
fn rotation_keeps_offsets_contiguous() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), small_config()).unwrap();

    let offsets = append_values(&log, 10);
    assert_eq!(offsets, (0..10).collect::<Vec<_>>());

    let segments = log.segments().unwrap();
    let bases: Vec<_> = segments.iter().map(|s| s.base_offset).collect();
    assert_eq!(bases, vec![0, 3, 6, 9]);

    // each segment starts where the previous one ended
    for pair in segments.windows(2) {
        assert_eq!(pair[0].next_offset, pair[1].base_offset);
    }

    for offset in 0..10 {
        let record = log.read(offset).unwrap();
        assert_eq!(record.offset, offset);
        assert_eq!(record.value, format!("record-{offset}").into_bytes());
    }
}

#[test]
fn rotation_by_store_size() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), Config::new().max_store_bytes(1)).unwrap();

    append_values(&log, 3);

    // every record fills a store on its own
    let bases: Vec<_> = log.segments().unwrap().iter().map(|s| s.base_offset).collect();
    assert_eq!(bases, vec![0, 1, 2, 3]);
}

#[test]
fn reopen_recovers_state() {
    let dir = tempdir().unwrap();

    {
        let log = Log::open(dir.path(), small_config()).unwrap();
        append_values(&log, 7);
        log.close().unwrap();
    }

    let log = Log::open(dir.path(), small_config()).unwrap();
    assert_eq!(log.lowest_offset().unwrap(), 0);
    assert_eq!(log.highest_offset().unwrap(), Some(6));
    assert_eq!(log.next_offset().unwrap(), 7);

    for offset in 0..7 {
        assert_eq!(log.read(offset).unwrap().offset, offset);
    }
    assert_eq!(append_values(&log, 1), vec![7]);
}

#[test]
fn reopen_after_drop_without_close() {
    let dir = tempdir().unwrap();

    {
        let log = Log::open(dir.path(), Config::default()).unwrap();
        append_values(&log, 4);
    }

    let log = Log::open(dir.path(), Config::default()).unwrap();
    assert_eq!(log.next_offset().unwrap(), 4);
    assert_eq!(log.read(3).unwrap().value, b"record-3");
}

#[test]
fn truncate_removes_old_segments() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), small_config()).unwrap();
    append_values(&log, 10);

    let removed = log.truncate(4).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(log.lowest_offset().unwrap(), 3);
    assert!(log.read(2).unwrap_err().is_offset_out_of_range());
    assert_eq!(log.read(3).unwrap().offset, 3);

    assert!(!dir.path().join("0.store").exists());
    assert!(!dir.path().join("0.index").exists());
}

#[test]
fn truncate_everything_keeps_log_appendable() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), small_config()).unwrap();
    append_values(&log, 10);

    log.truncate(100).unwrap();

    assert_eq!(log.lowest_offset().unwrap(), 10);
    assert_eq!(log.highest_offset().unwrap(), None);
    assert_eq!(log.segments().unwrap().len(), 1);
    assert!(log.read(9).unwrap_err().is_offset_out_of_range());

    assert_eq!(append_values(&log, 1), vec![10]);
}

#[test]
fn reader_returns_raw_store_bytes() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), small_config()).unwrap();
    append_values(&log, 5);

    let mut bytes = Vec::new();
    log.reader().unwrap().read_to_end(&mut bytes).unwrap();

    let total: u64 = log.segments().unwrap().iter().map(|s| s.store_size).sum();
    assert_eq!(bytes.len() as u64, total);

    let mut offsets = Vec::new();
    let mut rest = bytes.as_slice();
    while !rest.is_empty() {
        let (header, tail) = rest.split_at(LEN_WIDTH as usize);
        let len = u64::from_be_bytes(header.try_into().unwrap()) as usize;
        let (payload, tail) = tail.split_at(len);
        offsets.push(Record::decode(payload).unwrap().offset);
        rest = tail;
    }
    assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
}

#[test]
fn closed_log_rejects_operations() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), Config::default()).unwrap();
    append_values(&log, 1);

    log.close().unwrap();
    assert!(log.is_closed());
    assert!(log.close().is_ok());

    assert!(matches!(
        log.append(&mut Record::new(b"late".to_vec())),
        Err(CoreError::Closed)
    ));
    assert!(matches!(log.read(0), Err(CoreError::Closed)));
    assert!(matches!(log.next_offset(), Err(CoreError::Closed)));
}

#[test]
fn remove_deletes_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log");
    let log = Log::open(&path, Config::default()).unwrap();
    append_values(&log, 2);

    log.remove().unwrap();
    assert!(!path.exists());
    assert!(matches!(log.read(0), Err(CoreError::Closed)));
}

#[test]
fn reset_starts_over() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path().join("log"), small_config().initial_offset(5)).unwrap();
    append_values(&log, 8);

    log.reset().unwrap();
    assert_eq!(log.segments().unwrap().len(), 1);
    assert_eq!(log.next_offset().unwrap(), 5);
    assert!(log.read(5).unwrap_err().is_offset_out_of_range());
    assert_eq!(append_values(&log, 1), vec![5]);
}

#[test]
fn concurrent_producers_get_unique_offsets() {
    let dir = tempdir().unwrap();
    let log = Arc::new(Log::open(dir.path(), small_config()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                (0..25)
                    .map(|i| {
                        log.append(&mut Record::new(format!("{t}-{i}").into_bytes()))
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut offsets: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    offsets.sort_unstable();

    assert_eq!(offsets, (0..200).collect::<Vec<_>>());
    for offset in offsets {
        assert_eq!(log.read(offset).unwrap().offset, offset);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn offsets_are_contiguous_and_readable(
        values in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..40),
        initial in 0u64..1000,
    ) {
        let dir = tempdir().unwrap();
        let config = Config::new()
            .max_store_bytes(128)
            .max_index_bytes(ENTRY_WIDTH * 4)
            .initial_offset(initial);
        let log = Log::open(dir.path(), config).unwrap();

        for (i, value) in values.iter().enumerate() {
            let offset = log.append(&mut Record::new(value.clone())).unwrap();
            prop_assert_eq!(offset, initial + i as u64);
        }

        for (i, value) in values.iter().enumerate() {
            let record = log.read(initial + i as u64).unwrap();
            prop_assert_eq!(&record.value, value);
        }
        prop_assert!(log.read(initial + values.len() as u64).unwrap_err().is_offset_out_of_range());
    }
}

#[test]
fn failed_rotation_keeps_record_and_recovers() {
    let dir = tempdir().unwrap();
    let log = Log::open(dir.path(), Config::new().max_index_bytes(ENTRY_WIDTH)).unwrap();

    // a directory where the next store file should go
    let blocker = dir.path().join("1.store");
    std::fs::create_dir(&blocker).unwrap();

    // the record lands even though the follow-up rotation fails
    assert_eq!(log.append(&mut Record::new(b"a".to_vec())).unwrap(), 0);
    assert_eq!(log.read(0).unwrap().value, b"a");
    assert_eq!(log.next_offset().unwrap(), 1);

    // with the active segment full, nothing is written until rotation succeeds
    assert!(log.append(&mut Record::new(b"b".to_vec())).is_err());
    assert_eq!(log.next_offset().unwrap(), 1);
    assert_eq!(log.segments().unwrap().len(), 1);

    std::fs::remove_dir(&blocker).unwrap();

    for (i, value) in [b"c", b"d", b"e"].into_iter().enumerate() {
        let offset = log.append(&mut Record::new(value.to_vec())).unwrap();
        assert_eq!(offset, i as u64 + 1);
    }
    assert_eq!(log.read(2).unwrap().value, b"d");

    let segments = log.segments().unwrap();
    assert!(segments.iter().all(|s| s.next_offset - s.base_offset <= 1));
    assert_eq!(segments.last().unwrap().base_offset, 4);
}
