//! Verify command implementation.

use super::{open_existing, CliError, CliResult, LogOptions};
use commitlog_core::{Log, Record};
use commitlog_storage::LEN_WIDTH;
use std::io::Read;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of offsets checked through the index.
    pub records_checked: u64,
    /// Number of records found scanning the stores.
    pub store_records: u64,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, options: &LogOptions) -> CliResult<()> {
    println!("Verifying log at {:?}", path);
    println!();

    let log = open_existing(path, options)?;
    let result = verify(&log)?;
    log.close()?;

    println!("Offsets checked: {}", result.records_checked);
    println!("Store records:   {}", result.store_records);
    for error in &result.errors {
        println!("  - {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Log verification passed");
        Ok(())
    } else {
        println!("✗ Log verification failed");
        Err(CliError::VerificationFailed(result.errors.len()))
    }
}

fn verify(log: &Log) -> CliResult<VerifyResult> {
    let mut result = VerifyResult::default();

    for segment in log.segments()? {
        for offset in segment.base_offset..segment.next_offset {
            result.records_checked += 1;
            match log.read(offset) {
                Ok(record) if record.offset == offset => {}
                Ok(record) => result.errors.push(format!(
                    "offset {offset}: record claims offset {}",
                    record.offset
                )),
                Err(e) => result.errors.push(format!("offset {offset}: {e}")),
            }
        }
    }

    let mut bytes = Vec::new();
    log.reader()?.read_to_end(&mut bytes)?;

    let mut rest = bytes.as_slice();
    let header_len = LEN_WIDTH as usize;
    while !rest.is_empty() {
        let Some((header, tail)) = rest.split_at_checked(header_len) else {
            result.errors.push(format!("{} trailing store bytes", rest.len()));
            break;
        };
        let mut len = [0u8; LEN_WIDTH as usize];
        len.copy_from_slice(header);
        let len = u64::from_be_bytes(len) as usize;

        let Some((payload, tail)) = tail.split_at_checked(len) else {
            result
                .errors
                .push(format!("store entry of {len} bytes runs past the end"));
            break;
        };
        if let Err(e) = Record::decode(payload) {
            result.errors.push(format!("undecodable store entry: {e}"));
        }
        result.store_records += 1;
        rest = tail;
    }

    if result.store_records != result.records_checked {
        result.errors.push(format!(
            "stores hold {} records but indexes hold {}",
            result.store_records, result.records_checked
        ));
    }

    Ok(result)
}
