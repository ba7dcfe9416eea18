//! Dump command implementation.

use super::{open_existing, print_record, CliResult, LogOptions, RecordInfo};
use commitlog_core::Log;
use std::path::Path;

/// Runs the dump command.
pub fn run(
    path: &Path,
    options: &LogOptions,
    start_offset: Option<u64>,
    limit: Option<usize>,
    format: &str,
) -> CliResult<()> {
    let log = open_existing(path, options)?;
    let records = read_records(&log, start_offset, limit)?;
    log.close()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            for record in &records {
                print_record(record);
            }
            println!();
            println!("{} record(s)", records.len());
        }
    }

    Ok(())
}

fn read_records(
    log: &Log,
    start_offset: Option<u64>,
    limit: Option<usize>,
) -> CliResult<Vec<RecordInfo>> {
    let lowest = log.lowest_offset()?;
    let start = start_offset.unwrap_or(lowest).max(lowest);
    let end = log.next_offset()?;
    let max_records = limit.unwrap_or(usize::MAX);

    let mut records = Vec::new();
    for offset in start..end {
        if records.len() >= max_records {
            break;
        }
        records.push(RecordInfo::from(&log.read(offset)?));
    }

    Ok(records)
}
