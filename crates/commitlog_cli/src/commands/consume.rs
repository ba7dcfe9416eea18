//! Consume command implementation.

use super::{open_existing, print_record, CliResult, LogOptions, RecordInfo};
use std::path::Path;

/// Runs the consume command.
pub fn run(path: &Path, options: &LogOptions, offset: u64, format: &str) -> CliResult<()> {
    let log = open_existing(path, options)?;
    let record = log.read(offset)?;
    log.close()?;

    let info = RecordInfo::from(&record);
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        _ => {
            print_record(&info);
        }
    }

    Ok(())
}
