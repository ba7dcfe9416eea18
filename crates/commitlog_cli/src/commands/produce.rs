//! Produce command implementation.

use super::{open, CliResult, LogOptions};
use commitlog_core::Record;
use std::path::Path;
use tracing::debug;

/// Runs the produce command.
pub fn run(path: &Path, options: &LogOptions, values: &[String]) -> CliResult<()> {
    let log = open(path, options)?;

    for value in values {
        let offset = log.append(&mut Record::new(value.as_bytes()))?;
        debug!(offset, size = value.len(), "appended record");
        println!("{offset}");
    }

    log.close()?;
    Ok(())
}
