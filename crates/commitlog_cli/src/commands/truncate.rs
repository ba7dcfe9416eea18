//! Truncate command implementation.

use super::{open_existing, CliResult, LogOptions};
use std::path::Path;

/// Runs the truncate command.
pub fn run(path: &Path, options: &LogOptions, lowest: u64) -> CliResult<()> {
    let log = open_existing(path, options)?;
    let removed = log.truncate(lowest)?;

    println!(
        "Removed {removed} segment(s); lowest retained offset is now {}",
        log.lowest_offset()?
    );

    log.close()?;
    Ok(())
}
