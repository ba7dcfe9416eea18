//! Inspect command implementation.

use super::{open_existing, CliResult, LogOptions};
use commitlog_core::Log;
use serde::Serialize;
use std::path::Path;

/// Log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log path.
    pub path: String,
    /// Base offset of the oldest segment.
    pub lowest_offset: u64,
    /// Last offset held, if any.
    pub highest_offset: Option<u64>,
    /// Offset the next append will get.
    pub next_offset: u64,
    /// Total store bytes.
    pub store_size: u64,
    /// Total index bytes.
    pub index_size: u64,
    /// Per-segment details.
    pub segments: Vec<SegmentStats>,
}

/// Statistics for a single segment.
#[derive(Debug, Serialize)]
pub struct SegmentStats {
    /// First offset.
    pub base_offset: u64,
    /// Next offset.
    pub next_offset: u64,
    /// Number of records.
    pub records: u64,
    /// Store size in bytes.
    pub store_size: u64,
    /// Index size in bytes.
    pub index_size: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, options: &LogOptions, format: &str) -> CliResult<()> {
    let log = open_existing(path, options)?;
    let result = inspect(&log)?;
    log.close()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn inspect(log: &Log) -> CliResult<InspectResult> {
    let segments: Vec<SegmentStats> = log
        .segments()?
        .into_iter()
        .map(|s| SegmentStats {
            base_offset: s.base_offset,
            next_offset: s.next_offset,
            records: s.next_offset - s.base_offset,
            store_size: s.store_size,
            index_size: s.index_size,
        })
        .collect();

    Ok(InspectResult {
        path: log.dir().display().to_string(),
        lowest_offset: log.lowest_offset()?,
        highest_offset: log.highest_offset()?,
        next_offset: log.next_offset()?,
        store_size: segments.iter().map(|s| s.store_size).sum(),
        index_size: segments.iter().map(|s| s.index_size).sum(),
        segments,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Commit Log Inspection");
    println!("=====================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Offsets:");
    println!("  Lowest:  {}", result.lowest_offset);
    match result.highest_offset {
        Some(highest) => println!("  Highest: {highest}"),
        None => println!("  Highest: (empty)"),
    }
    println!("  Next:    {}", result.next_offset);
    println!();
    println!("Storage:");
    println!("  Store size: {}", format_size(result.store_size));
    println!("  Index size: {}", format_size(result.index_size));
    println!();
    println!("Segments ({}):", result.segments.len());
    for segment in &result.segments {
        println!(
            "  [{}..{}) {} records, store {}, index {}",
            segment.base_offset,
            segment.next_offset,
            segment.records,
            format_size(segment.store_size),
            format_size(segment.index_size)
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
