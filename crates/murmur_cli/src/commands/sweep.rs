//! Sweep command implementation.

use super::{emit, open_existing};
use crate::OutputFormat;
use murmur_core::CompactionReport;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct SweepResult {
    removed: usize,
    remaining: usize,
    compaction: CompactionReport,
}

/// Runs the sweep command: drops expired notifications, then compacts the
/// journal so their bytes are reclaimed.
pub fn run(path: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let removed = store.sweep_expired()?;
    let compaction = store.compact()?;
    tracing::debug!(removed, bytes = compaction.bytes_after, "sweep complete");
    let result = SweepResult {
        removed,
        remaining: store.counts().notifications,
        compaction,
    };
    emit(format, &result, |r| {
        println!("Removed {} expired notifications, {} remain", r.removed, r.remaining);
        println!(
            "Journal compacted: {} -> {} bytes",
            r.compaction.bytes_before, r.compaction.bytes_after
        );
    })
}
