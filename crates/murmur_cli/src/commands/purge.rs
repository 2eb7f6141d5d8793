//! Purge command implementation.

use super::{emit, open_existing};
use crate::OutputFormat;
use murmur_core::PurgeReport;
use murmur_identity::PublicKey;
use std::path::Path;

/// Runs the purge command.
///
/// The journal is compacted afterwards, so the purged records are gone
/// from disk. Only this replica is affected; nodes that already ingested
/// the identity's records keep their copies.
pub fn run(
    path: &Path,
    author: &str,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let identity: PublicKey = author.parse()?;
    let store = open_existing(path)?;
    let report = store.purge_all_data_for(&identity)?;
    tracing::info!(identity = %identity, ?report, "purge complete");
    emit(format, &report, |r| print_text_output(&identity, r))
}

fn print_text_output(identity: &PublicKey, report: &PurgeReport) {
    println!("Purged {}", identity);
    println!("  Posts:         {}", report.posts);
    println!("  Comments:      {}", report.comments);
    println!("  Votes:         {}", report.votes);
    println!("  Notifications: {}", report.notifications);
    println!("  Retractions:   {}", report.retractions);
}
