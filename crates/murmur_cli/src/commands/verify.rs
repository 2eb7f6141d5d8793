//! Verify command implementation.

use super::{emit, open_existing};
use crate::OutputFormat;
use murmur_core::VerifyReport;
use std::path::Path;

/// Runs the verify command.
///
/// Fails if any stored record no longer verifies.
pub fn run(path: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let report = store.verify_all();
    emit(format, &report, print_text_output)?;

    if report.is_clean() {
        Ok(())
    } else {
        Err(format!("{} records failed verification", report.invalid.len()).into())
    }
}

fn print_text_output(report: &VerifyReport) {
    println!("Signed records checked: {}", report.checked);
    for (table, id) in &report.invalid {
        println!("    INVALID: {} {}", table, id);
    }
    println!();
    if report.is_clean() {
        println!("✓ Replica verification passed");
    } else {
        println!("✗ Replica verification failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::{ReplicaStore, StoreConfig};
    use murmur_identity::{KdfParams, Session};

    #[test]
    fn clean_replica_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.journal");
        {
            let store = ReplicaStore::open_path(&path, StoreConfig::default()).unwrap();
            let alice = Session::generate(&KdfParams::fast_for_tests()).unwrap();
            let post = store.create_post(&alice, b"hi").unwrap();
            store.create_comment(&alice, post.id, b"me", None).unwrap();
        }

        run(&path, OutputFormat::Json).unwrap();
    }

    #[test]
    fn missing_replica_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&dir.path().join("absent"), OutputFormat::Text).is_err());
    }
}
