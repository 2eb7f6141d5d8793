//! CLI command implementations.

pub mod inspect;
pub mod keygen;
pub mod purge;
pub mod sweep;
pub mod verify;

use crate::OutputFormat;
use murmur_core::{ReplicaStore, StoreConfig};
use serde::Serialize;
use std::path::Path;

/// Opens an existing replica without the startup sweep, so read-only
/// commands leave it untouched.
pub fn open_existing(path: &Path) -> Result<ReplicaStore, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No replica found at {:?}", path).into());
    }
    let config = StoreConfig::new()
        .create_if_missing(false)
        .sweep_on_open(false)
        .sync_on_write(true);
    Ok(ReplicaStore::open_path(path, config)?)
}

/// Prints `value` as JSON, or through `text` otherwise.
pub fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(&T),
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}
