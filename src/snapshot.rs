//! Info file persistence
//!
//! Snapshots are stored as 2-space indented JSON. Writes go through
//! [`atomic_write`](crate::utils::atomic_write), so an interrupted save never
//! leaves a truncated info file behind.

use crate::error::{Result, TreestampError};
use crate::record::InfoRecord;
use crate::utils::{atomic_write, format_bytes};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Load a snapshot from `path`
///
/// # Errors
///
/// - [`TreestampError::InfoFileNotFound`] if the file does not exist
/// - [`TreestampError::InvalidInfoFile`] if the content is not a valid snapshot
/// - [`TreestampError::Io`] for other read failures
pub fn load(path: &Path) -> Result<InfoRecord> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(TreestampError::InfoFileNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let record = serde_json::from_slice(&content).map_err(|e| TreestampError::InvalidInfoFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    debug!("Loaded info file {:?} ({})", path, format_bytes(content.len() as u64));
    Ok(record)
}

/// Write a snapshot to `path`, replacing any existing file
///
/// # Errors
///
/// - [`TreestampError::Json`] if serialization fails
/// - [`TreestampError::Io`] if the file cannot be written
pub fn save(path: &Path, record: &InfoRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    atomic_write(path, json.as_bytes())?;
    debug!("Wrote info file {:?} ({})", path, format_bytes(json.len() as u64));
    Ok(())
}
