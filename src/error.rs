//! Error types for the treestamp library
//!
//! This module defines all error types that can occur while recording,
//! reconciling or editing snapshots. Errors that abort a whole operation
//! (a missing directory, an unreadable info file, an unresolved relative path)
//! are returned to the caller; failures limited to a single entry are logged,
//! counted in [`RunStats`](crate::types::RunStats) and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the treestamp library
pub type Result<T> = std::result::Result<T, TreestampError>;

/// Main error type for all treestamp operations
#[derive(Debug, Error)]
pub enum TreestampError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// The directory to record or compare does not exist
    #[error("Directory doesn't exist, path: {0:?}")]
    DirectoryNotFound(PathBuf),

    /// The info file to load does not exist
    #[error("Info file doesn't exist, path: {0:?}")]
    InfoFileNotFound(PathBuf),

    /// The info file to write exists and overwriting was not granted
    #[error("Info file exists already, path: {0:?}")]
    InfoFileExists(PathBuf),

    /// The info file exists but does not hold a valid snapshot
    #[error("Invalid info file {path:?}: {reason}")]
    InvalidInfoFile {
        /// Path of the rejected file
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// A subtree operation was given an empty relative path
    #[error("Relative path is not specified")]
    EmptyRelativePath,

    /// A segment of a relative path has no matching directory record
    #[error("Relative path doesn't exist in base info file, path: {0}")]
    RelativePathNotFound(String),

    /// The graft target already holds a directory with the same name
    #[error("Sub directory exists in relative path already: {0}")]
    SubdirectoryExists(String),

    /// The directory to remove is not a child of the resolved parent
    #[error("Sub directory doesn't exist in relative path: {0}")]
    SubdirectoryNotFound(String),

    /// The base info file would be rewritten but overwriting was not granted
    #[error("Base info file must be overwritten, path: {0:?}")]
    OverwriteRequired(PathBuf),

    /// A stored timestamp string could not be parsed
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A property name could not be parsed
    #[error("Invalid property: {0}")]
    InvalidProperty(String),

    /// A path has no usable final component
    #[error("Invalid path: {0:?}")]
    InvalidPath(PathBuf),

    /// The operation is not available on this platform
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl TreestampError {
    /// Create an unsupported-operation error with a custom message
    pub fn unsupported(msg: impl Into<String>) -> Self {
        TreestampError::Unsupported(msg.into())
    }

    /// Check if this error is a failed precondition of a whole operation
    ///
    /// Precondition errors are raised before anything is read from or
    /// written to the tree, so no side effects have happened.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            TreestampError::DirectoryNotFound(_)
                | TreestampError::InfoFileNotFound(_)
                | TreestampError::InfoFileExists(_)
                | TreestampError::OverwriteRequired(_)
                | TreestampError::EmptyRelativePath
                | TreestampError::RelativePathNotFound(_)
                | TreestampError::SubdirectoryExists(_)
                | TreestampError::SubdirectoryNotFound(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            TreestampError::InfoFileExists(path) => {
                format!("Info file {:?} exists already. Pass --overwrite to replace it.", path)
            }
            TreestampError::OverwriteRequired(path) => {
                format!(
                    "Base info file {:?} must be overwritten by this operation. Pass --overwrite to confirm.",
                    path
                )
            }
            TreestampError::InfoFileNotFound(path) => {
                format!("Info file {:?} doesn't exist. Record one first with 'treestamp save'.", path)
            }
            TreestampError::Unsupported(msg) => {
                format!("{}. The remaining properties were still processed.", msg)
            }
            _ => self.to_string(),
        }
    }
}
