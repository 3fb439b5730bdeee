//! Utility functions for treestamp
//!
//! ## Categories of Utilities
//!
//! ### Data Formatting
//! - Byte formatting (human-readable sizes)
//! - Digit grouping for exact byte counts
//!
//! ### File Operations
//! - Atomic file writing
//!
//! ## Example Usage
//!
//! ```rust
//! use treestamp::utils::{format_byte_detail, format_bytes};
//!
//! assert_eq!(format_bytes(1536), "1.50 KB");
//! assert_eq!(format_byte_detail(1536), "1.50 KB (1,536 bytes)");
//! ```

use crate::error::{Result, TreestampError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Format bytes in human-readable form
///
/// # Example
///
/// ```rust
/// use treestamp::utils::format_bytes;
///
/// assert_eq!(format_bytes(0), "0 B");
/// assert_eq!(format_bytes(1023), "1023 B");
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(1_048_576), "1.00 MB");
/// ```
///
/// # Formatting Rules
///
/// - Values less than 1024 bytes are shown as whole numbers with "B"
/// - Larger values are shown with 2 decimal places and appropriate units
/// - Uses binary units (1024-based) rather than decimal (1000-based)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Group the digits of `value` in threes with commas
///
/// ```rust
/// use treestamp::utils::group_digits;
///
/// assert_eq!(group_digits(0), "0");
/// assert_eq!(group_digits(1234567), "1,234,567");
/// ```
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Human-readable size followed by the exact byte count
pub fn format_byte_detail(bytes: u64) -> String {
    format!("{} ({} bytes)", format_bytes(bytes), group_digits(bytes))
}

/// Atomic file write (write to a temp file then persist over the target)
///
/// The temporary file is created next to `path` so the final rename never
/// crosses a filesystem boundary. On failure the temporary file is removed
/// and any existing file at `path` is left intact.
///
/// # Errors
///
/// - [`TreestampError::InvalidPath`] if `path` has no parent directory
/// - [`TreestampError::Io`] if writing or renaming fails
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => return Err(TreestampError::InvalidPath(path.to_path_buf())),
    };

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| TreestampError::Io(e.error))?;
    Ok(())
}
