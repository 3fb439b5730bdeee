//! Live filesystem access
//!
//! Everything the recorder and the reconciler need from the live tree goes
//! through this module:
//!
//! - one-level enumeration of files and subdirectories ([`read_files`],
//!   [`read_subdirectories`]), each failing independently
//! - reading live attributes ([`LiveAttributes`])
//! - writing timestamps back ([`set_entry_time`])
//! - counting everything below a directory ([`count_directory_content`])
//!
//! Symbolic links are never followed. A link is enumerated as a file entry
//! whatever it points to, and its own attributes are read.

use crate::error::{Result, TreestampError};
use crate::timestamp;
use crate::types::{EntryKind, InfoProperty};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// A direct child found while enumerating a live directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEntry {
    /// File name of the entry
    pub name: String,
    /// Full path of the entry
    pub path: PathBuf,
    /// Entry kind; symbolic links are files
    pub kind: EntryKind,
}

/// List the files directly inside `dir`, in enumeration order
///
/// # Errors
///
/// - [`TreestampError::WalkDir`] if the directory cannot be read
///
/// Entries that cannot be read are logged and skipped.
pub fn read_files(dir: &Path) -> Result<Vec<LiveEntry>> {
    read_children(dir, EntryKind::File)
}

/// List the subdirectories directly inside `dir`, in enumeration order
///
/// # Errors
///
/// - [`TreestampError::WalkDir`] if the directory cannot be read
///
/// Entries that cannot be read are logged and skipped.
pub fn read_subdirectories(dir: &Path) -> Result<Vec<LiveEntry>> {
    read_children(dir, EntryKind::Directory)
}

fn read_children(dir: &Path, kind: EntryKind) -> Result<Vec<LiveEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let entry = match entry {
            Ok(entry) => entry,
            // Failing to open `dir` itself fails the whole enumeration
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                continue;
            }
        };
        let entry_kind = if entry.file_type().is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        if entry_kind != kind {
            continue;
        }
        entries.push(LiveEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.into_path(),
            kind,
        });
    }
    trace!("Enumerated {} {} entries in {:?}", entries.len(), kind.noun(), dir);
    Ok(entries)
}

/// Attributes of a live entry, read once
#[derive(Debug, Clone)]
pub struct LiveAttributes {
    metadata: Metadata,
}

impl LiveAttributes {
    /// Read the attributes of `path` without following symbolic links
    ///
    /// # Errors
    ///
    /// - [`TreestampError::Io`] if the entry cannot be inspected
    pub fn read(path: &Path) -> Result<Self> {
        Ok(Self {
            metadata: fs::symlink_metadata(path)?,
        })
    }

    /// Live value of a timestamp property
    ///
    /// Returns `None` for non-time properties, for times the platform does
    /// not provide and for times outside the recordable range.
    pub fn time(&self, property: InfoProperty) -> Option<DateTime<Utc>> {
        let time = match property {
            InfoProperty::CreationTime => self.metadata.created(),
            InfoProperty::LastWriteTime => self.metadata.modified(),
            InfoProperty::LastAccessTime => self.metadata.accessed(),
            InfoProperty::Size | InfoProperty::Hash => return None,
        };
        let time = time.ok()?;
        let converted = timestamp::from_system_time(time);
        if converted.is_none() {
            debug!("Ignoring out of range {}: {:?}", property, time);
        }
        converted
    }

    /// Length in bytes
    pub fn size(&self) -> u64 {
        self.metadata.len()
    }

    /// Whether the entry is a directory
    pub fn is_dir(&self) -> bool {
        self.metadata.is_dir()
    }
}

/// Write one timestamp property of a live entry
///
/// Last write and last access times are written through `filetime`, leaving
/// the other time untouched. Creation times can only be written on Windows.
///
/// # Errors
///
/// - [`TreestampError::Io`] if the entry cannot be opened or updated
/// - [`TreestampError::Unsupported`] for creation times on other platforms
/// - [`TreestampError::InvalidProperty`] for `Size` and `Hash`
pub fn set_entry_time(path: &Path, property: InfoProperty, time: &DateTime<Utc>) -> Result<()> {
    let system_time = SystemTime::from(*time);
    match property {
        InfoProperty::CreationTime => set_creation_time(path, system_time),
        InfoProperty::LastWriteTime | InfoProperty::LastAccessTime => {
            let metadata = fs::symlink_metadata(path)?;
            let new_time = FileTime::from_system_time(system_time);
            if metadata.file_type().is_symlink() {
                let atime = FileTime::from_last_access_time(&metadata);
                let mtime = FileTime::from_last_modification_time(&metadata);
                if property == InfoProperty::LastWriteTime {
                    filetime::set_symlink_file_times(path, atime, new_time)?;
                } else {
                    filetime::set_symlink_file_times(path, new_time, mtime)?;
                }
            } else if property == InfoProperty::LastWriteTime {
                filetime::set_file_mtime(path, new_time)?;
            } else {
                filetime::set_file_atime(path, new_time)?;
            }
            trace!("Set {} of {:?}", property, path);
            Ok(())
        }
        InfoProperty::Size | InfoProperty::Hash => {
            Err(TreestampError::InvalidProperty(property.display_name().to_string()))
        }
    }
}

#[cfg(windows)]
fn set_creation_time(path: &Path, time: SystemTime) -> Result<()> {
    use std::fs::{FileTimes, OpenOptions};
    use std::os::windows::fs::{FileTimesExt, OpenOptionsExt};

    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    // Required to open directories
    const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;

    let file = OpenOptions::new()
        .access_mode(FILE_WRITE_ATTRIBUTES)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)?;
    file.set_times(FileTimes::new().set_created(time))?;
    trace!("Set creation time of {:?}", path);
    Ok(())
}

#[cfg(not(windows))]
fn set_creation_time(path: &Path, _time: SystemTime) -> Result<()> {
    Err(TreestampError::unsupported(format!(
        "Setting the creation time is not supported on this platform, path: {:?}",
        path
    )))
}

/// Count everything below `dir` as `(files, directories)`
///
/// Unreadable parts of the tree are logged and skipped. The directory itself
/// is not included.
pub fn count_directory_content(dir: &Path) -> (usize, usize) {
    let mut files = 0;
    let mut directories = 0;
    for entry in WalkDir::new(dir).min_depth(1).follow_links(false) {
        match entry {
            Ok(entry) if entry.file_type().is_dir() => directories += 1,
            Ok(_) => files += 1,
            Err(e) => warn!("Failed to count entries below {:?}: {}", dir, e),
        }
    }
    (files, directories)
}
