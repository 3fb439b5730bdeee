//! Snapshot data model
//!
//! An info file holds one [`InfoRecord`]: the time it was recorded and the
//! root [`DirectoryRecord`]. Directories own their child files and
//! subdirectories; there are no parent links, walks carry the ancestor names
//! they descended through instead.
//!
//! ## Serialized form
//!
//! Records serialize to PascalCase JSON. Optional properties that were not
//! selected when recording are omitted entirely, as are `false` failure flags:
//!
//! ```json
//! {
//!   "RecordTimeUtc": "2023-11-16T09:00:00.0000000Z",
//!   "RecordTimeUtcTicks": 638357364000000000,
//!   "Directory": {
//!     "Name": "photos",
//!     "LastWriteTimeUtc": "2023-11-01T10:11:12.1314151Z",
//!     "LastWriteTimeUtcTicks": 638344350721314151,
//!     "Files": [
//!       { "Name": "a.jpg", "Size": 1024 }
//!     ],
//!     "Directories": []
//!   }
//! }
//! ```

use crate::error::{Result, TreestampError};
use crate::timestamp;
use crate::types::{EntryKind, InfoProperty};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// File name template for info files; `{}` is the recorded directory's name
pub const DEFAULT_FILE_NAME_FORMAT: &str = "{}_Info.json";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Timestamps shared by file and directory records
///
/// Each time is stored as an ISO-8601 string plus its tick count. A `None`
/// string means the property was not recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntryTimes {
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time_utc: Option<String>,
    /// Creation time in ticks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time_utc_ticks: Option<i64>,
    /// Last write time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_write_time_utc: Option<String>,
    /// Last write time in ticks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_write_time_utc_ticks: Option<i64>,
    /// Last access time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access_time_utc: Option<String>,
    /// Last access time in ticks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access_time_utc_ticks: Option<i64>,
}

impl EntryTimes {
    /// Recorded string for a timestamp property
    ///
    /// Returns `None` for non-time properties and for times that were not recorded.
    pub fn get(&self, property: InfoProperty) -> Option<&str> {
        match property {
            InfoProperty::CreationTime => self.creation_time_utc.as_deref(),
            InfoProperty::LastWriteTime => self.last_write_time_utc.as_deref(),
            InfoProperty::LastAccessTime => self.last_access_time_utc.as_deref(),
            InfoProperty::Size | InfoProperty::Hash => None,
        }
    }

    /// Record a timestamp property (string and ticks)
    ///
    /// Times without a tick representation are left unrecorded.
    pub fn set(&mut self, property: InfoProperty, time: &DateTime<Utc>) {
        let Some(ticks) = timestamp::to_ticks(time) else {
            return;
        };
        let text = Some(timestamp::format(time));
        let ticks = Some(ticks);
        match property {
            InfoProperty::CreationTime => {
                self.creation_time_utc = text;
                self.creation_time_utc_ticks = ticks;
            }
            InfoProperty::LastWriteTime => {
                self.last_write_time_utc = text;
                self.last_write_time_utc_ticks = ticks;
            }
            InfoProperty::LastAccessTime => {
                self.last_access_time_utc = text;
                self.last_access_time_utc_ticks = ticks;
            }
            InfoProperty::Size | InfoProperty::Hash => {}
        }
    }
}

/// Recorded state of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileRecord {
    /// File name, unique among its siblings
    pub name: String,
    /// Recorded timestamps
    #[serde(flatten)]
    pub times: EntryTimes,
    /// Length in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Uppercase hex SHA-512 of the content
    #[serde(rename = "sha512", default, skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,
    /// Set when the hash was selected but could not be computed
    #[serde(default, skip_serializing_if = "is_false")]
    pub compute_hash_failed: bool,
}

impl FileRecord {
    /// A record with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            times: EntryTimes::default(),
            size: None,
            sha512: None,
            compute_hash_failed: false,
        }
    }
}

/// Recorded state of one directory and everything below it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectoryRecord {
    /// Directory name, unique among its siblings
    pub name: String,
    /// Recorded timestamps
    #[serde(flatten)]
    pub times: EntryTimes,
    /// Child files, sorted by name when recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileRecord>>,
    /// Child directories, sorted by name; absent when recorded non-recursively
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directories: Option<Vec<DirectoryRecord>>,
    /// Set when the files of this directory could not be listed
    #[serde(default, skip_serializing_if = "is_false")]
    pub get_files_failed: bool,
    /// Set when the subdirectories of this directory could not be listed
    #[serde(default, skip_serializing_if = "is_false")]
    pub get_directories_failed: bool,
}

impl DirectoryRecord {
    /// A record with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            times: EntryTimes::default(),
            files: None,
            directories: None,
            get_files_failed: false,
            get_directories_failed: false,
        }
    }

    /// Child files (empty when absent)
    pub fn files(&self) -> &[FileRecord] {
        self.files.as_deref().unwrap_or_default()
    }

    /// Child directories (empty when absent)
    pub fn directories(&self) -> &[DirectoryRecord] {
        self.directories.as_deref().unwrap_or_default()
    }

    /// Child directories, created empty if absent
    pub fn directories_mut(&mut self) -> &mut Vec<DirectoryRecord> {
        self.directories.get_or_insert_with(Vec::new)
    }

    /// Find a child directory by exact name
    pub fn directory(&self, name: &str) -> Option<&DirectoryRecord> {
        self.directories().iter().find(|d| d.name == name)
    }

    /// Find a child directory by exact name, mutably
    pub fn directory_mut(&mut self, name: &str) -> Option<&mut DirectoryRecord> {
        self.directories
            .as_mut()
            .and_then(|dirs| dirs.iter_mut().find(|d| d.name == name))
    }

    /// Count all records below this directory as `(files, directories)`
    ///
    /// The directory itself is not included.
    pub fn count_descendants(&self) -> (usize, usize) {
        let mut files = self.files().len();
        let mut directories = self.directories().len();
        for child in self.directories() {
            let (child_files, child_directories) = child.count_descendants();
            files += child_files;
            directories += child_directories;
        }
        (files, directories)
    }
}

/// Borrowed view of a record of either kind
#[derive(Debug, Clone, Copy)]
pub enum EntryRecord<'a> {
    /// A file record
    File(&'a FileRecord),
    /// A directory record
    Directory(&'a DirectoryRecord),
}

impl<'a> EntryRecord<'a> {
    /// Record name
    pub fn name(&self) -> &'a str {
        match self {
            EntryRecord::File(file) => &file.name,
            EntryRecord::Directory(dir) => &dir.name,
        }
    }

    /// Recorded timestamps
    pub fn times(&self) -> &'a EntryTimes {
        match self {
            EntryRecord::File(file) => &file.times,
            EntryRecord::Directory(dir) => &dir.times,
        }
    }

    /// Entry kind
    pub fn kind(&self) -> EntryKind {
        match self {
            EntryRecord::File(_) => EntryKind::File,
            EntryRecord::Directory(_) => EntryKind::Directory,
        }
    }
}

/// Ordinal name ordering used for sibling lists
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}

/// Sort file records by name
pub fn sort_files(files: &mut [FileRecord]) {
    files.sort_by(|a, b| compare_names(&a.name, &b.name));
}

/// Sort directory records by name
pub fn sort_directories(directories: &mut [DirectoryRecord]) {
    directories.sort_by(|a, b| compare_names(&a.name, &b.name));
}

/// Root of a snapshot: record time plus the recorded directory tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InfoRecord {
    /// When the snapshot was recorded or last edited
    pub record_time_utc: String,
    /// The same time in ticks
    #[serde(default)]
    pub record_time_utc_ticks: i64,
    /// Root directory record
    pub directory: DirectoryRecord,
}

impl InfoRecord {
    /// Wrap a directory tree, stamped with the current time
    pub fn new(directory: DirectoryRecord) -> Self {
        let now = timestamp::now();
        Self {
            record_time_utc: timestamp::format(&now),
            record_time_utc_ticks: timestamp::to_ticks(&now).unwrap_or_default(),
            directory,
        }
    }

    /// Re-stamp the record time after an edit
    pub fn touch(&mut self) {
        let now = timestamp::now();
        self.record_time_utc = timestamp::format(&now);
        self.record_time_utc_ticks = timestamp::to_ticks(&now).unwrap_or_default();
    }

    /// Record time, preferring the exact tick value
    pub fn record_time(&self) -> Option<DateTime<Utc>> {
        timestamp::from_ticks(self.record_time_utc_ticks)
            .filter(|_| self.record_time_utc_ticks != 0)
            .or_else(|| timestamp::parse(&self.record_time_utc).ok())
    }
}

/// Default info file for `dir`: `<dirname>_Info.json` next to the directory
///
/// # Errors
///
/// - [`TreestampError::InvalidPath`] if `dir` has no final component or no parent
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use treestamp::record::default_info_file;
///
/// let path = default_info_file(Path::new("/data/photos")).unwrap();
/// assert_eq!(path, Path::new("/data/photos_Info.json"));
/// ```
pub fn default_info_file(dir: &Path) -> Result<PathBuf> {
    let name = dir
        .file_name()
        .ok_or_else(|| TreestampError::InvalidPath(dir.to_path_buf()))?;
    let parent = dir
        .parent()
        .ok_or_else(|| TreestampError::InvalidPath(dir.to_path_buf()))?;
    let file_name = DEFAULT_FILE_NAME_FORMAT.replace("{}", &name.to_string_lossy());
    Ok(parent.join(file_name))
}
