//! Recording snapshots of live directory trees
//!
//! The [`Recorder`] walks a directory depth-first and builds a
//! [`DirectoryRecord`] tree holding the selected properties of every entry.
//! For each directory the children are recorded first and the directory's
//! own record is built last; its attributes are read before enumeration so
//! listing the directory does not disturb its access time.
//!
//! Failures limited to one entry never abort the walk:
//!
//! - a directory whose files or subdirectories cannot be listed gets
//!   `GetFilesFailed` / `GetDirectoriesFailed` set and an empty list
//! - a file whose hash cannot be computed gets `ComputeHashFailed` set
//!
//! Both are logged, reported and counted in [`RunStats`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use treestamp::{ConsoleReporter, RecorderBuilder};
//! use treestamp::types::{InfoProperty, PropertySet};
//!
//! # fn main() -> treestamp::Result<()> {
//! let recorder = RecorderBuilder::new()
//!     .recursive(true)
//!     .file_properties(PropertySet::from_iter([InfoProperty::LastWriteTime, InfoProperty::Hash]))
//!     .build();
//!
//! let stats = recorder.save(
//!     Path::new("photos"),
//!     Path::new("photos_Info.json"),
//!     false,
//!     &mut ConsoleReporter::new(),
//! )?;
//! println!("{} files saved", stats.saved.files);
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, TreestampError};
use crate::hasher;
use crate::record::{self, DirectoryRecord, FileRecord, InfoRecord};
use crate::report::{Reporter, RunHeader};
use crate::snapshot;
use crate::types::{EntryKind, InfoProperty, PropertySet, RelativePath, RunStats};
use crate::walk::{self, LiveAttributes, LiveEntry};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// File properties recorded when no selection is given
pub fn default_file_properties() -> PropertySet {
    PropertySet::from_iter([
        InfoProperty::CreationTime,
        InfoProperty::LastWriteTime,
        InfoProperty::LastAccessTime,
        InfoProperty::Size,
    ])
}

/// Directory properties recorded when no selection is given
pub fn default_directory_properties() -> PropertySet {
    PropertySet::times()
}

/// Builder for [`Recorder`]
///
/// # Default Values
///
/// - `recursive`: false
/// - `file_properties`: creation, last write and last access time plus size
/// - `directory_properties`: creation, last write and last access time
#[derive(Debug, Clone)]
pub struct RecorderBuilder {
    recursive: bool,
    file_properties: Option<PropertySet>,
    directory_properties: Option<PropertySet>,
}

impl RecorderBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            recursive: false,
            file_properties: None,
            directory_properties: None,
        }
    }

    /// Descend into subdirectories
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Select the file properties to record
    pub fn file_properties(mut self, properties: PropertySet) -> Self {
        self.file_properties = Some(properties);
        self
    }

    /// Select the directory properties to record
    ///
    /// Only timestamps apply to directories; `Size` and `Hash` are dropped.
    pub fn directory_properties(mut self, properties: PropertySet) -> Self {
        self.directory_properties = Some(properties);
        self
    }

    /// Build the recorder
    pub fn build(self) -> Recorder {
        Recorder {
            recursive: self.recursive,
            file_properties: self.file_properties.unwrap_or_else(default_file_properties),
            directory_properties: self
                .directory_properties
                .unwrap_or_else(default_directory_properties)
                .intersect(PropertySet::times()),
        }
    }
}

impl Default for RecorderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Records live directory trees into snapshots
#[derive(Debug, Clone)]
pub struct Recorder {
    recursive: bool,
    file_properties: PropertySet,
    directory_properties: PropertySet,
}

impl Recorder {
    /// Selected file properties
    pub fn file_properties(&self) -> PropertySet {
        self.file_properties
    }

    /// Selected directory properties
    pub fn directory_properties(&self) -> PropertySet {
        self.directory_properties
    }

    /// Record `dir` and write the snapshot to `info_file`
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory to record
    /// * `info_file` - Snapshot destination
    /// * `overwrite` - Replace `info_file` if it exists
    /// * `reporter` - Receives per-entry events
    ///
    /// # Returns
    ///
    /// Returns the counters of the run; `saved` holds the recorded entries.
    ///
    /// # Errors
    ///
    /// - [`TreestampError::DirectoryNotFound`] if `dir` is not a directory
    /// - [`TreestampError::InfoFileExists`] if `info_file` exists and `overwrite` is false
    /// - [`TreestampError::Io`] / [`TreestampError::Json`] if the snapshot cannot be written
    ///
    /// Both preconditions are checked before anything is read.
    pub fn save(
        &self,
        dir: &Path,
        info_file: &Path,
        overwrite: bool,
        reporter: &mut dyn Reporter,
    ) -> Result<RunStats> {
        reporter.run_started(&RunHeader {
            operation: "save",
            directory: Some(dir),
            info_file,
            recursive: self.recursive,
            file_properties: self.file_properties,
            directory_properties: self.directory_properties,
            fast_hash: false,
        });

        if !dir.is_dir() {
            return Err(TreestampError::DirectoryNotFound(dir.to_path_buf()));
        }
        if info_file.exists() && !overwrite {
            return Err(TreestampError::InfoFileExists(info_file.to_path_buf()));
        }

        info!("Recording {:?} into {:?}", dir, info_file);
        let start = Instant::now();
        let mut stats = RunStats::default();
        let record = self.record(dir, reporter, &mut stats)?;
        snapshot::save(info_file, &record)?;

        info!(
            "Recorded {} files and {} directories in {:?}",
            stats.saved.files,
            stats.saved.directories,
            start.elapsed()
        );
        reporter.run_finished("save", &stats, start.elapsed());
        Ok(stats)
    }

    /// Record `dir` into an in-memory snapshot stamped with the current time
    ///
    /// # Errors
    ///
    /// - [`TreestampError::DirectoryNotFound`] if `dir` is not a directory
    /// - [`TreestampError::InvalidPath`] if the directory has no name
    pub fn record(
        &self,
        dir: &Path,
        reporter: &mut dyn Reporter,
        stats: &mut RunStats,
    ) -> Result<InfoRecord> {
        if !dir.is_dir() {
            return Err(TreestampError::DirectoryNotFound(dir.to_path_buf()));
        }
        let name = directory_name(dir)?;
        let mut ancestors = Vec::new();
        let root = self.walk_directory(dir, name, &mut ancestors, reporter, stats);
        Ok(InfoRecord::new(root))
    }

    fn walk_directory(
        &self,
        dir: &Path,
        name: String,
        ancestors: &mut Vec<String>,
        reporter: &mut dyn Reporter,
        stats: &mut RunStats,
    ) -> DirectoryRecord {
        let here = RelativePath::directory(ancestors);
        debug!("Recording directory {}", here);
        let live = LiveAttributes::read(dir);

        let mut get_files_failed = false;
        let mut files = Vec::new();
        match walk::read_files(dir) {
            Ok(entries) => {
                for entry in &entries {
                    let path = RelativePath::child(ancestors, &entry.name, EntryKind::File);
                    files.push(self.record_file(entry, &path, reporter, stats));
                }
            }
            Err(e) => {
                warn!("Failed to list files of {:?}: {}", dir, e);
                reporter.entry_failed(&here, &e.to_string());
                stats.enumeration_failed += 1;
                get_files_failed = true;
            }
        }
        record::sort_files(&mut files);

        let mut get_directories_failed = false;
        let directories = if self.recursive {
            let mut directories = Vec::new();
            match walk::read_subdirectories(dir) {
                Ok(entries) => {
                    for entry in entries {
                        ancestors.push(entry.name.clone());
                        let child =
                            self.walk_directory(&entry.path, entry.name, ancestors, reporter, stats);
                        ancestors.pop();
                        directories.push(child);
                    }
                }
                Err(e) => {
                    warn!("Failed to list subdirectories of {:?}: {}", dir, e);
                    reporter.entry_failed(&here, &e.to_string());
                    stats.enumeration_failed += 1;
                    get_directories_failed = true;
                }
            }
            record::sort_directories(&mut directories);
            Some(directories)
        } else {
            None
        };

        let mut record = self.record_directory(name, live, &here, reporter, stats);
        record.files = Some(files);
        record.directories = directories;
        record.get_files_failed = get_files_failed;
        record.get_directories_failed = get_directories_failed;
        record
    }

    /// Build the record of one file with the selected properties
    ///
    /// Never fails: unreadable attributes are left unset and a failed hash
    /// sets `ComputeHashFailed`.
    pub fn record_file(
        &self,
        entry: &LiveEntry,
        path: &RelativePath,
        reporter: &mut dyn Reporter,
        stats: &mut RunStats,
    ) -> FileRecord {
        let mut record = FileRecord::new(entry.name.clone());

        match LiveAttributes::read(&entry.path) {
            Ok(live) => {
                fill_times(&mut record.times, &live, self.file_properties, path);
                if self.file_properties.contains(InfoProperty::Size) {
                    record.size = Some(live.size());
                }
            }
            Err(e) => {
                warn!("Failed to read attributes of {:?}: {}", entry.path, e);
                reporter.entry_failed(path, &e.to_string());
            }
        }

        if self.file_properties.contains(InfoProperty::Hash) {
            let result = hasher::hash_file(&entry.path, |progress| {
                reporter.hash_progress(path, &progress)
            });
            reporter.hash_finished(path);
            match result {
                Ok(digest) => record.sha512 = Some(digest),
                Err(e) => {
                    warn!("Failed to hash {:?}: {}", entry.path, e);
                    reporter.entry_failed(path, &e.to_string());
                    stats.hash_failed += 1;
                    record.compute_hash_failed = true;
                }
            }
        }

        trace!("Recorded file {}", path);
        reporter.entry_saved(path);
        stats.saved.bump(EntryKind::File);
        record
    }

    /// Build the record of one directory from attributes read earlier
    ///
    /// Child lists are left unset; the caller fills them in.
    pub fn record_directory(
        &self,
        name: String,
        live: Result<LiveAttributes>,
        path: &RelativePath,
        reporter: &mut dyn Reporter,
        stats: &mut RunStats,
    ) -> DirectoryRecord {
        let mut record = DirectoryRecord::new(name);
        match live {
            Ok(live) => fill_times(&mut record.times, &live, self.directory_properties, path),
            Err(e) => {
                warn!("Failed to read attributes of directory {}: {}", path, e);
                reporter.entry_failed(path, &e.to_string());
            }
        }

        trace!("Recorded directory {}", path);
        reporter.entry_saved(path);
        stats.saved.bump(EntryKind::Directory);
        record
    }
}

fn fill_times(
    times: &mut record::EntryTimes,
    live: &LiveAttributes,
    properties: PropertySet,
    path: &RelativePath,
) {
    for property in properties.times_iter() {
        match live.time(property) {
            Some(time) => times.set(property, &time),
            None => debug!("{} is not available for {}", property, path),
        }
    }
}

/// Name of the directory at `dir`, resolving `.` and similar paths
fn directory_name(dir: &Path) -> Result<String> {
    if let Some(name) = dir.file_name() {
        return Ok(name.to_string_lossy().into_owned());
    }
    fs::canonicalize(dir)?
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| TreestampError::InvalidPath(dir.to_path_buf()))
}
