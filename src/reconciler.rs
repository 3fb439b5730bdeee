//! Reconciling snapshots with the live filesystem
//!
//! A [`Reconciler`] walks a live directory and a recorded [`DirectoryRecord`]
//! in parallel, matching entries by exact name.
//!
//! ## Modes
//!
//! - [`Mode::Validate`]: compare the selected properties and report differences
//! - [`Mode::Restore`]: compare timestamps and write the recorded values back
//! - [`Mode::List`]: print the recorded tree without touching the filesystem
//!
//! ## Order of a directory
//!
//! 1. Subdirectories (recursive runs only). Matched ones are reconciled
//!    depth-first. A live directory without a record is unknown and counts
//!    together with everything below it; a record without a live directory
//!    is missing and counts together with every record below it.
//! 2. Files. Matched pairs are compared; the rest are unknown or missing.
//! 3. The directory itself. Its same/changed status reflects only its own
//!    properties, never those of its children.
//!
//! ## Comparison
//!
//! Timestamps are compared on their string form: the live time is formatted
//! the way the recorder formats it and checked against the stored string. A
//! property the snapshot did not record is not compared, and neither is a
//! time the platform cannot provide. Size and hash are compared in validate
//! mode only.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use treestamp::{ConsoleReporter, ReconcilerBuilder};
//! use treestamp::types::Mode;
//!
//! # fn main() -> treestamp::Result<()> {
//! let stats = ReconcilerBuilder::new(Mode::Validate)
//!     .recursive(true)
//!     .build()
//!     .run(Path::new("photos"), Path::new("photos_Info.json"), &mut ConsoleReporter::new())?;
//!
//! if !stats.is_clean() {
//!     println!("{} files changed", stats.changed.files);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, TreestampError};
use crate::hasher;
use crate::record::{DirectoryRecord, EntryRecord, EntryTimes, FileRecord};
use crate::report::{Difference, Reporter, RunHeader};
use crate::snapshot;
use crate::timestamp;
use crate::types::{EntryKind, InfoProperty, Mode, PropertySet, RelativePath, RunStats};
use crate::walk::{self, LiveAttributes, LiveEntry};
use std::path::Path;
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing::{debug, info, trace, warn};

/// File properties compared when no selection is given
pub fn default_file_properties(mode: Mode) -> PropertySet {
    match mode {
        Mode::Restore => PropertySet::from_iter([
            InfoProperty::CreationTime,
            InfoProperty::LastWriteTime,
        ]),
        Mode::Validate | Mode::List => PropertySet::from_iter([
            InfoProperty::CreationTime,
            InfoProperty::LastWriteTime,
            InfoProperty::Size,
        ]),
    }
}

/// Directory properties compared when no selection is given
pub fn default_directory_properties() -> PropertySet {
    PropertySet::from_iter([InfoProperty::CreationTime, InfoProperty::LastWriteTime])
}

/// Builder for [`Reconciler`]
///
/// # Default Values
///
/// - `recursive`: false
/// - `file_properties`: creation and last write time, plus size outside restore mode
/// - `directory_properties`: creation and last write time
/// - `fast_hash`: false
#[derive(Debug, Clone)]
pub struct ReconcilerBuilder {
    mode: Mode,
    recursive: bool,
    file_properties: Option<PropertySet>,
    directory_properties: Option<PropertySet>,
    fast_hash: bool,
}

impl ReconcilerBuilder {
    /// Create a new builder for `mode` with default settings
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            recursive: false,
            file_properties: None,
            directory_properties: None,
            fast_hash: false,
        }
    }

    /// Descend into subdirectories
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Select the file properties to compare
    ///
    /// In restore mode only timestamps apply; `Size` and `Hash` are dropped.
    pub fn file_properties(mut self, properties: PropertySet) -> Self {
        self.file_properties = Some(properties);
        self
    }

    /// Select the directory properties to compare
    ///
    /// Only timestamps apply to directories.
    pub fn directory_properties(mut self, properties: PropertySet) -> Self {
        self.directory_properties = Some(properties);
        self
    }

    /// Hash files with the async reader
    pub fn fast_hash(mut self, fast_hash: bool) -> Self {
        self.fast_hash = fast_hash;
        self
    }

    /// Build the reconciler
    pub fn build(self) -> Reconciler {
        let mut file_properties = self
            .file_properties
            .unwrap_or_else(|| default_file_properties(self.mode));
        if self.mode == Mode::Restore {
            file_properties = file_properties.intersect(PropertySet::times());
        }
        Reconciler {
            mode: self.mode,
            recursive: self.recursive,
            file_properties,
            directory_properties: self
                .directory_properties
                .unwrap_or_else(default_directory_properties)
                .intersect(PropertySet::times()),
            fast_hash: self.fast_hash,
        }
    }
}

/// Compares, restores or lists snapshots
#[derive(Debug, Clone)]
pub struct Reconciler {
    mode: Mode,
    recursive: bool,
    file_properties: PropertySet,
    directory_properties: PropertySet,
    fast_hash: bool,
}

/// Per-run state threaded through the walk
struct Session<'a> {
    reporter: &'a mut dyn Reporter,
    stats: &'a mut RunStats,
    runtime: Option<Runtime>,
}

impl Reconciler {
    /// Run mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Selected file properties
    pub fn file_properties(&self) -> PropertySet {
        self.file_properties
    }

    /// Selected directory properties
    pub fn directory_properties(&self) -> PropertySet {
        self.directory_properties
    }

    /// Load `info_file` and reconcile it with `dir`
    ///
    /// In list mode `dir` is not accessed.
    ///
    /// # Returns
    ///
    /// Returns the counters of the run.
    ///
    /// # Errors
    ///
    /// - [`TreestampError::InfoFileNotFound`] if `info_file` does not exist
    /// - [`TreestampError::InvalidInfoFile`] if it cannot be parsed
    /// - [`TreestampError::DirectoryNotFound`] if `dir` is not a directory (validate and restore)
    pub fn run(&self, dir: &Path, info_file: &Path, reporter: &mut dyn Reporter) -> Result<RunStats> {
        let operation = self.mode.to_string();
        reporter.run_started(&RunHeader {
            operation: &operation,
            directory: (self.mode != Mode::List).then_some(dir),
            info_file,
            recursive: self.recursive,
            file_properties: self.file_properties,
            directory_properties: self.directory_properties,
            fast_hash: self.fast_hash,
        });

        let mut record = snapshot::load(info_file)?;
        let start = Instant::now();
        let mut stats = RunStats::default();

        if self.mode == Mode::List {
            self.list(&record.directory, reporter, &mut stats);
        } else {
            if !dir.is_dir() {
                return Err(TreestampError::DirectoryNotFound(dir.to_path_buf()));
            }
            info!("Running {} of {:?} against {:?}", operation, dir, info_file);
            self.reconcile(dir, &mut record.directory, reporter, &mut stats);
        }

        info!("Finished {} in {:?}: {:?}", operation, start.elapsed(), stats);
        reporter.run_finished(&operation, &stats, start.elapsed());
        Ok(stats)
    }

    /// Reconcile a live directory with its record
    ///
    /// Enumeration failures set the matching flag on `record`. In list mode
    /// this walks the record only.
    pub fn reconcile(
        &self,
        dir: &Path,
        record: &mut DirectoryRecord,
        reporter: &mut dyn Reporter,
        stats: &mut RunStats,
    ) {
        if self.mode == Mode::List {
            self.list(record, reporter, stats);
            return;
        }
        let mut session = Session {
            reporter,
            stats,
            runtime: None,
        };
        let mut ancestors = Vec::new();
        self.reconcile_directory(dir, record, &mut ancestors, &mut session);
    }

    /// Report every record of the tree with the selected properties
    pub fn list(&self, record: &DirectoryRecord, reporter: &mut dyn Reporter, stats: &mut RunStats) {
        let mut ancestors = Vec::new();
        self.list_directory(record, &mut ancestors, reporter, stats);
    }

    fn list_directory(
        &self,
        record: &DirectoryRecord,
        ancestors: &mut Vec<String>,
        reporter: &mut dyn Reporter,
        stats: &mut RunStats,
    ) {
        if self.recursive {
            for sub in record.directories() {
                ancestors.push(sub.name.clone());
                self.list_directory(sub, ancestors, reporter, stats);
                ancestors.pop();
            }
        }

        for file in record.files() {
            let path = RelativePath::child(ancestors, &file.name, EntryKind::File);
            reporter.entry_listed(&path, EntryRecord::File(file), self.file_properties);
            stats.listed.bump(EntryKind::File);
        }

        let here = RelativePath::directory(ancestors);
        reporter.entry_listed(&here, EntryRecord::Directory(record), self.directory_properties);
        stats.listed.bump(EntryKind::Directory);
    }

    fn reconcile_directory(
        &self,
        dir: &Path,
        record: &mut DirectoryRecord,
        ancestors: &mut Vec<String>,
        session: &mut Session<'_>,
    ) {
        let here = RelativePath::directory(ancestors);
        debug!("Reconciling directory {}", here);
        let live = LiveAttributes::read(dir);

        if self.recursive {
            self.reconcile_subdirectories(dir, record, ancestors, &here, session);
        }
        self.reconcile_files(dir, record, ancestors, &here, session);

        self.compare_entry(dir, live, &record.times, None, &here, session);
    }

    fn reconcile_subdirectories(
        &self,
        dir: &Path,
        record: &mut DirectoryRecord,
        ancestors: &mut Vec<String>,
        here: &RelativePath,
        session: &mut Session<'_>,
    ) {
        let entries = match walk::read_subdirectories(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list subdirectories of {:?}: {}", dir, e);
                session.reporter.entry_failed(here, &e.to_string());
                session.stats.enumeration_failed += 1;
                record.get_directories_failed = true;
                Vec::new()
            }
        };

        let mut visited = vec![false; record.directories().len()];
        for entry in entries {
            let matched = record
                .directories()
                .iter()
                .position(|sub| sub.name == entry.name);
            match matched {
                Some(index) => {
                    visited[index] = true;
                    ancestors.push(entry.name.clone());
                    let sub = &mut record.directories_mut()[index];
                    self.reconcile_directory(&entry.path, sub, ancestors, session);
                    ancestors.pop();
                }
                None => self.report_unknown(&entry, ancestors, session),
            }
        }

        for (sub, _) in record
            .directories()
            .iter()
            .zip(&visited)
            .filter(|(_, visited)| !**visited)
        {
            let path = RelativePath::child(ancestors, &sub.name, EntryKind::Directory);
            trace!("Missing directory {}", path);
            session.reporter.entry_missing(&path);
            let (files, directories) = sub.count_descendants();
            session.stats.missing.add(EntryKind::File, files);
            session.stats.missing.add(EntryKind::Directory, directories + 1);
        }
    }

    fn reconcile_files(
        &self,
        dir: &Path,
        record: &mut DirectoryRecord,
        ancestors: &[String],
        here: &RelativePath,
        session: &mut Session<'_>,
    ) {
        let entries = match walk::read_files(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list files of {:?}: {}", dir, e);
                session.reporter.entry_failed(here, &e.to_string());
                session.stats.enumeration_failed += 1;
                record.get_files_failed = true;
                Vec::new()
            }
        };

        let files = record.files();
        let mut visited = vec![false; files.len()];
        for entry in entries {
            match files.iter().position(|file| file.name == entry.name) {
                Some(index) => {
                    visited[index] = true;
                    let path = RelativePath::child(ancestors, &entry.name, EntryKind::File);
                    let live = LiveAttributes::read(&entry.path);
                    let file = &files[index];
                    self.compare_entry(&entry.path, live, &file.times, Some(file), &path, session);
                }
                None => self.report_unknown(&entry, ancestors, session),
            }
        }

        for (file, _) in files.iter().zip(&visited).filter(|(_, visited)| !**visited) {
            let path = RelativePath::child(ancestors, &file.name, EntryKind::File);
            trace!("Missing file {}", path);
            session.reporter.entry_missing(&path);
            session.stats.missing.bump(EntryKind::File);
        }
    }

    fn report_unknown(&self, entry: &LiveEntry, ancestors: &[String], session: &mut Session<'_>) {
        let path = RelativePath::child(ancestors, &entry.name, entry.kind);
        trace!("Unknown {} {}", entry.kind.noun(), path);
        session.reporter.entry_unknown(&path);
        match entry.kind {
            EntryKind::File => session.stats.unknown.bump(EntryKind::File),
            EntryKind::Directory => {
                let (files, directories) = walk::count_directory_content(&entry.path);
                session.stats.unknown.add(EntryKind::File, files);
                session.stats.unknown.add(EntryKind::Directory, directories + 1);
            }
        }
    }

    /// Compare one matched pair and classify it
    fn compare_entry(
        &self,
        live_path: &Path,
        live: Result<LiveAttributes>,
        times: &EntryTimes,
        file: Option<&FileRecord>,
        path: &RelativePath,
        session: &mut Session<'_>,
    ) {
        let kind = path.kind();
        session.stats.checked.bump(kind);

        let live = match live {
            Ok(live) => live,
            Err(e) => {
                warn!("Failed to read attributes of {:?}: {}", live_path, e);
                session.reporter.entry_failed(path, &e.to_string());
                session.stats.changed.bump(kind);
                return;
            }
        };

        let properties = match kind {
            EntryKind::File => self.file_properties,
            EntryKind::Directory => self.directory_properties,
        };

        let mut differences = Vec::new();
        for property in properties.times_iter() {
            let Some(recorded) = times.get(property) else {
                continue;
            };
            let Some(live_time) = live.time(property) else {
                debug!("{} is not available for {}, skipped", property, path);
                continue;
            };
            let live_text = timestamp::format(&live_time);
            if live_text != recorded {
                if self.mode == Mode::Restore {
                    self.restore_time(live_path, property, recorded, path, session);
                }
                differences.push(Difference::new(property, recorded, live_text));
            }
        }

        if let (Mode::Validate, Some(file)) = (self.mode, file) {
            if properties.contains(InfoProperty::Size) {
                if let Some(recorded) = file.size {
                    if recorded != live.size() {
                        differences.push(Difference::size(recorded, live.size()));
                    }
                }
            }
            if properties.contains(InfoProperty::Hash) {
                if let Some(recorded) = &file.sha512 {
                    match self.hash(live_path, path, session) {
                        Ok(digest) if &digest != recorded => {
                            differences.push(Difference::new(InfoProperty::Hash, recorded, digest));
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Failed to hash {:?}: {}", live_path, e);
                            session.reporter.entry_failed(path, &e.to_string());
                            session.stats.hash_failed += 1;
                        }
                    }
                }
            }
        }

        if differences.is_empty() {
            session.stats.same.bump(kind);
        } else {
            debug!("{} differs in {} properties", path, differences.len());
            session.stats.changed.bump(kind);
        }
        session.reporter.entry_compared(path, self.mode, &differences);
    }

    fn restore_time(
        &self,
        live_path: &Path,
        property: InfoProperty,
        recorded: &str,
        path: &RelativePath,
        session: &mut Session<'_>,
    ) {
        let result = timestamp::parse(recorded)
            .and_then(|time| walk::set_entry_time(live_path, property, &time));
        if let Err(e) = result {
            warn!("Failed to restore {} of {:?}: {}", property, live_path, e);
            session.reporter.entry_failed(path, &e.user_message());
            session.stats.restore_failed += 1;
        }
    }

    fn hash(&self, live_path: &Path, path: &RelativePath, session: &mut Session<'_>) -> Result<String> {
        let reporter = &mut *session.reporter;
        let result = if self.fast_hash {
            let runtime = match session.runtime.take() {
                Some(runtime) => runtime,
                None => tokio::runtime::Builder::new_current_thread().build()?,
            };
            let result = runtime.block_on(hasher::hash_file_async(live_path, |progress| {
                reporter.hash_progress(path, &progress)
            }));
            session.runtime = Some(runtime);
            result
        } else {
            hasher::hash_file(live_path, |progress| reporter.hash_progress(path, &progress))
        };
        reporter.hash_finished(path);
        result
    }
}
