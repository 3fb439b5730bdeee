//! Core data types used throughout the treestamp library
//!
//! This module contains the small value types shared by the recorder, the
//! reconciler and the reporters.
//!
//! ## Overview
//!
//! - **Property selection**: [`InfoProperty`], [`PropertySet`] - which attributes are tracked
//! - **Run control**: [`Mode`] - what a reconciliation run does with the live tree
//! - **Paths**: [`EntryKind`], [`RelativePath`] - entry identity relative to the walked root
//! - **Results**: [`KindCounts`], [`RunStats`] - the counters accumulated over a run
//! - **Progress**: [`HashProgress`] - payload of hash progress reports
//!
//! ## Examples
//!
//! ```rust
//! use treestamp::types::{InfoProperty, PropertySet};
//!
//! let selection: PropertySet = "last-write-time,size".parse().unwrap();
//! assert!(selection.contains(InfoProperty::Size));
//! assert!(!selection.contains(InfoProperty::Hash));
//! ```

use crate::error::{Result, TreestampError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A property of a file or directory that can be recorded and compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InfoProperty {
    /// Date created
    CreationTime,
    /// Date modified
    LastWriteTime,
    /// Date accessed
    LastAccessTime,
    /// File size
    Size,
    /// SHA-512 of file content
    Hash,
}

impl InfoProperty {
    /// All properties, in display order
    pub const ALL: [InfoProperty; 5] = [
        InfoProperty::CreationTime,
        InfoProperty::LastWriteTime,
        InfoProperty::LastAccessTime,
        InfoProperty::Size,
        InfoProperty::Hash,
    ];

    /// The three timestamp properties
    pub const TIMES: [InfoProperty; 3] = [
        InfoProperty::CreationTime,
        InfoProperty::LastWriteTime,
        InfoProperty::LastAccessTime,
    ];

    /// Human readable name used in console output
    pub fn display_name(self) -> &'static str {
        match self {
            InfoProperty::CreationTime => "date created",
            InfoProperty::LastWriteTime => "date modified",
            InfoProperty::LastAccessTime => "date accessed",
            InfoProperty::Size => "size",
            InfoProperty::Hash => "SHA512",
        }
    }

    /// Whether this property is a timestamp that can be written back to disk
    pub fn is_time(self) -> bool {
        matches!(
            self,
            InfoProperty::CreationTime | InfoProperty::LastWriteTime | InfoProperty::LastAccessTime
        )
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for InfoProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for InfoProperty {
    type Err = TreestampError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "creationtime" | "created" | "ctime" => Ok(InfoProperty::CreationTime),
            "lastwritetime" | "modified" | "mtime" => Ok(InfoProperty::LastWriteTime),
            "lastaccesstime" | "accessed" | "atime" => Ok(InfoProperty::LastAccessTime),
            "size" => Ok(InfoProperty::Size),
            "hash" | "sha512" => Ok(InfoProperty::Hash),
            _ => Err(TreestampError::InvalidProperty(s.to_string())),
        }
    }
}

/// A selection of [`InfoProperty`] values
///
/// Stored as a bit mask; iteration always follows [`InfoProperty::ALL`] order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PropertySet(u8);

impl PropertySet {
    /// The empty selection
    pub const fn empty() -> Self {
        PropertySet(0)
    }

    /// Every property
    pub fn all() -> Self {
        Self::from_iter(InfoProperty::ALL)
    }

    /// The three timestamps
    pub fn times() -> Self {
        Self::from_iter(InfoProperty::TIMES)
    }

    /// Check whether `property` is selected
    pub fn contains(&self, property: InfoProperty) -> bool {
        self.0 & property.bit() != 0
    }

    /// Add a property to the selection
    pub fn insert(&mut self, property: InfoProperty) {
        self.0 |= property.bit();
    }

    /// Remove a property from the selection
    pub fn remove(&mut self, property: InfoProperty) {
        self.0 &= !property.bit();
    }

    /// Keep only properties present in both sets
    pub fn intersect(self, other: PropertySet) -> Self {
        PropertySet(self.0 & other.0)
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate selected properties in display order
    pub fn iter(&self) -> impl Iterator<Item = InfoProperty> + '_ {
        InfoProperty::ALL.into_iter().filter(|p| self.contains(*p))
    }

    /// Iterate selected timestamp properties
    pub fn times_iter(&self) -> impl Iterator<Item = InfoProperty> + '_ {
        self.iter().filter(|p| p.is_time())
    }
}

impl FromIterator<InfoProperty> for PropertySet {
    fn from_iter<I: IntoIterator<Item = InfoProperty>>(iter: I) -> Self {
        let mut set = PropertySet::empty();
        for property in iter {
            set.insert(property);
        }
        set
    }
}

impl FromStr for PropertySet {
    type Err = TreestampError;

    /// Parse a comma separated list of property names
    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(InfoProperty::from_str)
            .collect()
    }
}

impl fmt::Debug for PropertySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for PropertySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(InfoProperty::display_name).collect();
        f.write_str(&names.join(", "))
    }
}

/// What a reconciliation run does with the live tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Compare and report differences
    Validate,
    /// Compare and write recorded timestamps back to disk
    Restore,
    /// Print the recorded tree without touching the filesystem
    List,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Validate => f.write_str("validate"),
            Mode::Restore => f.write_str("restore"),
            Mode::List => f.write_str("list"),
        }
    }
}

/// Kind of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file (or anything that is not a directory)
    File,
    /// Directory
    Directory,
}

impl EntryKind {
    /// Lowercase noun for console output
    pub fn noun(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
        }
    }
}

/// Path of an entry relative to the walked root
///
/// Built from the sequence of ancestor names the walk has descended through.
/// Directories display with a trailing `/`; the root displays as `./`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativePath {
    segments: Vec<String>,
    kind: EntryKind,
}

impl RelativePath {
    /// The walked root directory itself
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
            kind: EntryKind::Directory,
        }
    }

    /// A child entry named `name` below `ancestors`
    pub fn child(ancestors: &[String], name: &str, kind: EntryKind) -> Self {
        let mut segments = ancestors.to_vec();
        segments.push(name.to_string());
        Self { segments, kind }
    }

    /// A directory given by its full segment list (empty means root)
    pub fn directory(segments: &[String]) -> Self {
        Self {
            segments: segments.to_vec(),
            kind: EntryKind::Directory,
        }
    }

    /// Entry kind
    pub fn kind(&self) -> EntryKind {
        self.kind
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("./");
        }
        f.write_str(&self.segments.join("/"))?;
        if self.kind == EntryKind::Directory {
            f.write_str("/")?;
        }
        Ok(())
    }
}

/// A counter split by entry kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounts {
    /// File entries
    pub files: usize,
    /// Directory entries
    pub directories: usize,
}

impl KindCounts {
    /// Add one entry of `kind`
    pub fn bump(&mut self, kind: EntryKind) {
        self.add(kind, 1);
    }

    /// Add `count` entries of `kind`
    pub fn add(&mut self, kind: EntryKind, count: usize) {
        match kind {
            EntryKind::File => self.files += count,
            EntryKind::Directory => self.directories += count,
        }
    }

    /// Files plus directories
    pub fn total(&self) -> usize {
        self.files + self.directories
    }
}

/// Counters accumulated over one run
///
/// Passed by `&mut` through the recursive walks; nothing else holds run state.
///
/// # Examples
///
/// ```rust
/// # use treestamp::types::{EntryKind, RunStats};
/// let mut stats = RunStats::default();
/// stats.checked.bump(EntryKind::File);
/// stats.same.bump(EntryKind::File);
/// assert!(stats.is_clean());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Entries written to a new snapshot
    pub saved: KindCounts,
    /// Records printed in list mode
    pub listed: KindCounts,
    /// Matched pairs that were compared
    pub checked: KindCounts,
    /// Compared entries without differences
    pub same: KindCounts,
    /// Compared entries with at least one difference
    pub changed: KindCounts,
    /// Recorded entries with no live counterpart
    pub missing: KindCounts,
    /// Live entries with no recorded counterpart
    pub unknown: KindCounts,
    /// Files whose content hash could not be computed
    pub hash_failed: usize,
    /// Timestamp writes that failed in restore mode
    pub restore_failed: usize,
    /// Directory listings that could not be read
    pub enumeration_failed: usize,
}

impl RunStats {
    /// Whether the compared tree matched the snapshot exactly
    pub fn is_clean(&self) -> bool {
        self.changed.total() == 0 && self.missing.total() == 0 && self.unknown.total() == 0
    }

    /// Whether any per-entry failure was recovered during the run
    pub fn has_failures(&self) -> bool {
        self.hash_failed > 0 || self.restore_failed > 0 || self.enumeration_failed > 0
    }
}

/// Progress of a streaming hash computation
///
/// Carries raw counters; derived values are computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashProgress {
    /// Length of the file being hashed
    pub total_length: u64,
    /// Bytes hashed so far
    pub total_read: u64,
    /// Bytes hashed since the previous report
    pub read_since_report: u64,
    /// Milliseconds since the previous report
    pub elapsed_ms: u64,
}

impl HashProgress {
    /// Progress as a percentage (0-100); an empty file is complete
    pub fn percentage(&self) -> f64 {
        if self.total_length == 0 {
            return 100.0;
        }
        self.total_read as f64 / self.total_length as f64 * 100.0
    }

    /// Throughput since the previous report
    pub fn bytes_per_second(&self) -> u64 {
        let elapsed = self.elapsed_ms.max(1);
        self.read_since_report.saturating_mul(1000) / elapsed
    }
}
