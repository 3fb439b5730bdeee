//! Per-entry reporting
//!
//! The recorder and the reconciler never print. Every observable event of a
//! run (an entry saved, compared, listed, found unknown or missing, a hash in
//! progress, a recovered failure) is passed to a [`Reporter`].
//!
//! Two implementations ship with the crate:
//!
//! - [`NoOpReporter`] ignores everything; useful for library callers and tests
//! - [`ConsoleReporter`] prints colored lines, draws an `indicatif` progress
//!   bar while hashing and prints a summary block at the end
//!
//! ## Writing a reporter
//!
//! All methods have empty default implementations, so a reporter only
//! overrides what it cares about:
//!
//! ```rust
//! use treestamp::report::{Difference, Reporter};
//! use treestamp::types::{Mode, RelativePath};
//!
//! #[derive(Default)]
//! struct ChangedPaths(Vec<String>);
//!
//! impl Reporter for ChangedPaths {
//!     fn entry_compared(&mut self, path: &RelativePath, _mode: Mode, differences: &[Difference]) {
//!         if !differences.is_empty() {
//!             self.0.push(path.to_string());
//!         }
//!     }
//! }
//! ```

use crate::record::EntryRecord;
use crate::types::{
    EntryKind, HashProgress, InfoProperty, KindCounts, Mode, PropertySet, RelativePath, RunStats,
};
use crate::utils::{format_byte_detail, format_bytes};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use humantime::format_duration;
use std::path::Path;
use std::time::Duration;

/// One property that differs between the record and the live entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
    /// The differing property
    pub property: InfoProperty,
    /// Value stored in the snapshot
    pub recorded: String,
    /// Value found on disk; empty when it could not be determined
    pub live: String,
}

impl Difference {
    /// Difference of a timestamp or hash property
    pub fn new(property: InfoProperty, recorded: impl Into<String>, live: impl Into<String>) -> Self {
        Self {
            property,
            recorded: recorded.into(),
            live: live.into(),
        }
    }

    /// Size difference, formatted with human-readable and exact byte counts
    pub fn size(recorded: u64, live: u64) -> Self {
        Self::new(
            InfoProperty::Size,
            format_byte_detail(recorded),
            format_byte_detail(live),
        )
    }
}

/// Parameters of a run, shown before it starts
#[derive(Debug, Clone, Copy)]
pub struct RunHeader<'a> {
    /// Operation name (`save`, `validate`, `restore`, `list`)
    pub operation: &'a str,
    /// Live directory, if the operation touches one
    pub directory: Option<&'a Path>,
    /// Info file read or written
    pub info_file: &'a Path,
    /// Whether subdirectories are processed
    pub recursive: bool,
    /// Selected file properties
    pub file_properties: PropertySet,
    /// Selected directory properties
    pub directory_properties: PropertySet,
    /// Whether hashing uses the async reader
    pub fast_hash: bool,
}

/// Receiver of run events
pub trait Reporter {
    /// A run is about to start
    fn run_started(&mut self, _header: &RunHeader<'_>) {}

    /// An entry was recorded into a new snapshot
    fn entry_saved(&mut self, _path: &RelativePath) {}

    /// A record was visited in list mode
    ///
    /// `properties` is the selection for the record's kind.
    fn entry_listed(&mut self, _path: &RelativePath, _record: EntryRecord<'_>, _properties: PropertySet) {}

    /// A matched pair was compared; `differences` is empty when it is the same
    fn entry_compared(&mut self, _path: &RelativePath, _mode: Mode, _differences: &[Difference]) {}

    /// A live entry has no record
    fn entry_unknown(&mut self, _path: &RelativePath) {}

    /// A record has no live entry
    fn entry_missing(&mut self, _path: &RelativePath) {}

    /// A failure limited to one entry was recovered
    fn entry_failed(&mut self, _path: &RelativePath, _message: &str) {}

    /// Progress of the content hash of `path`
    fn hash_progress(&mut self, _path: &RelativePath, _progress: &HashProgress) {}

    /// The content hash of `path` is complete or failed
    fn hash_finished(&mut self, _path: &RelativePath) {}

    /// The run is complete
    fn run_finished(&mut self, _operation: &str, _stats: &RunStats, _elapsed: Duration) {}
}

/// Reporter that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl Reporter for NoOpReporter {}

/// Reporter that prints to the terminal
///
/// Entry lines go to stdout, recovered failures to stderr.
#[derive(Default)]
pub struct ConsoleReporter {
    hash_bar: Option<ProgressBar>,
    quiet_same: bool,
}

impl ConsoleReporter {
    /// Create a console reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress lines for entries without differences
    pub fn quiet_same(mut self, quiet: bool) -> Self {
        self.quiet_same = quiet;
        self
    }

    fn kind_label(kind: EntryKind) -> &'static str {
        kind.noun()
    }

    fn hash_bar(&mut self, total_length: u64) -> &ProgressBar {
        self.hash_bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(total_length);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} Hash [{bar:30.cyan/blue}] {msg}")
            {
                bar.set_style(style.progress_chars("=> "));
            }
            bar
        })
    }
}

impl Reporter for ConsoleReporter {
    fn run_started(&mut self, header: &RunHeader<'_>) {
        println!("{} {}", "Running".blue().bold(), header.operation.blue().bold());
        if let Some(directory) = header.directory {
            println!("  Directory: {}", directory.display().to_string().cyan());
        }
        println!("  Info file: {}", header.info_file.display().to_string().cyan());
        println!("  Recursive: {}", header.recursive.to_string().cyan());
        println!("  File properties: {}", header.file_properties.to_string().cyan());
        println!("  Directory properties: {}", header.directory_properties.to_string().cyan());
        if header.fast_hash {
            println!("  Fast hash: {}", "true".cyan());
        }
        println!();
    }

    fn entry_saved(&mut self, path: &RelativePath) {
        println!("{} {} {}", "Saved".green(), Self::kind_label(path.kind()), path);
    }

    fn entry_listed(&mut self, path: &RelativePath, record: EntryRecord<'_>, properties: PropertySet) {
        println!("{} {} {}", "Loaded".blue(), Self::kind_label(record.kind()), path);
        for property in properties.iter() {
            let value = match (property, record) {
                (InfoProperty::Size, EntryRecord::File(file)) => file.size.map(format_byte_detail),
                (InfoProperty::Hash, EntryRecord::File(file)) => file.sha512.clone(),
                (InfoProperty::Size | InfoProperty::Hash, EntryRecord::Directory(_)) => continue,
                (time, _) => record.times().get(time).map(str::to_string),
            };
            println!("  {}: {}", property, value.unwrap_or_default().dimmed());
        }
    }

    fn entry_compared(&mut self, path: &RelativePath, mode: Mode, differences: &[Difference]) {
        if differences.is_empty() {
            if !self.quiet_same {
                println!("{} {} {}", "Same".green(), Self::kind_label(path.kind()), path);
            }
            return;
        }

        let verb = if mode == Mode::Restore {
            "Restored".yellow().bold()
        } else {
            "Detected".yellow().bold()
        };
        println!("{} {} {}", verb, Self::kind_label(path.kind()), path);
        for difference in differences {
            println!(
                "  {}: {} -> {}",
                difference.property,
                difference.recorded.cyan(),
                difference.live.yellow()
            );
        }
    }

    fn entry_unknown(&mut self, path: &RelativePath) {
        println!("{} {} {}", "Unknown".magenta().bold(), Self::kind_label(path.kind()), path);
    }

    fn entry_missing(&mut self, path: &RelativePath) {
        println!("{} {} {}", "Missing".red().bold(), Self::kind_label(path.kind()), path);
    }

    fn entry_failed(&mut self, path: &RelativePath, message: &str) {
        let line = format!("{} {}: {}", "Failed".red(), path, message);
        match &self.hash_bar {
            Some(bar) => bar.suspend(|| eprintln!("{}", line)),
            None => eprintln!("{}", line),
        }
    }

    fn hash_progress(&mut self, path: &RelativePath, progress: &HashProgress) {
        let bar = self.hash_bar(progress.total_length);
        bar.set_position(progress.total_read);
        bar.set_message(format!("{} {}", path, describe_progress(progress)));
    }

    fn hash_finished(&mut self, _path: &RelativePath) {
        if let Some(bar) = self.hash_bar.take() {
            bar.finish_and_clear();
        }
    }

    fn run_finished(&mut self, operation: &str, stats: &RunStats, elapsed: Duration) {
        println!();
        let rows: Vec<(&str, KindCounts)> = match operation {
            "save" => vec![("Saved", stats.saved)],
            "list" => vec![("Listed", stats.listed)],
            _ => vec![
                ("Checked", stats.checked),
                ("Same", stats.same),
                ("Changed", stats.changed),
                ("Missing", stats.missing),
                ("Unknown", stats.unknown),
            ],
        };
        for (label, counts) in rows {
            println!("{}", label.bold());
            println!("  File: {}", counts.files.to_string().cyan());
            println!("  Directory: {}", counts.directories.to_string().cyan());
        }

        if stats.has_failures() {
            println!("{}", "Failures".red().bold());
            if stats.enumeration_failed > 0 {
                println!("  Enumeration: {}", stats.enumeration_failed.to_string().red());
            }
            if stats.hash_failed > 0 {
                println!("  Hash: {}", stats.hash_failed.to_string().red());
            }
            if stats.restore_failed > 0 {
                println!("  Restore: {}", stats.restore_failed.to_string().red());
            }
        }

        println!(
            "\n{}",
            format!("Total time: {}", format_duration(round_to_millis(elapsed))).dimmed()
        );
    }
}

fn round_to_millis(elapsed: Duration) -> Duration {
    Duration::from_millis(elapsed.as_millis() as u64)
}

/// One-line description of a hash progress report
///
/// ```rust
/// use treestamp::report::describe_progress;
/// use treestamp::types::HashProgress;
///
/// let line = describe_progress(&HashProgress {
///     total_length: 2048,
///     total_read: 1024,
///     read_since_report: 1024,
///     elapsed_ms: 1000,
/// });
/// assert_eq!(line, "50% (1.00 KB / 2.00 KB), 1.00 KB/s");
/// ```
pub fn describe_progress(progress: &HashProgress) -> String {
    format!(
        "{:.0}% ({} / {}), {}/s",
        progress.percentage(),
        format_bytes(progress.total_read),
        format_bytes(progress.total_length),
        format_bytes(progress.bytes_per_second())
    )
}
