//! # treestamp - Directory metadata snapshots
//!
//! Record the timestamps, sizes and content hashes of a directory tree into a
//! JSON "info file", then later validate the live tree against it or restore
//! the recorded timestamps.
//!
//! ## Overview
//!
//! treestamp walks two trees in parallel, the live filesystem and a persisted
//! snapshot, matches entries by name and classifies each one:
//!
//! - **same**: every compared property matches
//! - **changed**: at least one compared property differs
//! - **missing**: recorded but no longer on disk
//! - **unknown**: on disk but never recorded
//!
//! In restore mode differing timestamps are written back to disk. Snapshots
//! can also be split and merged: a subtree can be extracted into its own info
//! file, grafted into another one, or pruned.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use treestamp::{NoOpReporter, ReconcilerBuilder, RecorderBuilder};
//! use treestamp::types::Mode;
//!
//! # fn main() -> treestamp::Result<()> {
//! let dir = Path::new("./photos");
//! let info_file = treestamp::record::default_info_file(dir)?;
//!
//! // Record the tree
//! RecorderBuilder::new()
//!     .recursive(true)
//!     .build()
//!     .save(dir, &info_file, false, &mut NoOpReporter)?;
//!
//! // ... later, after files were copied around ...
//!
//! // Put the original timestamps back
//! let stats = ReconcilerBuilder::new(Mode::Restore)
//!     .recursive(true)
//!     .build()
//!     .run(dir, &info_file, &mut NoOpReporter)?;
//! println!("Restored {} files", stats.changed.files);
//! # Ok(())
//! # }
//! ```
//!
//! ## Properties
//!
//! | Property | Files | Directories | Restorable |
//! | --- | --- | --- | --- |
//! | creation time | yes | yes | Windows only |
//! | last write time | yes | yes | yes |
//! | last access time | yes | yes | yes |
//! | size | yes | no | no |
//! | SHA-512 hash | yes | no | no |
//!
//! Timestamps are stored with 100 ns precision as ISO-8601 strings together
//! with their tick count.
//!
//! ## Error Handling
//!
//! Operations return `Result<T, TreestampError>`. Only failed preconditions
//! (missing directory, missing or invalid info file, unresolved relative
//! path, overwrite not granted) abort an operation. Failures limited to one
//! entry are logged with `tracing`, passed to the [`Reporter`] and counted in
//! [`RunStats`].
//!
//! ## Module Organization
//!
//! - [`recorder`]: Recording live trees into snapshots
//! - [`reconciler`]: Validate, restore and list
//! - [`editor`]: Extract, graft and prune subtrees
//! - [`record`]: The snapshot data model
//! - [`snapshot`]: Info file load and save
//! - [`report`]: Per-entry event reporting
//! - [`hasher`]: Streaming SHA-512
//! - [`walk`]: Live filesystem access
//! - [`timestamp`]: Timestamp formatting and ticks
//! - [`types`]: Common types and data structures
//! - [`error`]: Error types and handling

// Public API modules
pub mod editor;
pub mod error;
pub mod hasher;
pub mod reconciler;
pub mod record;
pub mod recorder;
pub mod report;
pub mod snapshot;
pub mod timestamp;
pub mod types;
pub mod utils;
pub mod walk;

// Re-export main types for convenience
pub use editor::GraftOutcome;
pub use error::{Result, TreestampError};
pub use reconciler::{Reconciler, ReconcilerBuilder};
pub use record::{DirectoryRecord, EntryRecord, FileRecord, InfoRecord};
pub use recorder::{Recorder, RecorderBuilder};
pub use report::{ConsoleReporter, NoOpReporter, Reporter};
pub use types::*;
