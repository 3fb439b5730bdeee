//! Subtree editing of snapshots
//!
//! Large trees are often recorded piecewise, or a part of a tree is moved
//! elsewhere. The editor moves directory records between info files without
//! touching the live filesystem:
//!
//! - **extract**: copy the record at a relative path into a new snapshot
//! - **graft**: insert a snapshot's root as a subdirectory at a relative path
//! - **prune**: remove the subdirectory at a relative path
//!
//! Relative paths are split on both `/` and `\`; empty segments are ignored,
//! so `a//b/` and `a\b` name the same directory.
//!
//! The pure operations ([`extract`], [`graft`], [`prune`]) work on loaded
//! [`InfoRecord`]s. The file-level wrappers ([`extract_subtree`],
//! [`add_subtree`], [`remove_subtree`]) check every precondition before
//! anything is written.

use crate::error::{Result, TreestampError};
use crate::record::{compare_names, DirectoryRecord, InfoRecord};
use crate::snapshot;
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info};

/// Split a relative path into directory names
///
/// # Example
///
/// ```rust
/// use treestamp::editor::split_relative_path;
///
/// assert_eq!(split_relative_path("a/b\\c/"), vec!["a", "b", "c"]);
/// assert!(split_relative_path("//").is_empty());
/// ```
pub fn split_relative_path(path: &str) -> Vec<String> {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve `segments` below `root`, matching names exactly
///
/// An empty segment list resolves to `root` itself.
pub fn find_directory<'a>(root: &'a DirectoryRecord, segments: &[String]) -> Option<&'a DirectoryRecord> {
    segments
        .iter()
        .try_fold(root, |dir, name| dir.directory(name))
}

fn find_directory_mut<'a>(
    root: &'a mut DirectoryRecord,
    segments: &[String],
) -> Option<&'a mut DirectoryRecord> {
    let mut dir = root;
    for name in segments {
        dir = dir.directory_mut(name)?;
    }
    Some(dir)
}

/// Parent segments and final name of a non-empty relative path
fn split_parent(relative_path: &str) -> Result<(Vec<String>, String)> {
    let mut segments = split_relative_path(relative_path);
    let name = segments.pop().ok_or(TreestampError::EmptyRelativePath)?;
    Ok((segments, name))
}

/// Copy the directory at `relative_path` into a new snapshot stamped now
///
/// A path without segments (such as `/`) extracts the whole tree.
///
/// # Errors
///
/// - [`TreestampError::EmptyRelativePath`] if `relative_path` is empty
/// - [`TreestampError::RelativePathNotFound`] if a segment does not resolve
pub fn extract(base: &InfoRecord, relative_path: &str) -> Result<InfoRecord> {
    if relative_path.is_empty() {
        return Err(TreestampError::EmptyRelativePath);
    }
    let segments = split_relative_path(relative_path);
    let dir = find_directory(&base.directory, &segments)
        .ok_or_else(|| TreestampError::RelativePathNotFound(relative_path.to_string()))?;
    debug!("Extracted {} from the base snapshot", relative_path);
    Ok(InfoRecord::new(dir.clone()))
}

/// Result of a [`graft`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraftOutcome {
    /// Name of the inserted directory
    pub name: String,
    /// Root name of the grafted snapshot before insertion
    pub original_name: String,
    /// Position among the parent's subdirectories
    pub index: usize,
}

impl GraftOutcome {
    /// Whether the grafted root was renamed to fit the relative path
    pub fn renamed(&self) -> bool {
        self.name != self.original_name
    }
}

/// Insert `subtree` as the directory named by `relative_path`
///
/// The last segment of `relative_path` becomes the name of the inserted
/// directory; the segments before it must resolve to an existing record. The
/// new directory is inserted before the first sibling whose name is not
/// less than its own, so sorted lists stay sorted. `base` is re-stamped.
///
/// # Errors
///
/// - [`TreestampError::EmptyRelativePath`] if `relative_path` has no segments
/// - [`TreestampError::RelativePathNotFound`] if the parent does not resolve
/// - [`TreestampError::SubdirectoryExists`] if the parent already has a directory of that name
pub fn graft(base: &mut InfoRecord, relative_path: &str, mut subtree: DirectoryRecord) -> Result<GraftOutcome> {
    let (parent_segments, name) = split_parent(relative_path)?;
    let parent = find_directory_mut(&mut base.directory, &parent_segments)
        .ok_or_else(|| TreestampError::RelativePathNotFound(relative_path.to_string()))?;

    let directories = parent.directories_mut();
    if directories.iter().any(|dir| dir.name == name) {
        return Err(TreestampError::SubdirectoryExists(relative_path.to_string()));
    }

    let original_name = std::mem::replace(&mut subtree.name, name.clone());
    if original_name != name {
        info!("Added directory {:?} is renamed to {:?}", original_name, name);
    }

    let index = directories
        .iter()
        .position(|dir| compare_names(&name, &dir.name) != Ordering::Greater)
        .unwrap_or(directories.len());
    directories.insert(index, subtree);
    base.touch();

    Ok(GraftOutcome {
        name,
        original_name,
        index,
    })
}

/// Remove the directory named by `relative_path` and return it
///
/// `base` is re-stamped.
///
/// # Errors
///
/// - [`TreestampError::EmptyRelativePath`] if `relative_path` has no segments
/// - [`TreestampError::RelativePathNotFound`] if the parent does not resolve
/// - [`TreestampError::SubdirectoryNotFound`] if the parent has no directory of that name
pub fn prune(base: &mut InfoRecord, relative_path: &str) -> Result<DirectoryRecord> {
    let (parent_segments, name) = split_parent(relative_path)?;
    let parent = find_directory_mut(&mut base.directory, &parent_segments)
        .ok_or_else(|| TreestampError::RelativePathNotFound(relative_path.to_string()))?;

    let index = parent
        .directories()
        .iter()
        .position(|dir| dir.name == name)
        .ok_or_else(|| TreestampError::SubdirectoryNotFound(relative_path.to_string()))?;
    let removed = parent.directories_mut().remove(index);
    base.touch();

    debug!("Removed {} from the base snapshot", relative_path);
    Ok(removed)
}

/// Extract a subtree of `base_file` into `sub_file`
///
/// # Errors
///
/// - [`TreestampError::InfoFileNotFound`] if `base_file` does not exist
/// - [`TreestampError::InfoFileExists`] if `sub_file` exists and `overwrite` is false
/// - any error of [`extract`]
///
/// Nothing is written when an error is returned.
pub fn extract_subtree(
    base_file: &Path,
    relative_path: &str,
    sub_file: &Path,
    overwrite: bool,
) -> Result<InfoRecord> {
    if relative_path.is_empty() {
        return Err(TreestampError::EmptyRelativePath);
    }
    if !base_file.exists() {
        return Err(TreestampError::InfoFileNotFound(base_file.to_path_buf()));
    }
    if sub_file.exists() && !overwrite {
        return Err(TreestampError::InfoFileExists(sub_file.to_path_buf()));
    }

    let base = snapshot::load(base_file)?;
    let sub = extract(&base, relative_path)?;
    snapshot::save(sub_file, &sub)?;
    info!("Extracted {} of {:?} into {:?}", relative_path, base_file, sub_file);
    Ok(sub)
}

/// Graft the snapshot in `sub_file` into `base_file` at `relative_path`
///
/// # Errors
///
/// - [`TreestampError::InfoFileNotFound`] if either file does not exist
/// - [`TreestampError::OverwriteRequired`] if `overwrite` is false
/// - any error of [`graft`]
///
/// `base_file` is only rewritten when every check passed.
pub fn add_subtree(
    base_file: &Path,
    relative_path: &str,
    sub_file: &Path,
    overwrite: bool,
) -> Result<GraftOutcome> {
    if relative_path.is_empty() {
        return Err(TreestampError::EmptyRelativePath);
    }
    let mut base = snapshot::load(base_file)?;
    if !overwrite {
        return Err(TreestampError::OverwriteRequired(base_file.to_path_buf()));
    }

    let sub = snapshot::load(sub_file)?;
    let outcome = graft(&mut base, relative_path, sub.directory)?;
    snapshot::save(base_file, &base)?;
    info!("Added {:?} to {:?} at {}", sub_file, base_file, relative_path);
    Ok(outcome)
}

/// Remove the subtree at `relative_path` from `base_file`
///
/// # Errors
///
/// - [`TreestampError::InfoFileNotFound`] if `base_file` does not exist
/// - [`TreestampError::OverwriteRequired`] if `overwrite` is false
/// - any error of [`prune`]
pub fn remove_subtree(base_file: &Path, relative_path: &str, overwrite: bool) -> Result<DirectoryRecord> {
    if relative_path.is_empty() {
        return Err(TreestampError::EmptyRelativePath);
    }
    let mut base = snapshot::load(base_file)?;
    if !overwrite {
        return Err(TreestampError::OverwriteRequired(base_file.to_path_buf()));
    }

    let removed = prune(&mut base, relative_path)?;
    snapshot::save(base_file, &base)?;
    info!("Removed {} from {:?}", relative_path, base_file);
    Ok(removed)
}
