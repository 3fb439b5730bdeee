//! Integration tests for treestamp
//!
//! Drives realistic record / validate / restore / subtree workflows against
//! generated directory trees.

use ::treestamp::report::Difference;
use ::treestamp::*;
use filetime::FileTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// A generated tree next to its default info file
pub struct TreeHarness {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub info_file: PathBuf,
    pub files: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
    rng: StdRng,
}

/// Shape of a generated tree
#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub dirs_per_level: usize,
    pub files_per_dir: usize,
    pub file_size_range: std::ops::Range<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            dirs_per_level: 2,
            files_per_dir: 3,
            file_size_range: 16..512,
        }
    }
}

impl TreeHarness {
    /// Create a harness with an empty root directory named `tree`
    pub fn new(seed: u64) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("tree");
        fs::create_dir(&root).unwrap();
        let info_file = record::default_info_file(&root).unwrap();

        Self {
            temp_dir,
            root,
            info_file,
            files: Vec::new(),
            directories: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Populate the root with random content
    pub fn generate(&mut self, config: &TreeConfig) {
        let root = self.root.clone();
        self.generate_level(&root, config, 0);
        info!(
            "Generated {} files in {} directories",
            self.files.len(),
            self.directories.len()
        );
    }

    fn generate_level(&mut self, dir: &Path, config: &TreeConfig, depth: usize) {
        for i in 0..config.files_per_dir {
            let path = dir.join(format!("file_{}.dat", i));
            let size = self.rng.random_range(config.file_size_range.clone());
            let content: Vec<u8> = (0..size).map(|_| self.rng.random()).collect();
            fs::write(&path, content).unwrap();
            self.files.push(path);
        }

        if depth < config.max_depth {
            for i in 0..config.dirs_per_level {
                let sub = dir.join(format!("dir_{}", i));
                fs::create_dir(&sub).unwrap();
                self.directories.push(sub.clone());
                self.generate_level(&sub, config, depth + 1);
            }
        }
    }

    /// Record the tree with the given file properties
    pub fn save(&self, file_properties: PropertySet) -> RunStats {
        RecorderBuilder::new()
            .recursive(true)
            .file_properties(file_properties)
            .build()
            .save(&self.root, &self.info_file, true, &mut NoOpReporter)
            .unwrap()
    }

    /// Validate recursively, ignoring directory timestamps
    pub fn validate(&self, file_properties: PropertySet) -> RunStats {
        ReconcilerBuilder::new(Mode::Validate)
            .recursive(true)
            .file_properties(file_properties)
            .directory_properties(PropertySet::empty())
            .build()
            .run(&self.root, &self.info_file, &mut NoOpReporter)
            .unwrap()
    }

    /// Set the modification time of every generated file
    pub fn touch_all(&self, seconds: i64) {
        let time = FileTime::from_unix_time(seconds, 0);
        for file in &self.files {
            filetime::set_file_mtime(file, time).unwrap();
        }
    }
}

/// Collects every event for assertions
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub compared: Vec<(String, Vec<Difference>)>,
    pub unknown: Vec<String>,
    pub missing: Vec<String>,
    pub failed: Vec<String>,
    pub listed: Vec<String>,
}

impl Reporter for RecordingReporter {
    fn entry_listed(&mut self, path: &RelativePath, _record: EntryRecord<'_>, _properties: PropertySet) {
        self.listed.push(path.to_string());
    }

    fn entry_compared(&mut self, path: &RelativePath, _mode: Mode, differences: &[Difference]) {
        self.compared.push((path.to_string(), differences.to_vec()));
    }

    fn entry_unknown(&mut self, path: &RelativePath) {
        self.unknown.push(path.to_string());
    }

    fn entry_missing(&mut self, path: &RelativePath) {
        self.missing.push(path.to_string());
    }

    fn entry_failed(&mut self, path: &RelativePath, _message: &str) {
        self.failed.push(path.to_string());
    }
}

fn times_and_size() -> PropertySet {
    PropertySet::from_iter([InfoProperty::LastWriteTime, InfoProperty::Size])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_generated_tree_round_trip() {
        let mut harness = TreeHarness::new(7);
        harness.generate(&TreeConfig::default());

        let saved = harness.save(times_and_size());
        assert_eq!(saved.saved.files, harness.files.len());
        assert_eq!(saved.saved.directories, harness.directories.len() + 1);

        let stats = harness.validate(times_and_size());
        assert!(stats.is_clean(), "{:?}", stats);
        assert_eq!(stats.checked.files, harness.files.len());
        assert_eq!(stats.same.files, harness.files.len());
        assert!(logs_contain("Recorded"));
    }

    #[test]
    fn test_snapshot_layout() {
        let mut harness = TreeHarness::new(1);
        harness.generate(&TreeConfig {
            max_depth: 1,
            dirs_per_level: 1,
            files_per_dir: 1,
            file_size_range: 3..4,
        });
        harness.save(PropertySet::all());

        let json = fs::read_to_string(&harness.info_file).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["RecordTimeUtc"].as_str().unwrap().ends_with('Z'));
        assert!(value["RecordTimeUtcTicks"].as_i64().unwrap() > timestamp::UNIX_EPOCH_TICKS);

        let root = &value["Directory"];
        assert_eq!(root["Name"], "tree");
        let file = &root["Files"][0];
        assert_eq!(file["Name"], "file_0.dat");
        assert_eq!(file["Size"], 3);
        assert_eq!(file["sha512"].as_str().unwrap().len(), 128);
        assert!(file["LastWriteTimeUtc"].is_string());
        assert!(file["LastWriteTimeUtcTicks"].is_i64());
        assert!(file.get("ComputeHashFailed").is_none());
        assert_eq!(root["Directories"][0]["Name"], "dir_0");
        // Directories never carry size or hash
        assert!(root["Directories"][0].get("Size").is_none());
    }

    #[test]
    fn test_content_change_detected_by_hash_only() {
        let mut harness = TreeHarness::new(11);
        harness.generate(&TreeConfig::default());
        harness.touch_all(1_600_000_000);
        harness.save(PropertySet::all());

        // Same length, different content, same mtime
        let target = harness.files[0].clone();
        let mut content = fs::read(&target).unwrap();
        content[0] = content[0].wrapping_add(1);
        fs::write(&target, &content).unwrap();
        filetime::set_file_mtime(&target, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

        let without_hash = harness.validate(times_and_size());
        assert!(without_hash.is_clean(), "{:?}", without_hash);

        let with_hash = harness.validate(PropertySet::from_iter([InfoProperty::Hash]));
        assert_eq!(with_hash.changed.files, 1);
        assert_eq!(with_hash.hash_failed, 0);
    }

    #[test]
    fn test_fast_hash_agrees_with_sync_hash() {
        let mut harness = TreeHarness::new(3);
        harness.generate(&TreeConfig {
            file_size_range: 4096..20_000,
            ..TreeConfig::default()
        });
        harness.save(PropertySet::from_iter([InfoProperty::Hash]));

        let stats = ReconcilerBuilder::new(Mode::Validate)
            .recursive(true)
            .file_properties(PropertySet::from_iter([InfoProperty::Hash]))
            .directory_properties(PropertySet::empty())
            .fast_hash(true)
            .build()
            .run(&harness.root, &harness.info_file, &mut NoOpReporter)
            .unwrap();
        assert!(stats.is_clean(), "{:?}", stats);
        assert_eq!(stats.checked.files, harness.files.len());
    }

    #[test]
    fn test_missing_and_unknown_are_symmetric() {
        let mut harness = TreeHarness::new(5);
        harness.generate(&TreeConfig {
            max_depth: 1,
            dirs_per_level: 2,
            files_per_dir: 2,
            file_size_range: 8..16,
        });
        harness.save(times_and_size());

        // Deleting dir_0 makes it and its two files missing
        fs::remove_dir_all(harness.root.join("dir_0")).unwrap();
        fs::remove_file(harness.root.join("file_1.dat")).unwrap();
        let mut reporter = RecordingReporter::default();
        let stats = ReconcilerBuilder::new(Mode::Validate)
            .recursive(true)
            .directory_properties(PropertySet::empty())
            .build()
            .run(&harness.root, &harness.info_file, &mut reporter)
            .unwrap();
        assert_eq!(stats.missing.directories, 1);
        assert_eq!(stats.missing.files, 3);
        assert!(reporter.missing.contains(&"dir_0/".to_string()));
        assert!(reporter.missing.contains(&"file_1.dat".to_string()));

        // Recording the smaller tree and recreating the content flips the roles
        harness.save(times_and_size());
        fs::create_dir(harness.root.join("dir_0")).unwrap();
        fs::write(harness.root.join("dir_0").join("a.txt"), "a").unwrap();
        fs::write(harness.root.join("dir_0").join("b.txt"), "b").unwrap();
        fs::write(harness.root.join("file_1.dat"), "again").unwrap();

        let mut reporter = RecordingReporter::default();
        let stats = ReconcilerBuilder::new(Mode::Validate)
            .recursive(true)
            .directory_properties(PropertySet::empty())
            .build()
            .run(&harness.root, &harness.info_file, &mut reporter)
            .unwrap();
        assert_eq!(stats.unknown.directories, 1);
        assert_eq!(stats.unknown.files, 3);
        assert!(reporter.unknown.contains(&"dir_0/".to_string()));
        assert!(reporter.unknown.contains(&"file_1.dat".to_string()));
        assert_eq!(stats.missing.total(), 0);
    }

    #[test]
    fn test_restore_is_idempotent() {
        let mut harness = TreeHarness::new(9);
        harness.generate(&TreeConfig::default());
        harness.touch_all(1_500_000_000);
        harness.save(times_and_size());
        harness.touch_all(1_700_000_000);

        let restorer = ReconcilerBuilder::new(Mode::Restore)
            .recursive(true)
            .file_properties(PropertySet::from_iter([InfoProperty::LastWriteTime]))
            .directory_properties(PropertySet::empty())
            .build();

        let mut reporter = RecordingReporter::default();
        let first = restorer.run(&harness.root, &harness.info_file, &mut reporter).unwrap();
        assert_eq!(first.changed.files, harness.files.len());
        assert_eq!(first.restore_failed, 0);
        let (_, differences) = &reporter.compared[0];
        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0].property, InfoProperty::LastWriteTime);

        let second = restorer.run(&harness.root, &harness.info_file, &mut NoOpReporter).unwrap();
        assert_eq!(second.changed.total(), 0);
        assert_eq!(second.same.files, harness.files.len());

        for file in &harness.files {
            let mtime = FileTime::from_last_modification_time(&fs::metadata(file).unwrap());
            assert_eq!(mtime.unix_seconds(), 1_500_000_000);
        }
    }

    #[test]
    fn test_validate_is_idempotent() {
        let mut harness = TreeHarness::new(13);
        harness.generate(&TreeConfig::default());
        let properties = PropertySet::from_iter([
            InfoProperty::LastWriteTime,
            InfoProperty::Size,
            InfoProperty::Hash,
        ]);
        harness.save(properties);

        // One changed, one missing and one unknown file
        fs::write(harness.root.join("dir_0").join("file_0.dat"), "rewritten").unwrap();
        fs::remove_file(harness.root.join("file_1.dat")).unwrap();
        fs::write(harness.root.join("dir_1").join("extra.txt"), "new").unwrap();

        let validator = ReconcilerBuilder::new(Mode::Validate)
            .recursive(true)
            .file_properties(properties)
            .directory_properties(PropertySet::empty())
            .build();

        let mut first_events = RecordingReporter::default();
        let first = validator.run(&harness.root, &harness.info_file, &mut first_events).unwrap();
        assert_eq!(first.changed.files, 1);
        assert_eq!(first.missing.files, 1);
        assert_eq!(first.unknown.files, 1);

        let mut second_events = RecordingReporter::default();
        let second = validator.run(&harness.root, &harness.info_file, &mut second_events).unwrap();
        assert_eq!(first, second);
        assert_eq!(first_events.missing, second_events.missing);
        assert_eq!(first_events.unknown, second_events.unknown);
        let paths = |events: &RecordingReporter| -> Vec<(String, usize)> {
            events
                .compared
                .iter()
                .map(|(path, differences)| (path.clone(), differences.len()))
                .collect()
        };
        assert_eq!(paths(&first_events), paths(&second_events));
    }

    #[test]
    fn test_restore_does_not_touch_contents() {
        let mut harness = TreeHarness::new(21);
        harness.generate(&TreeConfig::default());
        harness.save(PropertySet::all());
        let before: Vec<Vec<u8>> = harness.files.iter().map(|f| fs::read(f).unwrap()).collect();

        harness.touch_all(1_234_567_890);
        ReconcilerBuilder::new(Mode::Restore)
            .recursive(true)
            .build()
            .run(&harness.root, &harness.info_file, &mut NoOpReporter)
            .unwrap();

        let after: Vec<Vec<u8>> = harness.files.iter().map(|f| fs::read(f).unwrap()).collect();
        assert_eq!(before, after);
        let stats = harness.validate(PropertySet::from_iter([
            InfoProperty::LastWriteTime,
            InfoProperty::Size,
            InfoProperty::Hash,
        ]));
        assert!(stats.is_clean(), "{:?}", stats);
    }

    #[test]
    fn test_unrecorded_properties_are_not_compared() {
        let mut harness = TreeHarness::new(13);
        harness.generate(&TreeConfig::default());
        harness.save(PropertySet::from_iter([InfoProperty::Size]));
        harness.touch_all(1_000_000_000);

        // Time was never recorded, so touching files changes nothing
        let stats = harness.validate(times_and_size());
        assert!(stats.is_clean(), "{:?}", stats);

        // Growing a file is a size difference
        fs::write(&harness.files[0], vec![0u8; 4096]).unwrap();
        let mut reporter = RecordingReporter::default();
        let stats = ReconcilerBuilder::new(Mode::Validate)
            .recursive(true)
            .directory_properties(PropertySet::empty())
            .build()
            .run(&harness.root, &harness.info_file, &mut reporter)
            .unwrap();
        assert_eq!(stats.changed.files, 1);
        let differences: Vec<&Difference> = reporter
            .compared
            .iter()
            .flat_map(|(_, differences)| differences)
            .collect();
        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0].property, InfoProperty::Size);
        assert!(differences[0].live.contains("4,096 bytes"));
    }

    #[test]
    fn test_non_recursive_ignores_subdirectories() {
        let mut harness = TreeHarness::new(17);
        harness.generate(&TreeConfig::default());
        RecorderBuilder::new()
            .build()
            .save(&harness.root, &harness.info_file, true, &mut NoOpReporter)
            .unwrap();

        let record = snapshot::load(&harness.info_file).unwrap();
        assert!(record.directory.directories.is_none());
        assert_eq!(record.directory.files().len(), 3);

        fs::remove_dir_all(harness.root.join("dir_1")).unwrap();
        let stats = ReconcilerBuilder::new(Mode::Validate)
            .directory_properties(PropertySet::empty())
            .build()
            .run(&harness.root, &harness.info_file, &mut NoOpReporter)
            .unwrap();
        assert!(stats.is_clean(), "{:?}", stats);
        assert_eq!(stats.checked.directories, 1);
    }

    #[test]
    fn test_list_visits_children_before_parent() {
        let mut harness = TreeHarness::new(19);
        harness.generate(&TreeConfig {
            max_depth: 1,
            dirs_per_level: 1,
            files_per_dir: 1,
            file_size_range: 1..2,
        });
        harness.save(times_and_size());

        let mut reporter = RecordingReporter::default();
        let stats = ReconcilerBuilder::new(Mode::List)
            .recursive(true)
            .build()
            .run(Path::new("unused"), &harness.info_file, &mut reporter)
            .unwrap();

        assert_eq!(
            reporter.listed,
            vec!["dir_0/file_0.dat", "dir_0/", "file_0.dat", "/"]
        );
        assert_eq!(stats.listed.files, 2);
        assert_eq!(stats.listed.directories, 2);
    }

    #[test]
    #[traced_test]
    fn test_graft_under_other_name_is_logged() {
        let mut harness = TreeHarness::new(23);
        harness.generate(&TreeConfig::default());
        harness.save(times_and_size());

        let sub_file = harness.temp_dir.path().join("sub_Info.json");
        let extracted = editor::extract_subtree(&harness.info_file, "dir_0", &sub_file, false).unwrap();
        assert_eq!(extracted.directory.name, "dir_0");

        let outcome = editor::add_subtree(&harness.info_file, "dir_1/copy", &sub_file, true).unwrap();
        assert!(outcome.renamed());
        assert_eq!(outcome.original_name, "dir_0");
        assert_eq!(outcome.name, "copy");
        assert!(logs_contain("renamed"));

        let merged = snapshot::load(&harness.info_file).unwrap();
        let copy = editor::find_directory(
            &merged.directory,
            &editor::split_relative_path("dir_1\\copy"),
        )
        .unwrap();
        assert_eq!(copy.files(), extracted.directory.files());
        let names: Vec<&str> = merged
            .directory
            .directory("dir_1")
            .unwrap()
            .directories()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["copy", "dir_0", "dir_1"]);
    }

    #[test]
    fn test_subtree_operations_need_overwrite() {
        let mut harness = TreeHarness::new(29);
        harness.generate(&TreeConfig::default());
        harness.save(times_and_size());
        let original = fs::read_to_string(&harness.info_file).unwrap();

        let err = editor::remove_subtree(&harness.info_file, "dir_0", false).unwrap_err();
        assert!(matches!(err, TreestampError::OverwriteRequired(_)));

        let err = editor::remove_subtree(&harness.info_file, "", true).unwrap_err();
        assert!(matches!(err, TreestampError::EmptyRelativePath));

        let err = editor::remove_subtree(&harness.info_file, "nope/dir_0", true).unwrap_err();
        assert!(matches!(err, TreestampError::RelativePathNotFound(_)));

        let err = editor::remove_subtree(&harness.info_file, "dir_0/nope", true).unwrap_err();
        assert!(matches!(err, TreestampError::SubdirectoryNotFound(_)));

        let sub_file = harness.temp_dir.path().join("sub_Info.json");
        editor::extract_subtree(&harness.info_file, "dir_0", &sub_file, false).unwrap();
        let err = editor::extract_subtree(&harness.info_file, "dir_1", &sub_file, false).unwrap_err();
        assert!(matches!(err, TreestampError::InfoFileExists(_)));

        let err = editor::add_subtree(&harness.info_file, "dir_0", &sub_file, true).unwrap_err();
        assert!(matches!(err, TreestampError::SubdirectoryExists(_)));

        // None of the failures rewrote the base
        assert_eq!(fs::read_to_string(&harness.info_file).unwrap(), original);
    }

    #[test]
    fn test_extract_whole_tree_with_separator_only() {
        let mut harness = TreeHarness::new(31);
        harness.generate(&TreeConfig::default());
        harness.save(times_and_size());
        let base = snapshot::load(&harness.info_file).unwrap();

        let sub_file = harness.temp_dir.path().join("all_Info.json");
        let whole = editor::extract_subtree(&harness.info_file, "/", &sub_file, false).unwrap();
        assert_eq!(whole.directory, base.directory);
    }
}
