//! Property-based testing for treestamp
//!
//! Uses proptest to verify invariants of the snapshot model, the subtree
//! editor and timestamp encoding across randomly generated inputs.

use ::treestamp::*;
use chrono::{DateTime, Utc};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;

/// Generate entry names, including characters that sort before and after letters
fn name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(|s| s),
        "[A-Z][a-z]{0,6}".prop_map(|s| s),
        "[a-z]{1,4}[0-9]{1,3}\\.(txt|md|rs)".prop_map(|s| s),
        "_[a-z0-9]{1,5}".prop_map(|s| s),
    ]
}

/// Generate a set of distinct sibling names
fn sibling_names_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(name_strategy(), 0..12)
}

/// Generate a UTC time with tick precision
fn time_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..8_000_000_000, 0u32..10_000_000).prop_map(|(seconds, ticks)| {
        DateTime::from_timestamp(seconds, ticks * 100).unwrap()
    })
}

/// A directory record whose subdirectories carry the given names, sorted
fn directory_with_children(names: &BTreeSet<String>) -> DirectoryRecord {
    let mut root = DirectoryRecord::new("root");
    let mut children: Vec<DirectoryRecord> = names
        .iter()
        .map(|name| {
            let mut child = DirectoryRecord::new(name.clone());
            child.files = Some(vec![FileRecord::new(format!("{}.bin", name))]);
            child.directories = Some(Vec::new());
            child
        })
        .collect();
    record::sort_directories(&mut children);
    root.directories = Some(children);
    root.files = Some(Vec::new());
    root
}

fn is_sorted(names: &[&str]) -> bool {
    names
        .windows(2)
        .all(|pair| record::compare_names(pair[0], pair[1]) != std::cmp::Ordering::Greater)
}

proptest! {
    #[test]
    fn prop_ticks_round_trip(time in time_strategy()) {
        let ticks = timestamp::to_ticks(&time).unwrap();
        prop_assert!(ticks >= timestamp::UNIX_EPOCH_TICKS);
        prop_assert_eq!(timestamp::from_ticks(ticks), Some(time));
    }

    #[test]
    fn prop_formatted_time_parses_back(time in time_strategy()) {
        let text = timestamp::format(&time);
        prop_assert!(text.ends_with('Z'));
        prop_assert_eq!(text.len(), "2023-10-26T08:15:42.1234567Z".len());
        prop_assert_eq!(timestamp::parse(&text).unwrap(), time);
    }

    #[test]
    fn prop_string_order_follows_time_order(a in time_strategy(), b in time_strategy()) {
        // Equal strings exactly when equal ticks
        let same_text = timestamp::format(&a) == timestamp::format(&b);
        let same_ticks = timestamp::to_ticks(&a) == timestamp::to_ticks(&b);
        prop_assert_eq!(same_text, same_ticks);
    }

    #[test]
    fn prop_split_relative_path_ignores_separators(
        segments in prop::collection::vec(name_strategy(), 0..6),
        separators in prop::collection::vec(prop_oneof![Just("/"), Just("\\"), Just("//"), Just("\\/")], 6),
        leading in any::<bool>(),
        trailing in any::<bool>(),
    ) {
        let mut path = String::new();
        if leading {
            path.push('/');
        }
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                path.push_str(separators[i]);
            }
            path.push_str(segment);
        }
        if trailing {
            path.push('\\');
        }

        prop_assert_eq!(editor::split_relative_path(&path), segments);
    }

    #[test]
    fn prop_sort_orders_by_bytes(names in prop::collection::vec(name_strategy(), 0..20)) {
        let mut files: Vec<FileRecord> = names.iter().map(|n| FileRecord::new(n.clone())).collect();
        record::sort_files(&mut files);

        let sorted: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        prop_assert!(is_sorted(&sorted));
        prop_assert_eq!(sorted.len(), names.len());
    }

    #[test]
    fn prop_graft_keeps_siblings_sorted(
        names in sibling_names_strategy(),
        new_name in name_strategy(),
    ) {
        prop_assume!(!names.contains(&new_name));
        let mut base = InfoRecord::new(directory_with_children(&names));

        let mut subtree = DirectoryRecord::new("incoming-root");
        subtree.files = Some(vec![FileRecord::new("payload")]);
        let outcome = editor::graft(&mut base, &new_name, subtree).unwrap();

        let siblings: Vec<&str> = base
            .directory
            .directories()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        prop_assert!(is_sorted(&siblings));
        prop_assert_eq!(siblings.len(), names.len() + 1);
        prop_assert_eq!(siblings[outcome.index], new_name.as_str());
        prop_assert!(outcome.renamed());
    }

    #[test]
    fn prop_graft_then_prune_restores_base(
        names in sibling_names_strategy(),
        new_name in name_strategy(),
    ) {
        prop_assume!(!names.contains(&new_name));
        let original = directory_with_children(&names);
        let mut base = InfoRecord::new(original.clone());

        let mut subtree = DirectoryRecord::new(new_name.clone());
        subtree.files = Some(vec![FileRecord::new("payload")]);
        editor::graft(&mut base, &new_name, subtree.clone()).unwrap();
        let removed = editor::prune(&mut base, &new_name).unwrap();

        prop_assert_eq!(removed, subtree);
        prop_assert_eq!(base.directory, original);
    }

    #[test]
    fn prop_extract_is_a_copy(names in sibling_names_strategy()) {
        prop_assume!(!names.is_empty());
        let base = InfoRecord::new(directory_with_children(&names));

        for name in &names {
            let sub = editor::extract(&base, name).unwrap();
            prop_assert_eq!(&sub.directory.name, name);
            prop_assert_eq!(Some(&sub.directory), base.directory.directory(name));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_recorded_tree_validates_clean(
        files in prop::collection::btree_map(
            name_strategy(),
            prop::collection::vec(any::<u8>(), 0..2048),
            1..10,
        ),
    ) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("prop");
        fs::create_dir_all(root.join("nested dir")).unwrap();
        for (name, content) in &files {
            fs::write(root.join(name), content).unwrap();
            fs::write(root.join("nested dir").join(name), content).unwrap();
        }

        let info_file = record::default_info_file(&root).unwrap();
        let properties = PropertySet::from_iter([
            InfoProperty::LastWriteTime,
            InfoProperty::Size,
            InfoProperty::Hash,
        ]);
        let saved = RecorderBuilder::new()
            .recursive(true)
            .file_properties(properties)
            .build()
            .save(&root, &info_file, false, &mut NoOpReporter)
            .unwrap();
        prop_assert_eq!(saved.saved.files, files.len() * 2);

        let stats = ReconcilerBuilder::new(Mode::Validate)
            .recursive(true)
            .file_properties(properties)
            .directory_properties(PropertySet::empty())
            .build()
            .run(&root, &info_file, &mut NoOpReporter)
            .unwrap();
        prop_assert!(stats.is_clean(), "{:?}", stats);
        prop_assert_eq!(stats.checked.files, files.len() * 2);
        prop_assert_eq!(stats.hash_failed, 0);
    }
}
