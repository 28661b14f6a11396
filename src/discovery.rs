//! Breadth-first test-file discovery.
//!
//! Files whose names look like test modules (`test_x.rs`, `x_test.rs`, `tests.rs`, ...) are collected
//! level by level from a root directory, alphabetically within a level. Unreadable entries are
//! skipped.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

static TEST_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:tests?_\w+\.rs|\w+_tests?\.rs|tests?\.rs)$").expect("test file pattern")
});

/// Whether `name` is a test module file name.
pub fn is_test_file(name: &str) -> bool {
    TEST_FILE_RE.is_match(name)
}

/// Test files under `root`, shallowest first.
pub fn discover_test_files<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    let mut found: Vec<(usize, PathBuf)> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_str().is_some_and(is_test_file))
        .map(|entry| (entry.depth(), entry.into_path()))
        .collect();
    // Stable: keeps the alphabetical walk order within each depth.
    found.sort_by_key(|(depth, _)| *depth);
    found.into_iter().map(|(_, path)| path).collect()
}

/// Orders registered module paths by where their files were discovered.
///
/// A discovered file matches a registered path when it ends with that path's components, so
/// `./suite/tests/test_math.rs` matches `tests/test_math.rs`. Registered paths without a discovered
/// file are dropped.
pub fn order_by_discovery(registered: &[String], discovered: &[PathBuf]) -> Vec<String> {
    let mut ordered: Vec<String> = Vec::new();
    for file in discovered {
        let file = normalize(file);
        let matched = registered
            .iter()
            .filter(|path| !ordered.contains(*path))
            .find(|path| file.ends_with(normalize(Path::new(path.as_str()))));
        if let Some(path) = matched {
            ordered.push(path.clone());
        }
    }
    ordered
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_pattern() {
        for name in ["test_math.rs", "tests_io.rs", "math_test.rs", "io_tests.rs", "test.rs", "tests.rs"] {
            assert!(is_test_file(name), "{name}");
        }
        for name in ["math.rs", "testing.rs", "test_math.py", "contest.rs", "test_.rs.bak"] {
            assert!(!is_test_file(name), "{name}");
        }
    }

    #[test]
    fn test_order_by_discovery_matches_suffixes() {
        let registered = vec![
            "tests/test_b.rs".to_string(),
            "tests/test_a.rs".to_string(),
            "tests/test_unfound.rs".to_string(),
        ];
        let discovered = vec![
            PathBuf::from("./root/tests/test_a.rs"),
            PathBuf::from("./root/tests/test_other.rs"),
            PathBuf::from("./root/tests/test_b.rs"),
        ];
        assert_eq!(
            order_by_discovery(&registered, &discovered),
            vec!["tests/test_a.rs", "tests/test_b.rs"]
        );
    }
}
