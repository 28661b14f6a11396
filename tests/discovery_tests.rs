use std::fs;
use std::path::Path;

use microtest::discovery::{discover_test_files, order_by_discovery};

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "").unwrap();
}

#[test]
fn discovery_is_breadth_first_and_alphabetical() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    for file in [
        "a/deep/test_deep.rs",
        "b/test_b.rs",
        "a/test_a.rs",
        "tests.rs",
        "z_test.rs",
        "helpers.rs",
        "a/notes.txt",
    ] {
        touch(&root.join(file));
    }

    let found: Vec<String> = discover_test_files(root)
        .iter()
        .map(|path| {
            path.strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    assert_eq!(
        found,
        vec!["tests.rs", "z_test.rs", "a/test_a.rs", "b/test_b.rs", "a/deep/test_deep.rs"]
    );
}

#[test]
fn missing_root_yields_nothing() {
    assert!(discover_test_files("/definitely/not/a/dir").is_empty());
}

#[test]
fn registered_modules_follow_discovered_order() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("suite/test_second.rs"));
    touch(&dir.path().join("test_first.rs"));

    let registered = vec![
        "suite/test_second.rs".to_string(),
        "./test_first.rs".to_string(),
    ];
    let order = order_by_discovery(&registered, &discover_test_files(dir.path()));
    assert_eq!(order, vec!["./test_first.rs", "suite/test_second.rs"]);
}
