// Drives the `demo` harness binary end to end.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

fn demo() -> Command {
    let mut cmd = Command::cargo_bin("demo").unwrap();
    cmd.env_remove("MICROTEST_ENTRYPOINT")
        .env_remove("COLUMNS")
        .env("MICROTEST_LOG", "off");
    cmd
}

#[test]
fn smoke_group_passes() {
    demo()
        .args(["--include-group", "smoke"])
        .assert()
        .success()
        .stdout(contains("Started testing..."))
        .stdout(contains("tests/test_store.rs"))
        .stdout(contains("test_store::starts_clean"))
        .stdout(contains("Ran 5 tests in"))
        .stdout(contains("OK."));
}

#[test]
fn full_run_reports_failures_and_errors() {
    demo()
        .assert()
        .code(1)
        .stdout(contains("test_math::fails_on_purpose"))
        .stdout(contains("AssertionError on line"))
        .stdout(contains("assert 2 == 1"))
        .stdout(contains("assert 2 == 3"))
        .stdout(contains("ParseIntError: invalid digit found in string"))
        .stdout(contains("Undefined resource \"db_conn\""))
        .stdout(contains("Ran 9 tests in"))
        .stdout(contains("ERRORS: 2\nFAILED: 2"));
}

#[test]
fn ci_entrypoint_excludes_broken_tests() {
    demo()
        .args(["--entrypoint", "ci"])
        .assert()
        .success()
        .stdout(contains("fails_on_purpose").not());

    demo()
        .env("MICROTEST_ENTRYPOINT", "ci")
        .assert()
        .success();
}

#[test]
fn unknown_entrypoint_is_a_configuration_error() {
    demo()
        .args(["--entrypoint", "nightly"])
        .assert()
        .code(2)
        .stderr(contains("unknown entrypoint 'nightly'"))
        .stderr(contains("main, ci"));
}

#[test]
fn included_module_wins_over_excluded() {
    demo()
        .args([
            "--include-module",
            "test_store",
            "--exclude-module",
            "test_store",
        ])
        .assert()
        .success()
        .stdout(contains("test_store::inserts"))
        .stdout(contains("test_math").not())
        .stdout(contains("Ran 2 tests in"));
}

#[test]
fn minimal_output_only_shows_problems() {
    demo()
        .args(["--output", "minimal", "--exclude-group", "smoke"])
        .assert()
        .code(1)
        .stdout(contains("Started testing").not())
        .stdout(contains("test_math::adds").not())
        .stdout(contains("test_math::errors_on_purpose"));
}

#[test]
fn json_output_emits_events() {
    demo()
        .args(["--json", "--include-group", "smoke"])
        .assert()
        .success()
        .stdout(contains(r#"{"event":"start"}"#))
        .stdout(contains(r#""event":"results","tests":5,"failed":0,"errors":0"#))
        .stdout(contains(r#"{"event":"terminate"}"#));
}

#[test]
fn config_file_and_flags_combine() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("run.yaml");
    fs::write(&config, "exclude_groups: [broken]\noutput: minimal\n").unwrap();

    demo()
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("Ran 5 tests in"));

    fs::write(&config, "exclude_group: [broken]\n").unwrap();
    demo()
        .arg("--config")
        .arg(&config)
        .assert()
        .code(2)
        .stderr(contains("microtest::config::invalid"));
}

#[test]
fn root_discovery_orders_and_limits_modules() {
    let dir = tempfile::tempdir().unwrap();
    let tests = dir.path().join("tests");
    fs::create_dir_all(tests.join("nested")).unwrap();
    fs::write(tests.join("test_store.rs"), "").unwrap();
    fs::write(tests.join("test_resources.rs"), "").unwrap();

    demo()
        .arg("--root")
        .arg(dir.path())
        .arg("--exclude-group")
        .arg("broken")
        .assert()
        .success()
        .stdout(contains("test_math").not())
        .stdout(contains("Ran 3 tests in"));
}

#[test]
fn invalid_output_mode_is_rejected() {
    demo()
        .args(["--output", "loud"])
        .assert()
        .failure()
        .stderr(contains("invalid value").or(contains("possible values")));
}
