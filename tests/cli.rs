use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn params_file(json: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp params");
    tmp.write_all(json.as_bytes()).expect("write params");
    tmp
}

fn studio() -> Command {
    Command::cargo_bin("galaxy-studio").expect("binary exists")
}

#[test]
fn summary_reports_default_generation() {
    let mut cmd = studio();
    cmd.args(["--summary-only", "--seed", "7"]);
    cmd.assert()
        .success()
        .stdout(contains(
            "Galaxy parameters: 100000 points, radius 4.0, 6 branches, colors #ff6030 -> #1b3984",
        ))
        .stdout(contains("Galaxy: 100000 points"))
        .stdout(contains("Starfield: 20000 points across a 350 unit cube"));
}

#[test]
fn seeded_summaries_are_reproducible() {
    let run = || {
        let mut cmd = studio();
        cmd.args(["--summary-only", "--seed", "42"]);
        cmd.output().expect("run binary")
    };
    let first = run();
    let second = run();
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn params_file_overrides_defaults() {
    let file = params_file(r##"{"count": 5000, "branch_count": 3, "inside_color": "#ffffff"}"##);
    let mut cmd = studio();
    cmd.args(["--summary-only", "--seed", "1", "--params"])
        .arg(file.path());
    cmd.assert()
        .success()
        .stdout(contains("Galaxy parameters: 5000 points"))
        .stdout(contains("3 branches"))
        .stdout(contains("colors #ffffff -> #1b3984"))
        .stdout(contains("Galaxy: 5000 points"));
}

#[test]
fn rejects_out_of_range_params() {
    let file = params_file(r#"{"spin": 9.0}"#);
    let mut cmd = studio();
    cmd.args(["--summary-only", "--params"]).arg(file.path());
    cmd.assert()
        .failure()
        .stderr(contains("spin must be in -5..=5, got 9"));
}

#[test]
fn rejects_malformed_json() {
    let file = params_file("{not json");
    let mut cmd = studio();
    cmd.args(["--summary-only", "--params"]).arg(file.path());
    cmd.assert()
        .failure()
        .stderr(contains("invalid parameter JSON"));
}

#[test]
fn rejects_unknown_arguments() {
    let mut cmd = studio();
    cmd.arg("--bogus");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --bogus"));
}

#[test]
fn rejects_non_numeric_seed() {
    let mut cmd = studio();
    cmd.args(["--summary-only", "--seed", "abc"]);
    cmd.assert().failure().stderr(contains("invalid seed"));
}

#[test]
fn missing_params_value_shows_usage() {
    let mut cmd = studio();
    cmd.arg("--params");
    cmd.assert()
        .failure()
        .stderr(contains("Usage: galaxy-studio"));
}
