#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};

pub const MIRNA: &str = "UAGCAGCACGUAAAUAUUGGCG";
pub const SHORT_TARGET: &str = "GCAUUGCUGCUAGUAGCCAUGCUGCUAAGCAGGUACCAGUCAGUAAGCUAGCAUG";

/// Column of the first feature in a per-site row without site IDs.
pub const FIRST_FEATURE: usize = 6;
/// Number of feature columns plus the score.
pub const VALUE_COLUMNS: usize = 15;

/// The miRmap CLI with external programs disabled.
pub fn mirmap() -> Command {
    let mut cmd = Command::cargo_bin("mirmap").unwrap();
    cmd.arg("--no-engines").arg("-g").arg("warn").env_remove("RUST_LOG");
    cmd
}

/// Runs the miRmap CLI with given arguments and returns stdout.
pub fn run_mirmap(args: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
    let mut cmd = mirmap();
    cmd.args(args);
    let output = cmd.assert().success().get_output().stdout.clone();
    Ok(String::from_utf8(output)?)
}

/// Split tab-delimited output into rows of fields.
pub fn parse_rows(output: &str) -> Vec<Vec<String>> {
    output
        .lines()
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

/// Path of a fixture under `tests/data`, `None` when it is missing.
pub fn fixture(name: &str) -> Option<PathBuf> {
    let path = Path::new("tests/data").join(name);
    if path.exists() {
        Some(path)
    } else {
        eprintln!("Skipping: fixture {name} missing");
        None
    }
}

pub fn assert_close(actual: &str, expected: f64) {
    let value: f64 = actual.parse().unwrap();
    assert!(
        (value - expected).abs() < 1e-9,
        "expected {expected}, got {value}"
    );
}
