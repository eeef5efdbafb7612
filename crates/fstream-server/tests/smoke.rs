//! Smoke tests for the `fstream` binary.
//!
//! Exercise the CLI and config loading without starting the server loop.

use std::io::Write;
use std::process::Command;

fn fstream() -> Command {
    Command::new(env!("CARGO_BIN_EXE_fstream"))
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn binary_responds_to_help() {
    let output = fstream()
        .arg("--help")
        .output()
        .expect("failed to execute fstream");
    assert!(output.status.success(), "fstream --help should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("--listen"));
}

#[test]
fn check_without_config_uses_defaults() {
    let output = fstream().arg("--check").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("127.0.0.1:7400"), "{stdout}");
}

#[test]
fn check_reports_config_summary() {
    let file = config_file(
        r#"
[[packages]]
name = "bank"
type = "external"

[packages.modules.default]

[[functions]]
name = "f1"
package = "bank"
module = "default"
sources = [{ name = "in" }]
sink = { name = "out" }
"#,
    );
    let output = fstream()
        .args(["--check", "--listen", "127.0.0.1:9999", "--config"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("127.0.0.1:9999"), "{stdout}");
    assert!(stdout.contains("1 package(s), 1 function(s)"), "{stdout}");
}

#[test]
fn check_rejects_unknown_package() {
    let file = config_file(
        r#"
[[functions]]
name = "f1"
package = "ghost"
module = "default"
"#,
    );
    let output = fstream()
        .args(["--check", "--config"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ghost"), "{stderr}");
}

#[test]
fn unreadable_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = fstream()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .output()
        .unwrap();
    assert!(!output.status.success());
}
