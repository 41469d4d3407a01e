//! Shared integration-test helpers for running the `apimock` binary and
//! writing fixture files.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Runs `apimock` with `args`, stdout and stderr captured.
#[allow(clippy::missing_panics_doc)]
pub fn run(args: &[&str]) -> Output {
    run_with_env(args, &[])
}

/// Runs `apimock` with extra environment variables.
#[allow(clippy::missing_panics_doc)]
pub fn run_with_env(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = command(args);
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd.output().expect("failed to run apimock")
}

/// Runs `apimock` feeding `input` on stdin.
#[allow(clippy::missing_panics_doc)]
pub fn run_with_stdin(args: &[&str], input: &str) -> Output {
    let mut child = command(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn apimock");
    child
        .stdin
        .take()
        .expect("stdin not captured")
        .write_all(input.as_bytes())
        .expect("failed to write stdin");
    child.wait_with_output().expect("failed to wait for apimock")
}

fn command(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_apimock"));
    cmd.args(args)
        .env_remove("APIMOCK_CONFIG")
        .env_remove("APIMOCK_LOG_LEVEL")
        .env_remove("APIMOCK_ASSERT_HEADERS_PATTERN")
        .env_remove("APIMOCK_ASSERT_QUERY_PATTERN")
        .env_remove("APIMOCK_ASSERT_POST_PATTERN");
    cmd
}

/// Writes `contents` to `dir/name` and returns the path.
#[allow(clippy::missing_panics_doc)]
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write fixture");
    path
}

/// Lossy stdout.
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Lossy stderr.
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
