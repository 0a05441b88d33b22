//! CLI surface tests for the ndnrtc-stream binary.
//!
//! None of these reach a child launch: each run stops at argument parsing,
//! settings, resolution validation or the forwarder probe.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// The binary with settings, home and temp dir all inside `sandbox`.
fn ndnrtc_stream(sandbox: &Path) -> Command {
    let settings = sandbox.join("settings.toml");
    if !settings.exists() {
        fs::write(
            &settings,
            "[tools]\nnfd_status = \"true\"\nndnsec = \"/nonexistent/ndnsec\"\nndnrtc_client = \"/nonexistent/ndnrtc-client\"\n",
        )
        .unwrap();
    }
    let tmp = sandbox.join("tmp");
    fs::create_dir_all(&tmp).unwrap();

    let mut cmd = Command::cargo_bin("ndnrtc-stream").unwrap();
    cmd.current_dir(sandbox)
        .env("HOME", sandbox)
        .env("XDG_CONFIG_HOME", sandbox.join("config"))
        .env("TMPDIR", &tmp)
        .env_remove("RUST_LOG")
        .arg("--settings")
        .arg(&settings)
        .timeout(Duration::from_secs(10));
    cmd
}

fn run_dirs(sandbox: &Path) -> usize {
    fs::read_dir(sandbox.join("tmp")).unwrap().count()
}

#[test]
fn help_lists_subcommands() {
    let sandbox = TempDir::new().unwrap();
    ndnrtc_stream(sandbox.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("publish"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("ndnrtc-stream fetch /ndnrtc/first-stream"));
}

#[test]
fn fetch_help_lists_overrides() {
    let sandbox = TempDir::new().unwrap();
    ndnrtc_stream(sandbox.path())
        .args(["fetch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--video-size"))
        .stdout(predicate::str::contains("--trust-schema"))
        .stdout(predicate::str::contains("--cert"));
}

#[test]
fn version_is_printed() {
    let sandbox = TempDir::new().unwrap();
    ndnrtc_stream(sandbox.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_subcommand_fails() {
    let sandbox = TempDir::new().unwrap();
    ndnrtc_stream(sandbox.path()).assert().failure();
}

#[test]
fn missing_stream_prefix_fails() {
    let sandbox = TempDir::new().unwrap();
    ndnrtc_stream(sandbox.path())
        .arg("publish")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<STREAM_PREFIX>"));
}

#[test]
fn invalid_resolution_fails_without_side_effects() {
    let sandbox = TempDir::new().unwrap();
    for bad in ["1280by720", "1280x720x2", "x720"] {
        ndnrtc_stream(sandbox.path())
            .args(["fetch", "/ndnrtc/first-stream", "-s", bad])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid resolution"));
    }
    assert_eq!(run_dirs(sandbox.path()), 0);
}

#[test]
fn stopped_forwarder_aborts_before_setup() {
    let sandbox = TempDir::new().unwrap();
    fs::write(
        sandbox.path().join("settings.toml"),
        "[tools]\nnfd_status = \"false\"\n",
    )
    .unwrap();

    ndnrtc_stream(sandbox.path())
        .args(["publish", "/ndnrtc/first-stream"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NFD is not running"));
    assert_eq!(run_dirs(sandbox.path()), 0);
}

#[test]
fn missing_identity_tool_fails_publish() {
    let sandbox = TempDir::new().unwrap();
    ndnrtc_stream(sandbox.path())
        .args(["publish", "/ndnrtc/first-stream", "-i", "/ndnrtc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ndnsec"));
    assert_eq!(run_dirs(sandbox.path()), 0);
}

#[test]
fn print_settings_shows_overrides_and_sources() {
    let sandbox = TempDir::new().unwrap();
    fs::write(
        sandbox.path().join("settings.toml"),
        "[client]\nrun_time = 3600\n",
    )
    .unwrap();

    ndnrtc_stream(sandbox.path())
        .env("NDNRTC_STREAM_INSTANCE", "studio")
        .arg("--print-settings")
        .assert()
        .success()
        .stdout(predicate::str::contains("run_time = 3600"))
        .stdout(predicate::str::contains("instance_name = \"studio\""))
        .stdout(predicate::str::contains("settings.toml"))
        .stdout(predicate::str::contains("NDNRTC_STREAM_INSTANCE"));
}
