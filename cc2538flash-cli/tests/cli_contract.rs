//! Integration tests for core CLI contract behavior.
//!
//! None of these need a board: every device command here fails before or
//! while opening the port.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("cc2538flash");
    cmd.env_remove("CC2538FLASH_PORT")
        .env_remove("CC2538FLASH_BAUD")
        .env_remove("CC2538FLASH_NON_INTERACTIVE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    cli_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cc2538flash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    cli_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stderr(predicate::str::is_empty());
}

#[test]
fn help_includes_usage_examples() {
    cli_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Examples:"))
        .stdout(predicate::str::contains("list-ports"));
}

#[test]
fn subcommand_help_lists_flash_options() {
    cli_cmd()
        .args(["flash", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-verify"))
        .stdout(predicate::str::contains("--max-retries"));
}

#[test]
fn list_ports_json_returns_array() {
    let dir = tempdir().expect("tempdir should be created");
    let output = cli_cmd()
        .current_dir(dir.path())
        .args(["list-ports", "--json"])
        .output()
        .expect("command should execute");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");
    assert!(parsed.is_array(), "list-ports --json should return an array");
}

// ============================================================================
// Exit codes: 0 success, 1 runtime failure, 2 usage error
// ============================================================================

#[test]
fn exit_code_two_for_unknown_command() {
    cli_cmd()
        .arg("unknown-command-xyz")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized"));
}

#[test]
fn exit_code_two_for_invalid_flag() {
    cli_cmd().arg("--invalid-flag-xyz").assert().failure().code(2);
}

#[test]
fn unknown_command_suggests_similar() {
    cli_cmd()
        .arg("falsh")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("flash"));
}

#[test]
fn flash_without_file_is_usage_error() {
    cli_cmd()
        .arg("flash")
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("FILE"));
}

#[test]
fn invalid_hex_address_is_usage_error() {
    cli_cmd()
        .args(["read", "--address", "0xZZ"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Invalid hex address"));
}

#[test]
fn flash_missing_image_fails_with_runtime_error() {
    let dir = tempdir().expect("tempdir should be created");
    let missing = dir.path().join("missing.bin");

    cli_cmd()
        .current_dir(dir.path())
        .arg("flash")
        .arg(&missing)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Failed to read image"));
}

#[test]
fn flash_outside_flash_is_usage_error() {
    let dir = tempdir().expect("tempdir should be created");
    let image = dir.path().join("app.bin");
    fs::write(&image, [0u8; 64]).expect("write image");

    cli_cmd()
        .current_dir(dir.path())
        .arg("flash")
        .arg(&image)
        .args(["--address", "0x00100000"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("outside flash"));
}

#[test]
fn erase_without_range_is_usage_error() {
    let dir = tempdir().expect("tempdir should be created");
    cli_cmd()
        .current_dir(dir.path())
        .arg("erase")
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("--all"));
}

#[test]
fn erase_all_conflicts_with_range() {
    cli_cmd()
        .args(["erase", "--all", "--address", "200000", "--length", "2048"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn erase_outside_flash_is_usage_error() {
    let dir = tempdir().expect("tempdir should be created");
    cli_cmd()
        .current_dir(dir.path())
        .args(["erase", "--address", "0x00300000", "--length", "0x800"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("outside flash"));
}

#[test]
fn erase_zero_length_is_usage_error() {
    let dir = tempdir().expect("tempdir should be created");
    cli_cmd()
        .current_dir(dir.path())
        .args(["erase", "--address", "0x00200000", "--length", "0"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("greater than zero"));
}

#[test]
fn missing_serial_port_fails_and_keeps_stdout_clean() {
    let dir = tempdir().expect("tempdir should be created");
    let port = dir.path().join("no-such-tty");

    cli_cmd()
        .current_dir(dir.path())
        .arg("--non-interactive")
        .arg("--port")
        .arg(&port)
        .args(["read", "--address", "0x00280028"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Failed to open serial port"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn invalid_local_config_warns_but_succeeds() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("cc2538flash.toml"), "invalid toml [[[").expect("write invalid config");

    let output = cli_cmd()
        .current_dir(dir.path())
        .arg("list-ports")
        .output()
        .expect("command should execute");

    assert!(output.status.success(), "command should succeed despite config warning");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TOML"), "should warn about invalid TOML");
}

#[test]
fn missing_explicit_config_warns_but_succeeds() {
    let dir = tempdir().expect("tempdir should be created");
    let config = dir.path().join("absent.toml");

    cli_cmd()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["list-ports", "--json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("using defaults"));
}

#[test]
fn non_interactive_environment_variable_is_accepted() {
    cli_cmd()
        .env("CC2538FLASH_NON_INTERACTIVE", "true")
        .arg("--version")
        .assert()
        .success();
}
