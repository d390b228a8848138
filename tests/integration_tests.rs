//! Integration tests for the bookflip CLI
//!
//! Runs the real binary against a temporary config directory with short
//! timings so each sequence finishes in well under a second.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a bookflip Command
fn bookflip() -> Command {
    let mut cmd = cargo_bin_cmd!("bookflip");
    for var in [
        "BOOKFLIP_SCALE_TRANSITION_MS",
        "BOOKFLIP_COVER_FLIP_MS",
        "BOOKFLIP_MINIMUM_WAIT_MS",
        "BOOKFLIP_RESULT_DISPLAY_MS",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

const FAST_CONFIG: &str = r#"
[timings]
scale_transition_duration_ms = 5
cover_flip_duration_ms = 5
minimum_wait_after_lift_ms = 10
result_display_duration_ms = 5

[demo]
rotation_ms = 5
lift_ms = 5
save_delay_ms = 5
"#;

/// Helper to create a config directory with fast timings
fn fast_config_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bookflip.toml"), FAST_CONFIG).unwrap();
    dir
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_bookflip_help() {
        bookflip().arg("--help").assert().success();
    }

    #[test]
    fn test_bookflip_version() {
        bookflip().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        bookflip().arg("fly").assert().failure();
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        bookflip()
            .args(["--config-dir", dir.path().to_str().unwrap(), "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("scale_transition_duration_ms = 300"))
            .stdout(predicate::str::contains("cover_flip_duration_ms = 400"))
            .stdout(predicate::str::contains("bookflip config init"));
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        bookflip()
            .args(["--config-dir", dir.path().to_str().unwrap(), "config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created bookflip.toml"));

        let content = fs::read_to_string(dir.path().join("bookflip.toml")).unwrap();
        assert!(content.contains("[timings]"));
        assert!(content.contains("minimum_wait_after_lift_ms = 1000"));
    }

    #[test]
    fn test_config_init_does_not_overwrite() {
        let dir = fast_config_dir();
        bookflip()
            .args(["--config-dir", dir.path().to_str().unwrap(), "config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        let content = fs::read_to_string(dir.path().join("bookflip.toml")).unwrap();
        assert_eq!(content, FAST_CONFIG);
    }

    #[test]
    fn test_config_show_reads_file() {
        let dir = fast_config_dir();
        bookflip()
            .args(["--config-dir", dir.path().to_str().unwrap(), "config"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cover_flip_duration_ms = 5"));
    }

    #[test]
    fn test_config_show_applies_env_override() {
        let dir = fast_config_dir();
        bookflip()
            .env("BOOKFLIP_COVER_FLIP_MS", "42")
            .args(["--config-dir", dir.path().to_str().unwrap(), "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cover_flip_duration_ms = 42"));
    }

    #[test]
    fn test_config_validate_warns_on_zero_duration() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("bookflip.toml"),
            "[timings]\ncover_flip_duration_ms = 0\n",
        )
        .unwrap();
        bookflip()
            .args(["--config-dir", dir.path().to_str().unwrap(), "config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings"));
    }

    #[test]
    fn test_config_validate_default_is_valid() {
        let dir = TempDir::new().unwrap();
        bookflip()
            .args(["--config-dir", dir.path().to_str().unwrap(), "config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("valid"));
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bookflip.toml"), "[timings\n").unwrap();
        bookflip()
            .args(["--config-dir", dir.path().to_str().unwrap(), "config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse bookflip.toml"));
    }
}

// =============================================================================
// Phase Listing Tests
// =============================================================================

mod phases {
    use super::*;

    #[test]
    fn test_phases_lists_every_phase() {
        let dir = TempDir::new().unwrap();
        let assert = bookflip()
            .args(["--config-dir", dir.path().to_str().unwrap(), "phases"])
            .assert()
            .success();
        let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
        for name in [
            "idle",
            "saving",
            "scaling",
            "closing_cover",
            "rotating",
            "lifting",
            "waiting_for_result",
            "reversing",
            "reverse_lifting",
            "reverse_rotating",
            "opening_cover",
            "reverse_scaling",
            "showing_result",
        ] {
            assert!(stdout.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_phases_json_includes_dwell_durations() {
        let dir = fast_config_dir();
        let assert = bookflip()
            .args(["--config-dir", dir.path().to_str().unwrap(), "phases", "--json"])
            .assert()
            .success();
        let parsed: serde_json::Value =
            serde_json::from_slice(&assert.get_output().stdout).unwrap();
        let phases = parsed.as_array().unwrap();
        assert_eq!(phases.len(), 13);

        let waiting = phases
            .iter()
            .find(|p| p["phase"] == "waiting_for_result")
            .unwrap();
        assert_eq!(waiting["dwell_ms"], 10);
        assert_eq!(waiting["exit"]["kind"], "dwell");

        let rotating = phases.iter().find(|p| p["phase"] == "rotating").unwrap();
        assert_eq!(rotating["mirror"], "reverse_rotating");
        assert!(rotating["dwell_ms"].is_null());
    }
}

// =============================================================================
// Run Tests
// =============================================================================

mod run {
    use super::*;

    fn run_json(dir: &TempDir, extra: &[&str]) -> Vec<serde_json::Value> {
        let mut cmd = bookflip();
        cmd.args(["--config-dir", dir.path().to_str().unwrap(), "run", "--json"])
            .args(extra);
        let output = cmd.output().unwrap();
        String::from_utf8(output.stdout)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_run_completes_full_sequence() {
        let dir = fast_config_dir();
        let reports = run_json(&dir, &[]);
        assert_eq!(reports.len(), 1);

        let phases: Vec<&str> = reports[0]["trail"]
            .as_array()
            .unwrap()
            .iter()
            .map(|stamp| stamp["phase"].as_str().unwrap())
            .collect();
        assert_eq!(phases.first(), Some(&"saving"));
        assert_eq!(phases.last(), Some(&"idle"));
        assert_eq!(phases.len(), 13);
    }

    #[test]
    fn test_run_multiple_cycles_uses_fresh_sequences() {
        let dir = fast_config_dir();
        let reports = run_json(&dir, &["--cycles", "3"]);
        let ids: Vec<u64> = reports
            .iter()
            .map(|r| r["sequence"].as_u64().unwrap())
            .collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_run_save_failure_exits_with_error() {
        let dir = fast_config_dir();
        bookflip()
            .args(["--config-dir", dir.path().to_str().unwrap(), "run", "--fail"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Save action failed"));
    }

    #[test]
    fn test_run_save_failure_skips_visual_phases() {
        let dir = fast_config_dir();
        let reports = run_json(&dir, &["--fail"]);
        assert_eq!(reports.len(), 1);
        assert!(
            reports[0]["error"]
                .as_str()
                .unwrap()
                .contains("simulated save failure")
        );
    }

    #[test]
    fn test_run_late_failure_exits_with_error() {
        let dir = fast_config_dir();
        bookflip()
            .args([
                "--config-dir",
                dir.path().to_str().unwrap(),
                "run",
                "--late-failure",
                "--minimum-wait-ms",
                "200",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("late save failure"));
    }

    #[test]
    fn test_run_save_timeout_reports_stuck_save() {
        let dir = fast_config_dir();
        bookflip()
            .args([
                "--config-dir",
                dir.path().to_str().unwrap(),
                "run",
                "--save-delay-ms",
                "5000",
                "--save-timeout-ms",
                "20",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("did not settle"));
    }

    #[test]
    fn test_run_warns_on_zero_cli_override() {
        let dir = fast_config_dir();
        bookflip()
            .args([
                "--config-dir",
                dir.path().to_str().unwrap(),
                "run",
                "--cover-flip-ms",
                "0",
            ])
            .assert()
            .success()
            .stderr(predicate::str::contains("cover_flip_duration_ms is 0"));
    }

    #[test]
    fn test_run_warns_on_zero_env_override() {
        let dir = fast_config_dir();
        bookflip()
            .env("BOOKFLIP_RESULT_DISPLAY_MS", "0")
            .args(["--config-dir", dir.path().to_str().unwrap(), "run"])
            .assert()
            .success()
            .stderr(predicate::str::contains("result_display_duration_ms is 0"));
    }

    #[test]
    fn test_run_zero_cycles_is_rejected() {
        let dir = fast_config_dir();
        bookflip()
            .args(["--config-dir", dir.path().to_str().unwrap(), "run", "-n", "0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--cycles"));
    }

    #[test]
    fn test_fail_and_late_failure_conflict() {
        let dir = fast_config_dir();
        bookflip()
            .args([
                "--config-dir",
                dir.path().to_str().unwrap(),
                "run",
                "--fail",
                "--late-failure",
            ])
            .assert()
            .failure();
    }

    #[test]
    fn test_json_log_format_is_accepted() {
        let dir = fast_config_dir();
        bookflip()
            .args([
                "--log-format",
                "json",
                "--config-dir",
                dir.path().to_str().unwrap(),
                "run",
                "--json",
            ])
            .assert()
            .success();
    }
}
