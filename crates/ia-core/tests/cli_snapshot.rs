//! CLI tests for ia-core driven by registry and instrumentation snapshots.
//!
//! Every test points `--config` at an empty temp directory so a developer's
//! own settings file cannot leak in.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

/// Get a Command for the ia-core binary.
fn ia_core(config_dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("ia-core");
    cmd.arg("--config").arg(config_dir).env("IA_LOG", "error");
    cmd
}

const NATIVE: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall";
const WOW: &str = r"SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall";

fn write_json(dir: &Path, name: &str, value: &Value) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

/// Two dated packages, one hidden, one unnamed.
fn dated_snapshot(dir: &Path) -> std::path::PathBuf {
    write_json(
        dir,
        "registry.json",
        &serde_json::json!({
            "local_machine": [{
                "path": NATIVE,
                "subkeys": [
                    { "path": "{A1}", "values": { "DisplayName": "Foo", "InstallDate": "20230615" } },
                    { "path": "KB123", "values": { "DisplayName": "Patch", "SystemComponent": 1 } },
                    { "path": "orphan", "values": { "InstallDate": "20200101" } }
                ]
            }],
            "current_user": [{
                "path": WOW,
                "subkeys": [
                    { "path": "bar", "values": { "DisplayName": "Bar" } }
                ]
            }]
        }),
    )
}

fn parse_stdout(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should be JSON")
}

// ============================================================================
// list
// ============================================================================

mod list {
    use super::*;

    #[test]
    fn all_resolved_exits_clean() {
        let dir = TempDir::new().unwrap();
        let registry = dated_snapshot(dir.path());
        let instrumentation = dir.path().join("cim.json");
        std::fs::write(&instrumentation, r#"[{"Name":"BAR","InstallDate":"20210304"}]"#).unwrap();

        let output = ia_core(dir.path())
            .arg("list")
            .arg("--registry-snapshot")
            .arg(&registry)
            .arg("--instrumentation-snapshot")
            .arg(&instrumentation)
            .assert()
            .code(0)
            .get_output()
            .stdout
            .clone();

        let json = parse_stdout(&output);
        assert_eq!(json["schema_version"], "1.0.0");
        assert!(json["run_id"].as_str().unwrap().starts_with("run-"));

        let apps = json["inventory"]["apps"].as_array().unwrap();
        let names: Vec<_> = apps.iter().map(|a| a["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Bar", "Foo"], "current user root is walked first");

        assert_eq!(apps[0]["resolved_install_date"]["source"], "instrumentation");
        assert_eq!(apps[0]["resolved_install_date"]["at"], "2021-03-04T00:00:00");
        assert_eq!(apps[1]["resolved_install_date"]["source"], "registry");

        let meta = &json["inventory"]["metadata"];
        assert_eq!(meta["enumeration"]["skipped_hidden"], 1);
        assert_eq!(meta["enumeration"]["skipped_unnamed"], 1);
        assert_eq!(meta["cache"]["status"], "loaded");
    }

    #[test]
    fn unresolved_exits_one() {
        let dir = TempDir::new().unwrap();
        let registry = dated_snapshot(dir.path());

        ia_core(dir.path())
            .args(["list", "--no-instrumentation", "--registry-snapshot"])
            .arg(&registry)
            .assert()
            .code(1)
            .stdout(predicate::str::contains("\"Bar\""));
    }

    #[test]
    fn unresolved_only_filters_records() {
        let dir = TempDir::new().unwrap();
        let registry = dated_snapshot(dir.path());

        let output = ia_core(dir.path())
            .args(["-f", "jsonl", "list", "--no-instrumentation", "--unresolved-only"])
            .arg("--registry-snapshot")
            .arg(&registry)
            .assert()
            .code(1)
            .get_output()
            .stdout
            .clone();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let record: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["name"], "Bar");
        assert!(record["resolved_install_date"].is_null());
    }

    #[test]
    fn icon_file_tier_uses_real_file() {
        let dir = TempDir::new().unwrap();
        let icon = dir.path().join("app.exe");
        std::fs::write(&icon, b"MZ").unwrap();
        if std::fs::metadata(&icon).unwrap().created().is_err() {
            println!("Skipping: filesystem has no creation times");
            return;
        }
        let icon_value = format!("\"{}\",0", icon.display());

        let registry = write_json(
            dir.path(),
            "registry.json",
            &serde_json::json!({
                "local_machine": [{
                    "path": NATIVE,
                    "subkeys": [
                        { "path": "app", "values": { "DisplayName": "App", "DisplayIcon": icon_value } }
                    ]
                }]
            }),
        );

        let output = ia_core(dir.path())
            .args(["list", "--no-instrumentation", "--registry-snapshot"])
            .arg(&registry)
            .assert()
            .code(0)
            .get_output()
            .stdout
            .clone();

        let json = parse_stdout(&output);
        let app = &json["inventory"]["apps"][0];
        assert_eq!(app["display_icon"], icon.display().to_string());
        assert_eq!(app["resolved_install_date"]["source"], "icon_file");
    }

    #[test]
    fn summary_format() {
        let dir = TempDir::new().unwrap();
        let registry = dated_snapshot(dir.path());

        ia_core(dir.path())
            .args(["-f", "summary", "list", "--no-instrumentation", "--registry-snapshot"])
            .arg(&registry)
            .assert()
            .code(1)
            .stdout(predicate::str::starts_with("2 packages: 1 registry"));
    }

    #[test]
    fn markdown_format() {
        let dir = TempDir::new().unwrap();
        let registry = dated_snapshot(dir.path());

        ia_core(dir.path())
            .args(["-f", "md", "list", "--no-instrumentation", "--registry-snapshot"])
            .arg(&registry)
            .assert()
            .code(1)
            .stdout(predicate::str::contains("| Foo |"));
    }

    #[test]
    fn exitcode_format_prints_nothing() {
        let dir = TempDir::new().unwrap();
        let registry = dated_snapshot(dir.path());

        ia_core(dir.path())
            .args(["-f", "exitcode", "list", "--no-instrumentation", "--registry-snapshot"])
            .arg(&registry)
            .assert()
            .code(1)
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn malformed_snapshot_is_args_error() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("registry.json");
        std::fs::write(&registry, "{ not json").unwrap();

        let output = ia_core(dir.path())
            .args(["list", "--no-instrumentation", "--registry-snapshot"])
            .arg(&registry)
            .assert()
            .code(10)
            .get_output()
            .stdout
            .clone();

        let json = parse_stdout(&output);
        assert_eq!(json["code"], 22);
        assert_eq!(json["category"], "registry");
    }

    #[test]
    fn malformed_instrumentation_snapshot_is_args_error() {
        let dir = TempDir::new().unwrap();
        let registry = dated_snapshot(dir.path());
        let instrumentation = dir.path().join("cim.json");
        std::fs::write(&instrumentation, "Get-CimInstance : Access denied").unwrap();

        ia_core(dir.path())
            .arg("list")
            .arg("--registry-snapshot")
            .arg(&registry)
            .arg("--instrumentation-snapshot")
            .arg(&instrumentation)
            .assert()
            .code(10);
    }

    #[test]
    fn missing_instrumentation_snapshot_is_args_error() {
        let dir = TempDir::new().unwrap();
        let registry = dated_snapshot(dir.path());

        let output = ia_core(dir.path())
            .arg("list")
            .arg("--registry-snapshot")
            .arg(&registry)
            .arg("--instrumentation-snapshot")
            .arg(dir.path().join("absent.json"))
            .assert()
            .code(10)
            .get_output()
            .stdout
            .clone();

        let json = parse_stdout(&output);
        assert_eq!(json["code"], 22);
        assert!(json["context"]["snapshot"]
            .as_str()
            .unwrap()
            .ends_with("absent.json"));
    }

    #[test]
    fn instrumentation_flags_conflict() {
        let dir = TempDir::new().unwrap();
        ia_core(dir.path())
            .args(["list", "--no-instrumentation", "--instrumentation-snapshot", "x.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cannot be used with"));
    }

    #[test]
    fn oversized_timeout_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = dated_snapshot(dir.path());
        ia_core(dir.path())
            .args(["list", "--instrumentation-timeout", "18446744073709551615", "--registry-snapshot"])
            .arg(&registry)
            .assert()
            .code(2)
            .stderr(predicate::str::contains("86400"));
    }

    #[test]
    fn oversized_settings_timeout_is_args_error() {
        let dir = TempDir::new().unwrap();
        write_json(
            dir.path(),
            "settings.json",
            &serde_json::json!({
                "schema_version": "1.0.0",
                "instrumentation": { "timeout_secs": 18446744073709551615u64 }
            }),
        );
        let registry = dated_snapshot(dir.path());
        ia_core(dir.path())
            .args(["list", "--registry-snapshot"])
            .arg(&registry)
            .assert()
            .code(10);
    }

    #[test]
    fn zero_timeout_rejected() {
        let dir = TempDir::new().unwrap();
        ia_core(dir.path())
            .args(["list", "--instrumentation-timeout", "0"])
            .assert()
            .failure();
    }

    #[cfg(not(windows))]
    #[test]
    fn live_registry_unavailable_off_windows() {
        let dir = TempDir::new().unwrap();
        ia_core(dir.path())
            .args(["list", "--no-instrumentation"])
            .assert()
            .code(11);
    }
}

// ============================================================================
// config
// ============================================================================

mod config {
    use super::*;

    #[test]
    fn show_defaults() {
        let dir = TempDir::new().unwrap();
        let output = ia_core(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let json = parse_stdout(&output);
        assert_eq!(json["source"]["using_defaults"], true);
        assert_eq!(json["settings"]["instrumentation"]["enabled"], true);
    }

    #[test]
    fn settings_file_is_picked_up() {
        let dir = TempDir::new().unwrap();
        write_json(
            dir.path(),
            "settings.json",
            &serde_json::json!({
                "schema_version": "1.0.0",
                "scopes": ["local_machine"],
                "instrumentation": { "enabled": false }
            }),
        );

        let output = ia_core(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let json = parse_stdout(&output);
        assert_eq!(json["source"]["using_defaults"], false);
        assert_eq!(json["source"]["hash"].as_str().unwrap().len(), 64);
        assert_eq!(json["settings"]["scopes"], serde_json::json!(["local_machine"]));
    }

    #[test]
    fn settings_scopes_limit_enumeration() {
        let dir = TempDir::new().unwrap();
        write_json(
            dir.path(),
            "settings.json",
            &serde_json::json!({ "schema_version": "1.0.0", "scopes": ["current_user"] }),
        );
        let registry = dated_snapshot(dir.path());

        let output = ia_core(dir.path())
            .args(["-f", "jsonl", "list", "--no-instrumentation", "--registry-snapshot"])
            .arg(&registry)
            .assert()
            .code(1)
            .get_output()
            .stdout
            .clone();

        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"Bar\""));
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let dir = TempDir::new().unwrap();
        let path = write_json(
            dir.path(),
            "bad.json",
            &serde_json::json!({ "schema_version": "1.0.0", "scopes": [] }),
        );

        ia_core(dir.path())
            .args(["config", "validate"])
            .arg(&path)
            .assert()
            .code(10);
    }

    #[test]
    fn validate_accepts_good_settings() {
        let dir = TempDir::new().unwrap();
        let path = write_json(
            dir.path(),
            "good.json",
            &serde_json::json!({ "schema_version": "1.0.0" }),
        );

        ia_core(dir.path())
            .args(["config", "validate"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"valid\": true"));
    }

    #[test]
    fn version_mismatch_fails_list() {
        let dir = TempDir::new().unwrap();
        write_json(
            dir.path(),
            "settings.json",
            &serde_json::json!({ "schema_version": "9.9.9" }),
        );
        let registry = dated_snapshot(dir.path());

        ia_core(dir.path())
            .args(["list", "--registry-snapshot"])
            .arg(&registry)
            .assert()
            .code(10);
    }
}

// ============================================================================
// schema / version
// ============================================================================

mod schema_and_version {
    use super::*;

    #[test]
    fn schema_list() {
        let dir = TempDir::new().unwrap();
        ia_core(dir.path())
            .args(["schema", "--list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("InventoryEnvelope"));
    }

    #[test]
    fn schema_for_type() {
        let dir = TempDir::new().unwrap();
        let output = ia_core(dir.path())
            .args(["schema", "InstalledApp"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let json = parse_stdout(&output);
        assert!(json["properties"]["resolved_install_date"].is_object());
    }

    #[test]
    fn unknown_schema_type() {
        let dir = TempDir::new().unwrap();
        ia_core(dir.path())
            .args(["schema", "Nope"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("unknown schema type"));
    }

    #[test]
    fn version_json() {
        let dir = TempDir::new().unwrap();
        let output = ia_core(dir.path())
            .arg("version")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let json = parse_stdout(&output);
        assert_eq!(json["ia_core_version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn invalid_format_rejected() {
        let dir = TempDir::new().unwrap();
        ia_core(dir.path())
            .args(["--format", "xml", "version"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }
}
