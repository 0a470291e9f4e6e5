//! Integration tests for the tunrules CLI.
//!
//! These tests run the real binary against a temporary home directory so
//! that no user config or rule store is touched.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Fixtures
// =============================================================================

/// An isolated home directory with its own rule store.
struct TestHome {
    dir: TempDir,
}

impl TestHome {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn store_dir(&self) -> PathBuf {
        self.path().join("store")
    }

    /// A command with config lookup confined to this home.
    fn bare(&self) -> Command {
        let mut cmd = Command::cargo_bin("tunrules").expect("locate tunrules binary");
        cmd.env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join("xdg"))
            .env("TUNRULES_CONFIG", self.path().join("config.toml"))
            .env_remove("RUST_LOG");
        cmd
    }

    /// A command using the fixture's store directory.
    fn cmd(&self) -> Command {
        let mut cmd = self.bare();
        cmd.arg("--store-dir").arg(self.store_dir());
        cmd
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, contents).expect("write fixture file");
        path
    }

    /// Import a rule document from JSON text.
    fn import(&self, json: &str) {
        let file = self.write("rules.json", json);
        self.cmd().arg("import").arg(&file).assert().success();
    }
}

const SAMPLE_RULES: &str = r#"{
    "exclude": {
        "com.bank.app": ["[100-200]", "nonsense"],
        "com.broken.app": ["nonsense"]
    },
    "include": {
        "org.browser": [">=500"]
    }
}"#;

// =============================================================================
// Basics
// =============================================================================

#[test]
fn version_flag_works() {
    TestHome::new()
        .bare()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tunrules"));
}

#[test]
fn help_lists_commands() {
    TestHome::new()
        .bare()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate").and(predicate::str::contains("import")));
}

// =============================================================================
// validate
// =============================================================================

#[test]
fn validate_prints_canonical_forms() {
    TestHome::new()
        .cmd()
        .args(["validate", " * ", "[100-200]", ">=300", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"))
        .stdout(predicate::str::contains("[100-200]"))
        .stdout(predicate::str::contains("invalid").not());
}

#[test]
fn validate_fails_on_invalid_rules() {
    TestHome::new()
        .cmd()
        .args(["validate", "[200-100]", "abc", "5"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("invalid"))
        .stderr(predicate::str::contains("2 of 3 rules are invalid"));
}

// =============================================================================
// import / show
// =============================================================================

#[test]
fn show_without_store_prints_empty_document() {
    let home = TestHome::new();
    let output = home.cmd().arg("show").assert().success().get_output().stdout.clone();

    let value: serde_json::Value = serde_json::from_slice(&output).expect("show prints JSON");
    assert_eq!(value["exclude"], serde_json::json!({}));
    assert_eq!(value["include"], serde_json::json!({}));
}

#[test]
fn import_persists_document_as_given() {
    let home = TestHome::new();
    let file = home.write("rules.json", SAMPLE_RULES);

    home.cmd()
        .arg("import")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 exclude and 1 include packages"))
        .stdout(predicate::str::contains("1 packages had no valid rules"));

    assert!(home.store_dir().join("vpn_rules.json").exists());
    assert!(!home.store_dir().join("vpn_rules_temp.json").exists());

    home.cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("nonsense"))
        .stdout(predicate::str::contains("org.browser"));
}

#[test]
fn import_rejects_malformed_json() {
    let home = TestHome::new();
    let file = home.write("rules.json", "{ not json");

    home.cmd()
        .arg("import")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid rule document"));

    assert!(!home.store_dir().join("vpn_rules.json").exists());
}

#[test]
fn show_recovers_from_corrupt_store() {
    let home = TestHome::new();
    fs::create_dir_all(home.store_dir()).expect("create store dir");
    fs::write(home.store_dir().join("vpn_rules.json"), "garbage").expect("write");

    home.cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"exclude\""))
        .stderr(predicate::str::contains("warning"));
}

// =============================================================================
// check / managed
// =============================================================================

#[test]
fn check_reports_each_category() {
    let home = TestHome::new();
    home.import(SAMPLE_RULES);

    home.cmd()
        .args(["check", "com.bank.app", "150"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"exclude\s+true\s+\[\[100-200\]\]").unwrap())
        .stdout(predicate::str::is_match(r"include\s+false\s+\[\]").unwrap())
        .stdout(predicate::str::is_match(r"any\s+true").unwrap());

    home.cmd()
        .args(["check", "com.bank.app", "250"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"any\s+false").unwrap());
}

#[test]
fn check_includes_builtin_rules() {
    TestHome::new()
        .cmd()
        .args(["check", "ca.psiphon.conduit", "-5"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"exclude\s+true\s+\[\*\]").unwrap());
}

#[test]
fn managed_lists_builtin_and_runtime_packages() {
    let home = TestHome::new();
    home.import(SAMPLE_RULES);

    home.cmd()
        .args(["managed", "--category", "exclude"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exclude\tca.psiphon.conduit"))
        .stdout(predicate::str::contains("exclude\tcom.bank.app"))
        .stdout(predicate::str::contains("com.broken.app").not())
        .stdout(predicate::str::contains("org.browser").not());
}

#[test]
fn managed_with_installed_filters_by_version() {
    let home = TestHome::new();
    home.import(SAMPLE_RULES);

    home.cmd()
        .args([
            "managed",
            "--installed",
            "com.bank.app=300",
            "--installed",
            "org.browser=600",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("include\torg.browser"))
        .stdout(predicate::str::contains("com.bank.app").not())
        .stdout(predicate::str::contains("ca.psiphon.conduit").not());
}

#[test]
fn managed_rejects_bad_installed_pair() {
    TestHome::new()
        .cmd()
        .args(["managed", "--installed", "com.bank.app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PACKAGE=VERSION"));
}

// =============================================================================
// tunneled / controllable
// =============================================================================

#[test]
fn tunneled_follows_mode_and_selection() {
    let home = TestHome::new();

    home.cmd()
        .args(["tunneled", "org.app"])
        .assert()
        .success()
        .stdout("true\n");

    home.cmd()
        .args(["tunneled", "org.app", "--mode", "exclude", "--app", "org.app"])
        .assert()
        .success()
        .stdout("false\n");

    home.cmd()
        .args(["tunneled", "org.app", "--mode", "include"])
        .assert()
        .success()
        .stdout("false\n");
}

#[test]
fn controllable_drops_managed_uninstalled_and_self() {
    let home = TestHome::new();
    home.import(SAMPLE_RULES);

    home.cmd()
        .args([
            "controllable",
            "--app",
            "com.bank.app",
            "--app",
            "org.free",
            "--app",
            "org.gone",
            "--app",
            "me.host",
            "--installed",
            "com.bank.app=150",
            "--installed",
            "org.free=1",
            "--installed",
            "me.host=1",
            "--self-package",
            "me.host",
        ])
        .assert()
        .success()
        .stdout("org.free\n");
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn config_file_sets_store_location_and_mode() {
    let home = TestHome::new();
    let store = home.path().join("configured");
    home.write(
        "config.toml",
        &format!(
            "[store]\ndir = {:?}\nrules_file = \"custom.json\"\n\n[policy]\nmode = \"exclude\"\n",
            store.display().to_string()
        ),
    );
    let rules = home.write("rules.json", SAMPLE_RULES);

    home.bare().arg("import").arg(&rules).assert().success();
    assert!(store.join("custom.json").exists());

    home.bare()
        .args(["tunneled", "org.app", "--app", "org.app"])
        .assert()
        .success()
        .stdout("false\n");
}

#[test]
fn invalid_config_is_reported() {
    let home = TestHome::new();
    home.write("config.toml", "[store]\nunknown_key = 1\n");

    home.bare()
        .arg("show")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
