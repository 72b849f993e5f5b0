//! End-to-end runs of the `fleet` binary against a temp HOME.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use fleet_core::{config, DomainName};
use fleet_sync::{
    provider::Spreadsheet,
    sheet::SheetColumn,
    translate::NativeInventoryDevice,
    LocalProviders,
};

fn fleet(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fleet").expect("fleet binary");
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1");
    cmd
}

fn device(resource: &str, sn: &str, name: &str, email: &str, status: &str) -> NativeInventoryDevice {
    NativeInventoryDevice {
        resource_id: resource.into(),
        serial_number: sn.into(),
        email: vec![email.into()],
        name: vec![name.into()],
        model: "Pixel 8".into(),
        status: status.into(),
        ..Default::default()
    }
}

/// `fleet init` plus an inventory snapshot with two devices.
fn setup() -> TempDir {
    let home = TempDir::new().expect("home");
    fleet(home.path())
        .args(["init", "--domain", "example.com"])
        .assert()
        .success()
        .stdout(contains("1 domain(s)"));

    let cfg = config::load_at(home.path()).expect("config");
    LocalProviders::open(&cfg, home.path())
        .inventory
        .save_snapshot(
            &DomainName::from("example.com"),
            &[
                device("res-1", "AB 12", "Anna Lee", "anna@example.com", "APPROVED"),
                device("res-2", "CD34", "Bob", "bob@example.com", "PENDING"),
            ],
        )
        .expect("snapshot");
    home
}

fn local(home: &Path) -> LocalProviders {
    let cfg = config::load_at(home).expect("config");
    LocalProviders::open(&cfg, home)
}

// ---------------------------------------------------------------------------
// init / domains
// ---------------------------------------------------------------------------

#[test]
fn commands_without_config_point_at_init() {
    let home = TempDir::new().expect("home");
    fleet(home.path())
        .args(["sync", "--all"])
        .assert()
        .failure()
        .stderr(contains("fleet init"));
}

#[test]
fn init_is_idempotent_and_domains_lists() {
    let home = setup();
    fleet(home.path())
        .args(["init", "--domain", "other.com"])
        .assert()
        .success()
        .stdout(contains("left unchanged"));

    fleet(home.path())
        .arg("domains")
        .assert()
        .success()
        .stdout(contains("example.com").and(contains("other.com").not()));

    fleet(home.path())
        .args(["domains", "-v"])
        .assert()
        .success()
        .stdout(contains("admin@example.com"));
}

// ---------------------------------------------------------------------------
// sync / diff
// ---------------------------------------------------------------------------

#[test]
fn sync_requires_scope() {
    let home = setup();
    fleet(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("--all"));
}

#[test]
fn dry_run_sync_reports_and_writes_nothing() {
    let home = setup();
    fleet(home.path())
        .args(["sync", "--all", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run]").and(contains("~  AB12")));

    let data = home.path().join(".fleet").join("data");
    assert!(!data.join("store.json").exists(), "dry-run must not write the store");
    assert!(!data.join("sheet.json").exists(), "dry-run must not write the sheet");
}

#[test]
fn sync_twice_is_idempotent() {
    let home = setup();
    fleet(home.path())
        .args(["sync", "--domain", "example.com"])
        .assert()
        .success()
        .stdout(contains("2 written"));

    let output = fleet(home.path())
        .args(["sync", "--all", "--json"])
        .output()
        .expect("run sync --json");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["merged"], 2);
    assert_eq!(report["sheet_write"]["result"], "unchanged");
    assert!(report["store_writes"]
        .as_array()
        .expect("writes")
        .iter()
        .all(|w| w["result"] == "unchanged"));
}

#[test]
fn unknown_domain_sync_fails_with_code() {
    let home = setup();
    fleet(home.path())
        .args(["sync", "--domain", "nope.com"])
        .assert()
        .failure()
        .stderr(contains("UNKNOWN_DOMAIN"));
}

#[test]
fn diff_shows_pending_rows_then_nothing() {
    let home = setup();
    fleet(home.path())
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("+++ b/sheet").and(contains("Anna Lee")));

    fleet(home.path()).args(["sync", "--all"]).assert().success();

    fleet(home.path())
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("No sheet differences"));
}

// ---------------------------------------------------------------------------
// search / directory
// ---------------------------------------------------------------------------

#[test]
fn search_by_serial_ignores_spacing() {
    let home = setup();
    fleet(home.path()).args(["sync", "--all"]).assert().success();

    let output = fleet(home.path())
        .args(["search", "sn", "A B 1 2", "--json"])
        .output()
        .expect("run search");
    assert!(output.status.success());
    let found: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let found = found.as_array().expect("array");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["owner_name"], "Anna Lee");
}

#[test]
fn search_rejects_missing_term_and_unknown_qtype() {
    let home = setup();
    fleet(home.path()).args(["sync", "--all"]).assert().success();

    fleet(home.path())
        .args(["search", "name"])
        .assert()
        .failure()
        .stderr(contains("INVALID_REQUEST"));
    fleet(home.path())
        .args(["search", "color", "red"])
        .assert()
        .failure()
        .stderr(contains("INVALID_REQUEST"));
    fleet(home.path())
        .args(["search", "all"])
        .assert()
        .success()
        .stdout(contains("2 device(s)"));
}

#[test]
fn directory_uses_phone_typed_into_sheet() {
    let home = setup();
    fleet(home.path()).args(["sync", "--all"]).assert().success();

    let sheet = local(home.path()).sheet;
    let mut rows = sheet.fetch_rows().expect("rows");
    let anna = rows
        .iter_mut()
        .find(|r| r.cell(SheetColumn::OwnerName) == "Anna Lee")
        .expect("anna row");
    anna.0[SheetColumn::PhoneNumber.index()] = "415 555 1234".into();
    sheet.write_rows(&rows, "edited").expect("edit sheet");

    fleet(home.path()).args(["sync", "--all"]).assert().success();

    fleet(home.path())
        .args(["directory", "name", "ann"])
        .assert()
        .success()
        .stdout(contains("(415) 555-1234").and(contains("anna@example.com")));
    fleet(home.path())
        .args(["directory", "name", "bob"])
        .assert()
        .success()
        .stdout(contains("No directory entries"));
}

// ---------------------------------------------------------------------------
// action
// ---------------------------------------------------------------------------

#[test]
fn declined_prompt_is_confirmation_required() {
    let home = setup();
    fleet(home.path()).args(["sync", "--all"]).assert().success();

    fleet(home.path())
        .args(["action", "approve", "--domain", "example.com", "--sn", "CD34"])
        .write_stdin("n\n")
        .assert()
        .failure()
        .stderr(contains("CONFIRMATION_REQUIRED"));
    assert!(local(home.path()).inventory.action_log().expect("log").is_empty());
}

#[test]
fn confirmed_approve_reaches_inventory() {
    let home = setup();
    fleet(home.path()).args(["sync", "--all"]).assert().success();

    fleet(home.path())
        .args(["action", "approve", "--domain", "example.com", "--sn", "CD 34"])
        .write_stdin("y\n")
        .assert()
        .success()
        .stdout(contains("approve issued for CD34"));

    let log = local(home.path()).inventory.action_log().expect("log");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].resource_id, "res-2");
    assert_eq!(log[0].action, "approve");
}

#[test]
fn action_validation_codes_surface_on_stderr() {
    let home = setup();
    fleet(home.path()).args(["sync", "--all"]).assert().success();

    fleet(home.path())
        .args([
            "action", "block", "--domain", "example.com", "--sn", "AB12", "--imei", "35", "--yes",
        ])
        .assert()
        .failure()
        .stderr(contains("INVALID_REQUEST"));
    fleet(home.path())
        .args(["action", "approve", "--domain", "example.com", "--sn", "AB12", "--yes"])
        .assert()
        .failure()
        .stderr(contains("INVALID_STATE_TRANSITION"));
    fleet(home.path())
        .args(["action", "wipe", "--domain", "example.com", "--sn", "ZZ99", "--yes"])
        .assert()
        .failure()
        .stderr(contains("DEVICE_NOT_FOUND"));
    fleet(home.path())
        .args(["action", "wipe", "--domain", "other.com", "--sn", "AB12", "--yes"])
        .assert()
        .failure()
        .stderr(contains("UNKNOWN_DOMAIN"));
    assert!(local(home.path()).inventory.action_log().expect("log").is_empty());
}

#[test]
fn wipe_uses_configured_wipe_type() {
    let home = setup();
    fleet(home.path()).args(["sync", "--all"]).assert().success();

    fleet(home.path())
        .args(["action", "wipe", "--domain", "example.com", "--sn", "AB12", "--yes", "--json"])
        .assert()
        .success()
        .stdout(contains("admin_remote_wipe"));
}

// ---------------------------------------------------------------------------
// daemon
// ---------------------------------------------------------------------------

#[test]
fn daemon_status_when_not_running() {
    let home = setup();
    fleet(home.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains("\"running\": false"));
    fleet(home.path())
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("not running"));
}
