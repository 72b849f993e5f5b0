//! Directory Action Executor validation and dispatch.

mod common;

use common::*;
use fleet_core::{config::WipeKind, DomainName};
use fleet_sync::{
    translate::NativeStoreDevice, ActionError, ActionExecutor, ActionKind, ActionRequest,
    RemoteAction,
};
use rstest::rstest;

fn device(sn: &str, imei: &str, status: &str) -> NativeStoreDevice {
    NativeStoreDevice {
        domain: "example.com".into(),
        serial_number: sn.into(),
        imei: imei.into(),
        status: status.into(),
        email: "anna@example.com".into(),
        resource_id: format!("res-{sn}{imei}"),
        ..Default::default()
    }
}

fn request(action: &str, sn: &str, confirm: bool) -> ActionRequest {
    ActionRequest {
        action: action.into(),
        confirm,
        domain: "example.com".into(),
        sn: sn.into(),
        ..Default::default()
    }
}

struct Fixture {
    config: fleet_core::FleetConfig,
    store: MemStore,
    inventory: MemInventory,
}

impl Fixture {
    fn new(devices: Vec<(&str, NativeStoreDevice)>) -> Self {
        Self {
            config: config(&["example.com", "other.com"]),
            store: MemStore::with(devices),
            inventory: MemInventory::default(),
        }
    }

    fn executor(&self) -> ActionExecutor<'_> {
        ActionExecutor::new(&self.config, &self.store, &self.inventory)
    }
}

#[test]
fn approve_pending_device_issues_action() {
    let fx = Fixture::new(vec![("1234", device("1234", "", "PENDING"))]);
    let outcome = fx
        .executor()
        .execute(&request("approve", "12 34", true))
        .expect("approve");
    assert_eq!(outcome.action, ActionKind::Approve);
    assert_eq!(outcome.serial_number, "1234");
    assert_eq!(
        fx.inventory.issued(),
        vec![(
            DomainName::from("example.com"),
            "res-1234".to_string(),
            RemoteAction::Approve
        )]
    );
}

#[rstest]
#[case("PENDING")]
#[case("BLOCKED")]
fn approve_legal_states(#[case] status: &str) {
    let fx = Fixture::new(vec![("1234", device("1234", "", status))]);
    assert!(fx.executor().execute(&request("approve", "1234", true)).is_ok());
}

#[rstest]
#[case("APPROVED")]
#[case("DEVICE_WIPED")]
#[case("UNPROVISIONED")]
fn approve_illegal_states(#[case] status: &str) {
    let fx = Fixture::new(vec![("1234", device("1234", "", status))]);
    let err = fx
        .executor()
        .execute(&request("approve", "1234", true))
        .unwrap_err();
    assert!(matches!(err, ActionError::InvalidStateTransition { .. }), "{err}");
    assert_eq!(err.code(), "INVALID_STATE_TRANSITION");
    assert!(fx.inventory.issued().is_empty());
}

#[test]
fn both_identifiers_fail_before_lookup() {
    let fx = Fixture::new(vec![("1234", device("1234", "3569", "PENDING"))]);
    let mut req = request("block", "1234", true);
    req.imei = "3569".into();
    let err = fx.executor().execute(&req).unwrap_err();
    assert_eq!(err.code(), "INVALID_REQUEST");
    assert_eq!(fx.store.fetches(), 0, "no lookup on an invalid request");
}

#[test]
fn missing_identifier_is_invalid() {
    let fx = Fixture::new(vec![]);
    let err = fx.executor().execute(&request("wipe", " ", true)).unwrap_err();
    assert_eq!(err.code(), "INVALID_REQUEST");
}

#[test]
fn unconfirmed_request_issues_nothing() {
    let fx = Fixture::new(vec![("1234", device("1234", "", "APPROVED"))]);
    let err = fx.executor().execute(&request("wipe", "1234", false)).unwrap_err();
    assert!(matches!(err, ActionError::ConfirmationRequired { .. }));
    assert_eq!(err.code(), "CONFIRMATION_REQUIRED");
    assert!(fx.inventory.issued().is_empty());
}

#[test]
fn unknown_and_empty_domains_rejected() {
    let fx = Fixture::new(vec![("1234", device("1234", "", "PENDING"))]);
    let mut req = request("block", "1234", true);
    req.domain = "nope.com".into();
    assert_eq!(fx.executor().execute(&req).unwrap_err().code(), "UNKNOWN_DOMAIN");
    req.domain = String::new();
    assert_eq!(fx.executor().execute(&req).unwrap_err().code(), "UNKNOWN_DOMAIN");
}

#[test]
fn device_in_another_domain_is_not_found() {
    let fx = Fixture::new(vec![("1234", device("1234", "", "PENDING"))]);
    let mut req = request("block", "1234", true);
    req.domain = "other.com".into();
    let err = fx.executor().execute(&req).unwrap_err();
    assert_eq!(err.code(), "DEVICE_NOT_FOUND");
}

#[test]
fn ambiguous_imei_is_not_found() {
    let fx = Fixture::new(vec![
        ("A1", device("A1", "3569", "APPROVED")),
        ("B2", device("B2", "3569", "APPROVED")),
    ]);
    let req = ActionRequest {
        action: "block".into(),
        confirm: true,
        domain: "example.com".into(),
        imei: "35 69".into(),
        ..Default::default()
    };
    let err = fx.executor().execute(&req).unwrap_err();
    assert!(matches!(err, ActionError::DeviceNotFound { .. }));
    assert!(err.to_string().contains("2 devices"), "{err}");
}

#[test]
fn wipe_uses_configured_wipe_type() {
    let mut fx = Fixture::new(vec![("1234", device("1234", "", "APPROVED"))]);
    fx.config.remote_wipe_type = WipeKind::AdminAccountWipe;
    let outcome = fx
        .executor()
        .execute(&request("wipe", "1234", true))
        .expect("wipe");
    assert_eq!(outcome.remote_action, "admin_account_wipe");
    assert_eq!(
        fx.inventory.issued()[0].2,
        RemoteAction::Wipe(WipeKind::AdminAccountWipe)
    );
}

#[test]
fn remote_failure_surfaces_as_action_failed() {
    let fx = Fixture::new(vec![("1234", device("1234", "", "APPROVED"))]);
    *fx.inventory.fail_actions.lock().unwrap() = true;
    let err = fx.executor().execute(&request("delete", "1234", true)).unwrap_err();
    assert_eq!(err.code(), "ACTION_FAILED");
    assert!(err.to_string().contains("quota exceeded"), "{err}");
    assert_eq!(fx.store.upserts(), 0, "no local state is touched");
}

#[test]
fn unknown_action_rejected_first() {
    let fx = Fixture::new(vec![]);
    let mut req = request("reboot", "1234", true);
    req.domain = "nope.com".into();
    let err = fx.executor().execute(&req).unwrap_err();
    assert_eq!(err.code(), "INVALID_REQUEST");
}

#[test]
fn prepare_reports_device_without_confirmation() {
    let fx = Fixture::new(vec![("1234", device("1234", "", "PENDING"))]);
    let prepared = fx
        .executor()
        .prepare(&request("approve", "1234", false))
        .expect("prepare");
    assert_eq!(prepared.device.owner_email, "anna@example.com");
    assert!(fx.inventory.issued().is_empty());
}
