//! Domain types for Fleet device records.
//!
//! Every identifier stored in a [`DeviceRecord`] is already normalized; the
//! translators in `fleet-sync` are the only place raw source data enters.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::normalize;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed tenant domain name (`example.com`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomainName(pub String);

impl DomainName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DomainName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DomainName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identity of a physical device across every source.
///
/// The normalized serial number wins; the normalized IMEI is only used when a
/// record carries no serial number at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum IdentityKey {
    Serial(String),
    Imei(String),
}

impl IdentityKey {
    /// Build a key from raw identifiers. Returns `None` when both are blank.
    pub fn from_parts(serial_number: &str, imei: &str) -> Option<Self> {
        let serial_number = normalize(serial_number);
        if !serial_number.is_empty() {
            return Some(IdentityKey::Serial(serial_number));
        }
        let imei = normalize(imei);
        if !imei.is_empty() {
            return Some(IdentityKey::Imei(imei));
        }
        None
    }

    /// Key under which the Canonical Store persists the record.
    ///
    /// Serial-keyed records use the bare serial; IMEI-only records are
    /// prefixed so the two namespaces can never collide.
    pub fn storage_key(&self) -> String {
        match self {
            IdentityKey::Serial(sn) => sn.clone(),
            IdentityKey::Imei(imei) => format!("imei:{imei}"),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Serial(sn) => write!(f, "sn:{sn}"),
            IdentityKey::Imei(imei) => write!(f, "imei:{imei}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Device lifecycle as seen by the action executor.
///
/// Parsed from the authoritative `status` string; the raw string stays on the
/// record untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Pending,
    Approved,
    Blocked,
    /// Account/device wiping and wiped variants.
    Wiped,
    Other(String),
}

impl LifecycleState {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "PENDING_APPROVAL" => LifecycleState::Pending,
            "APPROVED" => LifecycleState::Approved,
            "BLOCKED" => LifecycleState::Blocked,
            "WIPED" | "ACCOUNT_WIPED" | "DEVICE_WIPED" | "ACCOUNT_WIPING" | "DEVICE_WIPING" => {
                LifecycleState::Wiped
            }
            _ => LifecycleState::Other(status.to_string()),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Pending => write!(f, "PENDING"),
            LifecycleState::Approved => write!(f, "APPROVED"),
            LifecycleState::Blocked => write!(f, "BLOCKED"),
            LifecycleState::Wiped => write!(f, "WIPED"),
            LifecycleState::Other(raw) => write!(f, "{raw}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Device records
// ---------------------------------------------------------------------------

/// Human-curated fields the authoritative source never carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Augmentation {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub storage_size: String,
    #[serde(default)]
    pub notes: String,
}

impl Augmentation {
    pub fn is_empty(&self) -> bool {
        self.phone_number.is_empty()
            && self.color.is_empty()
            && self.storage_size.is_empty()
            && self.notes.is_empty()
    }

    /// Copy every non-empty field of `other` over `self`.
    pub fn overlay(&mut self, other: &Augmentation) {
        overlay_field(&mut self.phone_number, &other.phone_number);
        overlay_field(&mut self.color, &other.color);
        overlay_field(&mut self.storage_size, &other.storage_size);
        overlay_field(&mut self.notes, &other.notes);
    }

    /// Copy fields of `other` only where `self` is still empty.
    pub fn fill_gaps(&mut self, other: &Augmentation) {
        fill_field(&mut self.phone_number, &other.phone_number);
        fill_field(&mut self.color, &other.color);
        fill_field(&mut self.storage_size, &other.storage_size);
        fill_field(&mut self.notes, &other.notes);
    }
}

fn overlay_field(target: &mut String, value: &str) {
    if !value.is_empty() {
        *target = value.to_string();
    }
}

fn fill_field(target: &mut String, value: &str) {
    if target.is_empty() && !value.is_empty() {
        *target = value.to_string();
    }
}

/// The canonical device record, one per physical device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub domain: DomainName,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub imei: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub owner_email: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub os_build: String,
    #[serde(default, rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub wifi_mac: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_first: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_last: Option<DateTime<Utc>>,
    #[serde(default)]
    pub compromised_status: String,
    #[serde(default)]
    pub developer_mode: bool,
    #[serde(default)]
    pub unknown_sources_allowed: bool,
    #[serde(default)]
    pub usb_debug_enabled: bool,
    #[serde(default)]
    pub encryption_status: String,
    #[serde(default)]
    pub password_status: String,
    #[serde(flatten)]
    pub augmentation: Augmentation,
    #[serde(default)]
    pub resource_id: String,
}

impl DeviceRecord {
    /// Identity key of this record, or `None` if it carries no identifier.
    pub fn identity_key(&self) -> Option<IdentityKey> {
        IdentityKey::from_parts(&self.serial_number, &self.imei)
    }

    /// IMEI-namespace key, whether or not a serial is present.
    ///
    /// A record carrying both identifiers uses this to find one that was
    /// only ever recorded by IMEI.
    pub fn imei_key(&self) -> Option<IdentityKey> {
        let imei = normalize(&self.imei);
        (!imei.is_empty()).then_some(IdentityKey::Imei(imei))
    }

    /// Parsed lifecycle state of the raw `status` string.
    pub fn lifecycle(&self) -> LifecycleState {
        LifecycleState::parse(&self.status)
    }
}

/// Derived, read-only phone directory line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub email: String,
    pub phone_number: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_prefers_serial_over_imei() {
        let key = IdentityKey::from_parts(" 12 34 ", "3569").expect("key");
        assert_eq!(key, IdentityKey::Serial("1234".into()));
    }

    #[test]
    fn identity_falls_back_to_imei() {
        let key = IdentityKey::from_parts("   ", "35 69").expect("key");
        assert_eq!(key, IdentityKey::Imei("3569".into()));
        assert_eq!(key.storage_key(), "imei:3569");
    }

    #[test]
    fn identity_absent_when_both_blank() {
        assert!(IdentityKey::from_parts("", " ").is_none());
    }

    #[test]
    fn imei_key_ignores_serial() {
        let record = DeviceRecord {
            serial_number: "ABC".into(),
            imei: "35 69".into(),
            ..Default::default()
        };
        assert_eq!(record.identity_key(), Some(IdentityKey::Serial("ABC".into())));
        assert_eq!(record.imei_key(), Some(IdentityKey::Imei("3569".into())));
        assert_eq!(DeviceRecord::default().imei_key(), None);
    }

    #[test]
    fn wiping_variants_collapse_to_wiped() {
        for raw in ["ACCOUNT_WIPED", "DEVICE_WIPING", "wiped"] {
            assert_eq!(LifecycleState::parse(raw), LifecycleState::Wiped, "{raw}");
        }
        assert_eq!(
            LifecycleState::parse("UNPROVISIONED"),
            LifecycleState::Other("UNPROVISIONED".into())
        );
    }

    #[test]
    fn overlay_skips_empty_fields() {
        let mut base = Augmentation {
            color: "black".into(),
            notes: "loaner".into(),
            ..Default::default()
        };
        base.overlay(&Augmentation {
            notes: "returned".into(),
            ..Default::default()
        });
        assert_eq!(base.color, "black");
        assert_eq!(base.notes, "returned");
    }

    #[test]
    fn fill_gaps_keeps_existing_values() {
        let mut base = Augmentation {
            notes: "new".into(),
            ..Default::default()
        };
        base.fill_gaps(&Augmentation {
            notes: "old".into(),
            color: "red".into(),
            ..Default::default()
        });
        assert_eq!(base.notes, "new");
        assert_eq!(base.color, "red");
    }

    #[test]
    fn record_serde_flattens_augmentation() {
        let record = DeviceRecord {
            domain: DomainName::from("example.com"),
            serial_number: "1234".into(),
            device_type: "ANDROID".into(),
            augmentation: Augmentation {
                notes: "loaner".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["notes"], "loaner");
        assert_eq!(value["type"], "ANDROID");
        let back: DeviceRecord = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, record);
    }
}
