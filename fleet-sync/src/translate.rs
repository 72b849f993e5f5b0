//! Record Translator: native source shapes → canonical [`DeviceRecord`].
//!
//! Pure mapping. Identifiers are normalized on the way in; a record with
//! neither serial number nor IMEI is rejected with
//! [`RecordError::MissingIdentifier`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleet_core::{
    normalize::{email_domain, normalize, normalize_phone},
    Augmentation, DeviceRecord, DomainName, RecordError,
};

use crate::sheet::{SheetColumn, SheetRow};

// ---------------------------------------------------------------------------
// Native shapes
// ---------------------------------------------------------------------------

/// Device as reported by the authoritative inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NativeInventoryDevice {
    pub resource_id: String,
    pub serial_number: String,
    pub imei: String,
    pub email: Vec<String>,
    pub name: Vec<String>,
    pub model: String,
    pub os: String,
    pub build_number: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub wifi_mac_address: String,
    pub status: String,
    /// RFC 3339.
    pub first_sync: String,
    /// RFC 3339.
    pub last_sync: String,
    pub device_compromised_status: String,
    pub developer_options_status: bool,
    pub unknown_sources_status: bool,
    pub adb_status: bool,
    pub encryption_status: String,
    pub device_password_status: String,
}

/// Device as persisted in the canonical store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NativeStoreDevice {
    pub domain: String,
    pub serial_number: String,
    pub imei: String,
    pub name: String,
    pub email: String,
    pub model: String,
    pub os: String,
    pub os_build: String,
    #[serde(rename = "Type")]
    pub device_type: String,
    pub wifi_mac: String,
    pub status: String,
    pub sync_first: String,
    pub sync_last: String,
    pub compromised_status: String,
    pub developer_mode: bool,
    pub unknown_sources: bool,
    pub usb_debug: bool,
    pub encryption_status: String,
    pub password_status: String,
    pub phone_number: String,
    pub color: String,
    pub storage_size: String,
    pub notes: String,
    pub resource_id: String,
}

// ---------------------------------------------------------------------------
// Translators
// ---------------------------------------------------------------------------

/// Translate an authoritative device.
///
/// The domain comes from the owner email; `scope` is used only when the
/// device has no usable owner email.
pub fn translate_authoritative(
    native: &NativeInventoryDevice,
    scope: &DomainName,
) -> Result<DeviceRecord, RecordError> {
    let owner_email = first(&native.email);
    let domain = email_domain(&owner_email)
        .map(DomainName::from)
        .unwrap_or_else(|| scope.clone());
    let record = DeviceRecord {
        domain,
        serial_number: normalize(&native.serial_number),
        imei: normalize(&native.imei),
        owner_name: first(&native.name),
        owner_email,
        model: native.model.clone(),
        os: native.os.clone(),
        os_build: native.build_number.clone(),
        device_type: native.device_type.clone(),
        wifi_mac: native.wifi_mac_address.clone(),
        status: native.status.clone(),
        sync_first: parse_timestamp(&native.first_sync),
        sync_last: parse_timestamp(&native.last_sync),
        compromised_status: native.device_compromised_status.clone(),
        developer_mode: native.developer_options_status,
        unknown_sources_allowed: native.unknown_sources_status,
        usb_debug_enabled: native.adb_status,
        encryption_status: native.encryption_status.clone(),
        password_status: native.device_password_status.clone(),
        augmentation: Augmentation::default(),
        resource_id: native.resource_id.clone(),
    };
    require_identity(record)
}

/// Translate a canonical store entry.
pub fn translate_store(native: &NativeStoreDevice) -> Result<DeviceRecord, RecordError> {
    let domain = if native.domain.trim().is_empty() {
        email_domain(&native.email).unwrap_or_default().to_string()
    } else {
        native.domain.trim().to_string()
    };
    let record = DeviceRecord {
        domain: DomainName::from(domain),
        serial_number: normalize(&native.serial_number),
        imei: normalize(&native.imei),
        owner_name: native.name.clone(),
        owner_email: native.email.clone(),
        model: native.model.clone(),
        os: native.os.clone(),
        os_build: native.os_build.clone(),
        device_type: native.device_type.clone(),
        wifi_mac: native.wifi_mac.clone(),
        status: native.status.clone(),
        sync_first: parse_timestamp(&native.sync_first),
        sync_last: parse_timestamp(&native.sync_last),
        compromised_status: native.compromised_status.clone(),
        developer_mode: native.developer_mode,
        unknown_sources_allowed: native.unknown_sources,
        usb_debug_enabled: native.usb_debug,
        encryption_status: native.encryption_status.clone(),
        password_status: native.password_status.clone(),
        augmentation: Augmentation {
            phone_number: normalize_phone(&native.phone_number),
            color: native.color.clone(),
            storage_size: native.storage_size.clone(),
            notes: native.notes.clone(),
        },
        resource_id: native.resource_id.clone(),
    };
    require_identity(record)
}

/// Translate a spreadsheet row.
///
/// Only the identifiers, the domain and the augmentation columns are read;
/// every other column is a rendering of authoritative data.
pub fn translate_sheet(row: &SheetRow) -> Result<DeviceRecord, RecordError> {
    let record = DeviceRecord {
        domain: DomainName::from(row.cell(SheetColumn::Domain).trim()),
        serial_number: normalize(row.cell(SheetColumn::SerialNumber)),
        imei: normalize(row.cell(SheetColumn::Imei)),
        augmentation: Augmentation {
            phone_number: normalize_phone(row.cell(SheetColumn::PhoneNumber)),
            color: row.cell(SheetColumn::Color).trim().to_string(),
            storage_size: row.cell(SheetColumn::StorageSize).trim().to_string(),
            notes: row.cell(SheetColumn::Notes).to_string(),
        },
        ..Default::default()
    };
    require_identity(record)
}

/// Canonical record → store shape.
pub fn to_store(record: &DeviceRecord) -> NativeStoreDevice {
    NativeStoreDevice {
        domain: record.domain.to_string(),
        serial_number: record.serial_number.clone(),
        imei: record.imei.clone(),
        name: record.owner_name.clone(),
        email: record.owner_email.clone(),
        model: record.model.clone(),
        os: record.os.clone(),
        os_build: record.os_build.clone(),
        device_type: record.device_type.clone(),
        wifi_mac: record.wifi_mac.clone(),
        status: record.status.clone(),
        sync_first: format_timestamp(record.sync_first),
        sync_last: format_timestamp(record.sync_last),
        compromised_status: record.compromised_status.clone(),
        developer_mode: record.developer_mode,
        unknown_sources: record.unknown_sources_allowed,
        usb_debug: record.usb_debug_enabled,
        encryption_status: record.encryption_status.clone(),
        password_status: record.password_status.clone(),
        phone_number: record.augmentation.phone_number.clone(),
        color: record.augmentation.color.clone(),
        storage_size: record.augmentation.storage_size.clone(),
        notes: record.augmentation.notes.clone(),
        resource_id: record.resource_id.clone(),
    }
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// A record that could not be translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIssue {
    /// Provider the record came from.
    pub source: &'static str,
    /// Position in the provider's listing.
    pub index: usize,
    pub error: RecordError,
}

/// Translate every item, collecting failures instead of stopping on them.
pub fn translate_batch<T>(
    source: &'static str,
    items: &[T],
    translate: impl Fn(&T) -> Result<DeviceRecord, RecordError>,
) -> (Vec<DeviceRecord>, Vec<RecordIssue>) {
    let mut records = Vec::with_capacity(items.len());
    let mut issues = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match translate(item) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!("{source}: skipping record #{index}: {error}");
                issues.push(RecordIssue {
                    source,
                    index,
                    error,
                });
            }
        }
    }
    (records, issues)
}

/// Translate spreadsheet rows, skipping fully blank rows silently.
pub fn translate_sheet_rows(rows: &[SheetRow]) -> (Vec<DeviceRecord>, Vec<RecordIssue>) {
    let mut records = Vec::new();
    let mut issues = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        if row.is_blank() {
            continue;
        }
        match translate_sheet(row) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!("{}: skipping row #{index}: {error}", crate::provider::SHEET);
                issues.push(RecordIssue {
                    source: crate::provider::SHEET,
                    index,
                    error,
                });
            }
        }
    }
    (records, issues)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_identity(record: DeviceRecord) -> Result<DeviceRecord, RecordError> {
    if record.serial_number.is_empty() && record.imei.is_empty() {
        return Err(RecordError::MissingIdentifier);
    }
    Ok(record)
}

fn first(values: &[String]) -> String {
    values
        .first()
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!("ignoring unparseable timestamp {raw:?}: {e}");
            None
        }
    }
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory(sn: &str, imei: &str, email: &str) -> NativeInventoryDevice {
        NativeInventoryDevice {
            resource_id: "res-1".into(),
            serial_number: sn.into(),
            imei: imei.into(),
            email: vec![email.into()],
            name: vec!["Anna Lee".into()],
            status: "APPROVED".into(),
            last_sync: "2024-03-01T10:00:00Z".into(),
            ..Default::default()
        }
    }

    #[test]
    fn authoritative_normalizes_identifiers() {
        let record =
            translate_authoritative(&inventory("12 34", "35 69", "anna@example.com"), &"x.com".into())
                .unwrap();
        assert_eq!(record.serial_number, "1234");
        assert_eq!(record.imei, "3569");
        assert_eq!(record.domain, DomainName::from("example.com"));
        assert_eq!(record.owner_name, "Anna Lee");
        assert!(record.sync_last.is_some());
        assert!(record.augmentation.is_empty());
    }

    #[test]
    fn authoritative_domain_falls_back_to_scope() {
        let record =
            translate_authoritative(&inventory("1", "", "no-email"), &"scope.com".into()).unwrap();
        assert_eq!(record.domain, DomainName::from("scope.com"));
    }

    #[test]
    fn missing_identifiers_rejected() {
        let err =
            translate_authoritative(&inventory(" ", "", "a@b.com"), &"b.com".into()).unwrap_err();
        assert_eq!(err, RecordError::MissingIdentifier);
    }

    #[test]
    fn store_roundtrip_keeps_augmentation() {
        let native = NativeStoreDevice {
            domain: "example.com".into(),
            serial_number: "1234".into(),
            phone_number: "415 555 1234".into(),
            notes: "loaner".into(),
            sync_last: "2024-03-01T10:00:00+00:00".into(),
            ..Default::default()
        };
        let record = translate_store(&native).unwrap();
        assert_eq!(record.augmentation.phone_number, "4155551234");
        assert_eq!(record.augmentation.notes, "loaner");

        let back = to_store(&record);
        assert_eq!(back.serial_number, "1234");
        assert_eq!(back.notes, "loaner");
        assert_eq!(back.sync_last, "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn store_json_uses_pascal_case() {
        let json = serde_json::to_value(NativeStoreDevice {
            serial_number: "1".into(),
            device_type: "ANDROID".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["SerialNumber"], "1");
        assert_eq!(json["Type"], "ANDROID");
    }

    #[test]
    fn sheet_row_reads_augmentation_columns() {
        let mut cells = vec![String::new(); 19];
        cells[SheetColumn::Domain.index()] = "example.com".into();
        cells[SheetColumn::PhoneNumber.index()] = "(415) 555-1234".into();
        cells[SheetColumn::SerialNumber.index()] = "12 34".into();
        cells[SheetColumn::Status.index()] = "BLOCKED".into();
        cells[SheetColumn::Notes.index()] = "desk phone".into();
        let record = translate_sheet(&SheetRow(cells)).unwrap();
        assert_eq!(record.serial_number, "1234");
        assert_eq!(record.augmentation.phone_number, "4155551234");
        assert_eq!(record.augmentation.notes, "desk phone");
        assert!(record.status.is_empty(), "sheet never supplies status");
    }

    #[test]
    fn batch_counts_issues_without_stopping() {
        let items = vec![
            inventory("1", "", "a@example.com"),
            inventory("", "", "b@example.com"),
            inventory("3", "", "c@example.com"),
        ];
        let scope = DomainName::from("example.com");
        let (records, issues) =
            translate_batch("inventory", &items, |n| translate_authoritative(n, &scope));
        assert_eq!(records.len(), 2);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].index, 1);
    }

    #[test]
    fn blank_sheet_rows_are_not_issues() {
        let rows = vec![SheetRow(vec![String::new(); 3]), SheetRow(vec!["x.com".into()])];
        let (records, issues) = translate_sheet_rows(&rows);
        assert!(records.is_empty());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].index, 1);
    }
}
