//! Spreadsheet layout.
//!
//! ```text
//! row 1        Last updated | <timestamp>
//! header_row   Domain | Phone Number | Color | ... | Notes
//! below        one device per row
//! ```
//!
//! Column order is fixed; cells past the end of a short row read as empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleet_core::{normalize::normalize, DeviceRecord, IdentityKey};

/// Label written into the first cell of the timestamp row.
pub const LAST_UPDATED_LABEL: &str = "Last updated";

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetColumn {
    Domain,
    PhoneNumber,
    Color,
    StorageSize,
    OwnerName,
    Status,
    OwnerEmail,
    Model,
    Imei,
    SerialNumber,
    LastSync,
    Os,
    DeviceType,
    WifiMac,
    CompromisedStatus,
    DeveloperMode,
    UnknownSources,
    UsbDebug,
    Notes,
}

impl SheetColumn {
    pub const ALL: [SheetColumn; 19] = [
        SheetColumn::Domain,
        SheetColumn::PhoneNumber,
        SheetColumn::Color,
        SheetColumn::StorageSize,
        SheetColumn::OwnerName,
        SheetColumn::Status,
        SheetColumn::OwnerEmail,
        SheetColumn::Model,
        SheetColumn::Imei,
        SheetColumn::SerialNumber,
        SheetColumn::LastSync,
        SheetColumn::Os,
        SheetColumn::DeviceType,
        SheetColumn::WifiMac,
        SheetColumn::CompromisedStatus,
        SheetColumn::DeveloperMode,
        SheetColumn::UnknownSources,
        SheetColumn::UsbDebug,
        SheetColumn::Notes,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn header(self) -> &'static str {
        match self {
            SheetColumn::Domain => "Domain",
            SheetColumn::PhoneNumber => "Phone Number",
            SheetColumn::Color => "Color",
            SheetColumn::StorageSize => "Storage",
            SheetColumn::OwnerName => "Name",
            SheetColumn::Status => "Status",
            SheetColumn::OwnerEmail => "Email",
            SheetColumn::Model => "Model",
            SheetColumn::Imei => "IMEI",
            SheetColumn::SerialNumber => "Serial Number",
            SheetColumn::LastSync => "Last Sync",
            SheetColumn::Os => "OS",
            SheetColumn::DeviceType => "Type",
            SheetColumn::WifiMac => "WiFi MAC",
            SheetColumn::CompromisedStatus => "Compromised",
            SheetColumn::DeveloperMode => "Developer Mode",
            SheetColumn::UnknownSources => "Unknown Sources",
            SheetColumn::UsbDebug => "USB Debugging",
            SheetColumn::Notes => "Notes",
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One spreadsheet row as raw cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetRow(pub Vec<String>);

impl SheetRow {
    /// The fixed column header.
    pub fn header() -> Self {
        SheetRow(
            SheetColumn::ALL
                .iter()
                .map(|c| c.header().to_string())
                .collect(),
        )
    }

    pub fn cell(&self, column: SheetColumn) -> &str {
        self.0
            .get(column.index())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|c| c.trim().is_empty())
    }

    pub fn identity_key(&self) -> Option<IdentityKey> {
        IdentityKey::from_parts(
            self.cell(SheetColumn::SerialNumber),
            self.cell(SheetColumn::Imei),
        )
    }

    /// Render a canonical record. `now` anchors the humanized last-sync cell.
    pub fn from_record(record: &DeviceRecord, now: DateTime<Utc>) -> Self {
        let last_sync = record
            .sync_last
            .map(|ts| humanize_since(ts, now))
            .unwrap_or_default();
        let cells = SheetColumn::ALL
            .iter()
            .map(|column| match column {
                SheetColumn::Domain => record.domain.to_string(),
                SheetColumn::PhoneNumber => record.augmentation.phone_number.clone(),
                SheetColumn::Color => record.augmentation.color.clone(),
                SheetColumn::StorageSize => record.augmentation.storage_size.clone(),
                SheetColumn::OwnerName => record.owner_name.clone(),
                SheetColumn::Status => record.status.clone(),
                SheetColumn::OwnerEmail => record.owner_email.clone(),
                SheetColumn::Model => record.model.clone(),
                SheetColumn::Imei => normalize(&record.imei),
                SheetColumn::SerialNumber => normalize(&record.serial_number),
                SheetColumn::LastSync => last_sync.clone(),
                SheetColumn::Os => record.os.clone(),
                SheetColumn::DeviceType => record.device_type.clone(),
                SheetColumn::WifiMac => record.wifi_mac.clone(),
                SheetColumn::CompromisedStatus => record.compromised_status.clone(),
                SheetColumn::DeveloperMode => record.developer_mode.to_string(),
                SheetColumn::UnknownSources => record.unknown_sources_allowed.to_string(),
                SheetColumn::UsbDebug => record.usb_debug_enabled.to_string(),
                SheetColumn::Notes => record.augmentation.notes.clone(),
            })
            .collect();
        SheetRow(cells)
    }

    /// Tab-separated rendering used for hashing and diffs.
    pub fn to_line(&self) -> String {
        self.0.join("\t")
    }
}

/// Text of the last-updated cell.
pub fn format_last_updated(now: DateTime<Utc>) -> String {
    now.to_rfc2822()
}

/// Relative age of `ts` as seen from `now`, e.g. `"3 hours ago"`.
///
/// Timestamps in the future read as `"now"`.
pub fn humanize_since(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - ts).num_seconds().max(0);
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const WEEK: i64 = 7 * DAY;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let (n, unit) = match secs {
        0 => return "now".to_string(),
        s if s < MINUTE => (s, "second"),
        s if s < HOUR => (s / MINUTE, "minute"),
        s if s < DAY => (s / HOUR, "hour"),
        s if s < WEEK => (s / DAY, "day"),
        s if s < MONTH => (s / WEEK, "week"),
        s if s < YEAR => (s / MONTH, "month"),
        s => (s / YEAR, "year"),
    };
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}
