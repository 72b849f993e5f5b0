//! Search and directory lookups over canonical device records.
//!
//! Both operate on a snapshot read from the Canonical Store; nothing here
//! performs I/O.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::FleetConfig;
use crate::error::QueryError;
use crate::normalize::{format_phone, normalize, normalize_phone};
use crate::types::{DeviceRecord, DirectoryEntry, DomainName};

/// Field a search matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    All,
    Email,
    Imei,
    Name,
    Notes,
    Phone,
    Sn,
    Status,
}

impl FromStr for QueryType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => Err(QueryError::MissingQueryType),
            "all" => Ok(QueryType::All),
            "email" => Ok(QueryType::Email),
            "imei" => Ok(QueryType::Imei),
            "name" => Ok(QueryType::Name),
            "notes" => Ok(QueryType::Notes),
            "phone" => Ok(QueryType::Phone),
            "sn" => Ok(QueryType::Sn),
            "status" => Ok(QueryType::Status),
            other => Err(QueryError::InvalidQueryType(other.to_string())),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryType::All => "all",
            QueryType::Email => "email",
            QueryType::Imei => "imei",
            QueryType::Name => "name",
            QueryType::Notes => "notes",
            QueryType::Phone => "phone",
            QueryType::Sn => "sn",
            QueryType::Status => "status",
        };
        f.write_str(s)
    }
}

/// Wire shape of a search or directory request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub qtype: String,
    #[serde(default)]
    pub q: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Accepted for shape compatibility; not verified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A validated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub qtype: QueryType,
    pub q: String,
    pub domain: Option<DomainName>,
}

impl SearchRequest {
    /// Validate against the configured domain list.
    ///
    /// `q` is required unless `qtype` is `all`.
    pub fn validate(&self, config: &FleetConfig) -> Result<Query, QueryError> {
        let qtype: QueryType = self.qtype.parse()?;
        let q = self.q.trim().to_string();
        if qtype != QueryType::All && q.is_empty() {
            return Err(QueryError::EmptyQuery(qtype.to_string()));
        }
        let domain = match self.domain.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) if config.is_domain_configured(name) => Some(DomainName::from(name)),
            Some(name) => return Err(QueryError::UnknownDomain(name.to_string())),
        };
        Ok(Query { qtype, q, domain })
    }

    /// Validate a directory lookup: only `email` and `name` are supported.
    pub fn validate_directory(&self, config: &FleetConfig) -> Result<Query, QueryError> {
        let query = self.validate(config)?;
        match query.qtype {
            QueryType::Email | QueryType::Name => Ok(query),
            other => Err(QueryError::InvalidQueryType(other.to_string())),
        }
    }
}

/// Records matching `query`, in input order.
pub fn search<'a>(records: &'a [DeviceRecord], query: &Query) -> Vec<&'a DeviceRecord> {
    records
        .iter()
        .filter(|r| in_domain(r, query))
        .filter(|r| matches(r, query))
        .collect()
}

/// Result of a directory lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryLookup {
    pub entries: Vec<DirectoryEntry>,
    /// Matching devices skipped because their phone number is malformed.
    pub malformed: usize,
}

/// Directory entries for matching devices that carry a phone number,
/// sorted by name.
pub fn directory(records: &[DeviceRecord], query: &Query) -> DirectoryLookup {
    let mut lookup = DirectoryLookup::default();
    for record in search(records, query) {
        if record.augmentation.phone_number.is_empty() {
            continue;
        }
        match format_phone(&record.augmentation.phone_number) {
            Ok(phone_number) => lookup.entries.push(DirectoryEntry {
                name: record.owner_name.clone(),
                email: record.owner_email.clone(),
                phone_number,
            }),
            Err(_) => lookup.malformed += 1,
        }
    }
    lookup.entries.sort_by(|a, b| a.name.cmp(&b.name));
    lookup
}

fn in_domain(record: &DeviceRecord, query: &Query) -> bool {
    query
        .domain
        .as_ref()
        .map_or(true, |domain| &record.domain == domain)
}

fn matches(record: &DeviceRecord, query: &Query) -> bool {
    let q = query.q.as_str();
    match query.qtype {
        QueryType::All => true,
        QueryType::Email => record.owner_email.eq_ignore_ascii_case(q),
        QueryType::Imei => !record.imei.is_empty() && normalize(&record.imei) == normalize(q),
        QueryType::Sn => {
            !record.serial_number.is_empty() && normalize(&record.serial_number) == normalize(q)
        }
        QueryType::Phone => {
            !record.augmentation.phone_number.is_empty()
                && normalize_phone(&record.augmentation.phone_number) == normalize_phone(q)
        }
        QueryType::Name => contains_ignore_case(&record.owner_name, q),
        QueryType::Notes => contains_ignore_case(&record.augmentation.notes, q),
        QueryType::Status => contains_ignore_case(&record.status, q),
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_uppercase().contains(&needle.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainConfig;
    use crate::types::Augmentation;

    fn config() -> FleetConfig {
        FleetConfig {
            domains: vec![DomainConfig {
                name: DomainName::from("example.com"),
                customer_id: String::new(),
                admin_user: String::new(),
            }],
            ..FleetConfig::default()
        }
    }

    fn device(name: &str, sn: &str, phone: &str) -> DeviceRecord {
        DeviceRecord {
            domain: DomainName::from("example.com"),
            serial_number: sn.into(),
            owner_name: name.into(),
            owner_email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            status: "APPROVED".into(),
            augmentation: Augmentation {
                phone_number: phone.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn request(qtype: &str, q: &str) -> SearchRequest {
        SearchRequest {
            qtype: qtype.into(),
            q: q.into(),
            ..Default::default()
        }
    }

    #[test]
    fn q_required_unless_all() {
        let err = request("name", " ").validate(&config()).unwrap_err();
        assert_eq!(err, QueryError::EmptyQuery("name".into()));
        assert!(request("all", "").validate(&config()).is_ok());
    }

    #[test]
    fn unknown_qtype_and_domain_rejected() {
        assert_eq!(
            request("color", "x").validate(&config()).unwrap_err(),
            QueryError::InvalidQueryType("color".into())
        );
        let mut req = request("all", "");
        req.domain = Some("other.com".into());
        let err = req.validate(&config()).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_DOMAIN");
    }

    #[test]
    fn sn_search_ignores_spacing() {
        let records = vec![device("Anna Lee", "12 34", ""), device("Bob", "99", "")];
        let query = request("sn", "1234").validate(&config()).unwrap();
        let found = search(&records, &query);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].owner_name, "Anna Lee");
    }

    #[test]
    fn status_search_is_substring_case_insensitive() {
        let mut pending = device("Carol", "77", "");
        pending.status = "PENDING".into();
        let records = vec![device("Anna Lee", "1", ""), pending];
        let query = request("status", "pend").validate(&config()).unwrap();
        assert_eq!(search(&records, &query).len(), 1);
    }

    #[test]
    fn directory_by_name_returns_formatted_entry() {
        let records = vec![
            device("Anna Lee", "1", "4155551234"),
            device("Bob", "2", ""),
        ];
        let query = request("name", "ann").validate_directory(&config()).unwrap();
        let lookup = directory(&records, &query);
        assert_eq!(
            lookup.entries,
            vec![DirectoryEntry {
                name: "Anna Lee".into(),
                email: "anna.lee@example.com".into(),
                phone_number: "(415) 555-1234".into(),
            }]
        );
    }

    #[test]
    fn directory_skips_malformed_numbers() {
        let records = vec![device("Anna Lee", "1", "415555123")];
        let query = request("name", "anna").validate_directory(&config()).unwrap();
        let lookup = directory(&records, &query);
        assert!(lookup.entries.is_empty());
        assert_eq!(lookup.malformed, 1);
    }

    #[test]
    fn directory_rejects_other_qtypes() {
        let err = request("sn", "1").validate_directory(&config()).unwrap_err();
        assert_eq!(err, QueryError::InvalidQueryType("sn".into()));
    }
}
