//! Identifier and phone-number canonicalization.
//!
//! Applied to serial numbers and IMEIs before every comparison or key
//! construction, so `"123 456 789"` and `"123456789"` compare equal.

use crate::error::RecordError;

/// Strip every whitespace character from `raw`.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Canonical stored form of a phone number: whitespace and the usual
/// formatting punctuation removed.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '-' | '.'))
        .collect()
}

/// Format a 10-digit number as `(XXX) YYY-ZZZZ`.
///
/// Anything that is not exactly ten ASCII digits after [`normalize_phone`] is
/// rejected; nothing is truncated or padded.
pub fn format_phone(raw: &str) -> Result<String, RecordError> {
    let digits = normalize_phone(raw);
    if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RecordError::MalformedPhoneNumber {
            raw: raw.to_string(),
        });
    }
    let (area, rest) = digits.split_at(3);
    let (exchange, line) = rest.split_at(3);
    Ok(format!("({area}) {exchange}-{line}"))
}

/// Domain part of an email address, if it has one.
pub fn email_domain(email: &str) -> Option<&str> {
    let (_, domain) = email.trim().rsplit_once('@')?;
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}
