//! Utility functions for the queue service

use crate::error::{QueueError, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Longest accepted display name
pub const MAX_NAME_LEN: usize = 100;

/// Accepted phone length range, in digits
pub const PHONE_DIGITS: std::ops::RangeInclusive<usize> = 6..=15;

/// Country calling code of the hospital; its numbers are kept in national form
pub const HOME_COUNTRY_CODE: &str = "91";
const NATIONAL_DIGITS: usize = 10;

/// Generate a new unique event ID
pub fn generate_event_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Build a token identifier from a ward prefix and a number
pub fn format_token_id(prefix: &str, number: u32) -> String {
    format!("{}{}", prefix, number)
}

/// Trim and check a patient display name
pub fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(QueueError::validation("name is required").into());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(QueueError::validation(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        ))
        .into());
    }
    Ok(name.to_string())
}

/// Trim and check a phone number, returning the key used for duplicate checks.
///
/// Domestic numbers written as `+91XXXXXXXXXX` or `0XXXXXXXXXX` collapse to the
/// ten-digit national number. Other international numbers keep their `+`.
pub fn normalize_phone(phone: &str) -> Result<String> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(QueueError::validation("phone is required").into());
    }

    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if !digits.chars().all(|c| c.is_ascii_digit()) || !PHONE_DIGITS.contains(&digits.len()) {
        return Err(QueueError::validation(format!(
            "phone must contain {} to {} digits",
            PHONE_DIGITS.start(),
            PHONE_DIGITS.end()
        ))
        .into());
    }

    let international = phone.starts_with('+');
    let national = if international {
        digits
            .strip_prefix(HOME_COUNTRY_CODE)
            .filter(|rest| rest.len() == NATIONAL_DIGITS)
    } else {
        digits
            .strip_prefix('0')
            .filter(|rest| rest.len() == NATIONAL_DIGITS)
    };

    Ok(match national {
        Some(number) => number.to_string(),
        None => phone.to_string(),
    })
}

/// Token reference extracted from a check-in scan or a typed token id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInCode {
    pub token: String,
    pub phone: Option<String>,
}

/// Parse either a bare token id (`G4`) or a slip QR payload (`ABH-G4-9876543210`)
pub fn parse_check_in_code(raw: &str) -> Result<CheckInCode> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(QueueError::validation("token or QR data is required").into());
    }

    let mut parts = raw.splitn(3, '-').map(str::trim);
    let first = parts.next().unwrap_or_default();
    let (token, phone) = match (parts.next(), parts.next()) {
        (None, _) => (first, None),
        (Some(token), phone) => (token, phone.filter(|p| !p.is_empty())),
    };

    if token.is_empty() {
        return Err(QueueError::validation(format!("malformed check-in code '{}'", raw)).into());
    }

    Ok(CheckInCode {
        token: token.to_uppercase(),
        phone: phone.map(str::to_string),
    })
}
