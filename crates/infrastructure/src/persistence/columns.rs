//! Column encodings shared by the stores
//!
//! Timestamps are RFC 3339 UTC text with fixed nanosecond precision, so
//! `ORDER BY` on the column sorts chronologically. Address lists are JSON arrays.

use application::error::ApplicationError;
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, ApplicationError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ApplicationError::Internal(format!("Invalid datetime: {e}")))
}

pub fn parse_optional_datetime(
    s: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ApplicationError> {
    s.map(parse_datetime).transpose()
}

pub fn parse_uuid(s: &str) -> Result<Uuid, ApplicationError> {
    Uuid::parse_str(s).map_err(|e| ApplicationError::Internal(format!("Invalid UUID: {e}")))
}

pub fn encode_addresses(addresses: &[String]) -> Result<String, ApplicationError> {
    serde_json::to_string(addresses)
        .map_err(|e| ApplicationError::Internal(format!("Failed to encode addresses: {e}")))
}

/// Malformed lists read back as empty rather than failing the whole row
pub fn decode_addresses(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}
