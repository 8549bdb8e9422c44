//! Tool parameter types and the input validation shared by tool handlers.

pub mod types;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ToolError;

/// Default `list_inventory` page size.
pub const DEFAULT_LIMIT: i64 = 50;
/// Largest accepted `list_inventory` page size.
pub const MAX_LIMIT: i64 = 200;

/// Parse an optional UUID argument.
pub(crate) fn parse_uuid(field: &str, raw: Option<&str>) -> Result<Option<Uuid>, ToolError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(|_| ToolError::invalid_input(format!("{field} must be a UUID, got \"{s}\""))),
    }
}

/// Parse a required UUID argument.
pub(crate) fn require_uuid(field: &str, raw: Option<&str>) -> Result<Uuid, ToolError> {
    parse_uuid(field, raw)?.ok_or_else(|| ToolError::invalid_input(format!("{field} is required")))
}

/// Parse an optional `YYYY-MM-DD` date.
pub(crate) fn parse_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ToolError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                ToolError::invalid_input(format!("{field} must be a date (YYYY-MM-DD), got \"{s}\""))
            }),
    }
}

/// Clamp a requested page size into `1..=MAX_LIMIT`. Returns the effective
/// limit and a warning when the request was changed.
pub(crate) fn clamp_limit(requested: Option<i64>) -> (i64, Option<String>) {
    let Some(limit) = requested else {
        return (DEFAULT_LIMIT, None);
    };
    let clamped = limit.clamp(1, MAX_LIMIT);
    if clamped == limit {
        (limit, None)
    } else {
        (clamped, Some(format!("limit {limit} was clamped to {clamped}")))
    }
}

/// Validate a stock delta: present, finite and non-zero.
pub(crate) fn check_delta(delta: Option<f64>) -> Result<f64, ToolError> {
    match delta {
        None => Err(ToolError::invalid_input("delta is required")),
        Some(d) if !d.is_finite() => Err(ToolError::invalid_input("delta must be a finite number")),
        Some(d) if d == 0.0 => Err(ToolError::invalid_input("delta must not be zero")
            .with_hint("Use a positive delta to add stock and a negative one to remove it")),
        Some(d) => Ok(d),
    }
}

/// Serialize tool output into envelope data.
pub(crate) fn to_data<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value)
        .map_err(|e| ToolError::upstream(format!("could not encode the result: {e}")))
}
