//! Error taxonomy surfaced to MCP callers.
//!
//! The code set is closed: adding a variant is a contract change for every
//! client that switches on `errors[].code`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use josephine_core::ops::OpsError;

/// Machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidInput,
    MissingConfirm,
    MissingIdempotencyKey,
    MissingReason,
    WritesDisabled,
    RlsDenied,
    NotFound,
    NotSupported,
    Conflict,
    UpstreamError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::MissingConfirm => "missing_confirm",
            ErrorCode::MissingIdempotencyKey => "missing_idempotency_key",
            ErrorCode::MissingReason => "missing_reason",
            ErrorCode::WritesDisabled => "writes_disabled",
            ErrorCode::RlsDenied => "rls_denied",
            ErrorCode::NotFound => "not_found",
            ErrorCode::NotSupported => "not_supported",
            ErrorCode::Conflict => "conflict",
            ErrorCode::UpstreamError => "upstream_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool failure: code, human-readable message and optional remediation.
///
/// `hint` is serialized as `null` when absent so the error object always has
/// the same keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
    pub hint: Option<String>,
}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamError, message)
    }

    /// The idempotency lookup failed and the guard is configured fail-closed.
    pub fn idempotency_unavailable() -> Self {
        Self::upstream("The idempotency store is unavailable")
            .with_hint("Retry later; the call was not applied")
    }
}

impl From<OpsError> for ToolError {
    fn from(e: OpsError) -> Self {
        match e {
            OpsError::NotFound(what) => ToolError::new(ErrorCode::NotFound, format!("Not found: {what}")),
            OpsError::AccessDenied(_) => ToolError::new(
                ErrorCode::RlsDenied,
                "The database row-level policy denied this operation",
            )
            .with_hint("Check that the server's database role may access this location"),
            OpsError::NotSupported(_) => ToolError::new(
                ErrorCode::NotSupported,
                "This operation is not available on the connected database",
            )
            .with_hint("Apply the latest database migrations for the operations schema"),
            OpsError::DbError(_) => ToolError::upstream("The operations database request failed")
                .with_hint("Retry later; the call was not applied"),
        }
    }
}
