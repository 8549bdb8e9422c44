//! Idempotency record models.

use chrono::{DateTime, Utc};

/// Status written for a completed write call.
pub const STATUS_COMPLETED: &str = "completed";

/// A completed write-tool call, keyed by `(tool_name, idempotency_key)`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct IdempotencyRecord {
    pub tool_name: String,
    pub idempotency_key: String,
    pub request_hash: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub actor_json: Option<serde_json::Value>,
    pub reason: String,
    pub result_json: serde_json::Value,
}

/// Fields needed to write an [`IdempotencyRecord`]; `created_at` is set by
/// the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIdempotencyRecord {
    pub tool_name: String,
    pub idempotency_key: String,
    pub request_hash: String,
    pub reason: String,
    pub actor_json: Option<serde_json::Value>,
    pub result_json: serde_json::Value,
}
