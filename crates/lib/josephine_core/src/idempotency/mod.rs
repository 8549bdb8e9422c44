//! Idempotency guard for write tools.
//!
//! A retried write (same tool, same idempotency key, same request) replays the
//! stored result instead of mutating twice; reusing a key for a different
//! request is a conflict. Records are written only after a successful
//! mutation.

pub mod hash;
pub mod memory;
pub mod queries;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::IdempotencyFailMode;
use crate::models::idempotency::{IdempotencyRecord, NewIdempotencyRecord};

pub use hash::compute_request_hash;
pub use memory::MemoryIdempotencyStore;
pub use queries::PgIdempotencyStore;

/// Idempotency store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is already stored with a different request hash.
    #[error("Idempotency key {key} for {tool} is already bound to another request")]
    HashMismatch { tool: String, key: String },

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

/// Durable storage for completed write calls.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Fetch the record for `(tool_name, idempotency_key)`, if any.
    async fn fetch(
        &self,
        tool_name: &str,
        idempotency_key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Insert the record, or overwrite an existing record for the same key
    /// carrying the same request hash. A different stored hash yields
    /// [`StoreError::HashMismatch`].
    async fn upsert(&self, record: NewIdempotencyRecord) -> Result<(), StoreError>;
}

/// Outcome of an idempotency check.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyDecision {
    /// No prior completion: execute the write.
    Proceed,
    /// Same request already completed: return this result verbatim.
    Replay(serde_json::Value),
    /// Key already used for a different request: reject.
    Conflict { stored_hash: String },
}

impl IdempotencyDecision {
    /// Short label used in logs and envelope metadata.
    pub fn action(&self) -> &'static str {
        match self {
            IdempotencyDecision::Proceed => "proceed",
            IdempotencyDecision::Replay(_) => "replay",
            IdempotencyDecision::Conflict { .. } => "conflict",
        }
    }
}

/// Check a store for a prior completion of `(tool_name, idempotency_key)`.
///
/// A failed lookup is reported as `Err` so the caller can apply its failure
/// policy; see [`IdempotencyGuard::check`].
pub async fn check_idempotency(
    store: &dyn IdempotencyStore,
    tool_name: &str,
    idempotency_key: &str,
    request_hash: &str,
) -> Result<IdempotencyDecision, StoreError> {
    let decision = match store.fetch(tool_name, idempotency_key).await? {
        None => IdempotencyDecision::Proceed,
        Some(record) if record.request_hash == request_hash => {
            IdempotencyDecision::Replay(record.result_json)
        }
        Some(record) => IdempotencyDecision::Conflict {
            stored_hash: record.request_hash,
        },
    };
    debug!(
        tool = tool_name,
        key = idempotency_key,
        action = decision.action(),
        "idempotency check"
    );
    Ok(decision)
}

/// Record a completed write. Failures are logged and swallowed: the mutation
/// has already happened, and a lost record only costs dedup of a later retry.
pub async fn store_idempotency(store: &dyn IdempotencyStore, record: NewIdempotencyRecord) {
    let tool = record.tool_name.clone();
    let key = record.idempotency_key.clone();
    match store.upsert(record).await {
        Ok(()) => debug!(tool = %tool, key = %key, "idempotency record stored"),
        Err(e @ StoreError::HashMismatch { .. }) => {
            warn!(tool = %tool, key = %key, "idempotency record not stored: {e}");
        }
        Err(e) => warn!(tool = %tool, key = %key, "failed to store idempotency record: {e}"),
    }
}

/// Store handle plus lookup failure policy.
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn IdempotencyStore>,
    fail_mode: IdempotencyFailMode,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn IdempotencyStore>, fail_mode: IdempotencyFailMode) -> Self {
        Self { store, fail_mode }
    }

    /// Classify a write call as proceed, replay or conflict.
    ///
    /// When the lookup fails and the guard is fail-open, the call proceeds
    /// (logged). When fail-closed, the store error is returned.
    pub async fn check(
        &self,
        tool_name: &str,
        idempotency_key: &str,
        request_hash: &str,
    ) -> Result<IdempotencyDecision, StoreError> {
        match check_idempotency(self.store.as_ref(), tool_name, idempotency_key, request_hash).await
        {
            Ok(decision) => Ok(decision),
            Err(e) => match self.fail_mode {
                IdempotencyFailMode::Open => {
                    warn!(
                        tool = tool_name,
                        key = idempotency_key,
                        "idempotency lookup failed, proceeding without dedup: {e}"
                    );
                    Ok(IdempotencyDecision::Proceed)
                }
                IdempotencyFailMode::Closed => {
                    warn!(
                        tool = tool_name,
                        key = idempotency_key,
                        "idempotency lookup failed, rejecting write: {e}"
                    );
                    Err(e)
                }
            },
        }
    }

    /// Persist a completed call; never fails.
    pub async fn store(&self, record: NewIdempotencyRecord) {
        store_idempotency(self.store.as_ref(), record).await;
    }
}
