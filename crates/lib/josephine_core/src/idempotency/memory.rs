//! In-process idempotency store for tests and database-less runs.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{IdempotencyStore, StoreError};
use crate::models::idempotency::{IdempotencyRecord, NewIdempotencyRecord, STATUS_COMPLETED};

/// Idempotency records held in a concurrent map keyed by `(tool, key)`.
#[derive(Default)]
pub struct MemoryIdempotencyStore {
    records: DashMap<(String, String), IdempotencyRecord>,
    fetches: AtomicU64,
    upserts: AtomicU64,
}

impl MemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of `fetch` calls served so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of `upsert` calls served so far.
    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn fetch(
        &self,
        tool_name: &str,
        idempotency_key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let key = (tool_name.to_string(), idempotency_key.to_string());
        Ok(self.records.get(&key).map(|r| r.value().clone()))
    }

    async fn upsert(&self, record: NewIdempotencyRecord) -> Result<(), StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        let key = (record.tool_name.clone(), record.idempotency_key.clone());
        let stored = IdempotencyRecord {
            tool_name: record.tool_name,
            idempotency_key: record.idempotency_key,
            request_hash: record.request_hash,
            status: STATUS_COMPLETED.to_string(),
            created_at: Utc::now(),
            actor_json: record.actor_json,
            reason: record.reason,
            result_json: record.result_json,
        };

        match self.records.entry(key) {
            Entry::Occupied(mut existing) => {
                if existing.get().request_hash != stored.request_hash {
                    return Err(StoreError::HashMismatch {
                        tool: stored.tool_name,
                        key: stored.idempotency_key,
                    });
                }
                existing.insert(stored);
            }
            Entry::Vacant(slot) => {
                slot.insert(stored);
            }
        }
        Ok(())
    }
}
