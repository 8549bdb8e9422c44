//! Postgres-backed idempotency store.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{IdempotencyStore, StoreError};
use crate::models::idempotency::{IdempotencyRecord, NewIdempotencyRecord, STATUS_COMPLETED};

/// Idempotency records in the `mcp_idempotency_keys` table.
#[derive(Clone)]
pub struct PgIdempotencyStore {
    pool: PgPool,
}

impl PgIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotencyStore for PgIdempotencyStore {
    async fn fetch(
        &self,
        tool_name: &str,
        idempotency_key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let row = sqlx::query_as::<_, IdempotencyRecord>(
            r#"
            SELECT tool_name, idempotency_key, request_hash, status,
                   created_at, actor_json, reason, result_json
            FROM mcp_idempotency_keys
            WHERE tool_name = $1 AND idempotency_key = $2
            "#,
        )
        .bind(tool_name)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert(&self, record: NewIdempotencyRecord) -> Result<(), StoreError> {
        // The WHERE on the conflict arm keeps a record bound to another
        // request untouched; zero affected rows means exactly that.
        let result = sqlx::query(
            r#"
            INSERT INTO mcp_idempotency_keys
                (tool_name, idempotency_key, request_hash, status, actor_json, reason, result_json)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tool_name, idempotency_key) DO UPDATE
            SET status = EXCLUDED.status,
                actor_json = EXCLUDED.actor_json,
                reason = EXCLUDED.reason,
                result_json = EXCLUDED.result_json,
                created_at = now()
            WHERE mcp_idempotency_keys.request_hash = EXCLUDED.request_hash
            "#,
        )
        .bind(&record.tool_name)
        .bind(&record.idempotency_key)
        .bind(&record.request_hash)
        .bind(STATUS_COMPLETED)
        .bind(&record.actor_json)
        .bind(&record.reason)
        .bind(&record.result_json)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::HashMismatch {
                tool: record.tool_name,
                key: record.idempotency_key,
            });
        }
        Ok(())
    }
}
