//! Operations queries against the business schema.
//!
//! Reads go straight to the tables; writes go through the application's RPC
//! functions so that stock ledgers and job queues stay consistent.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{OpsError, OpsStore};
use crate::models::ops::{
    EtlRun, EtlTriggerRequest, InventoryAdjustment, InventoryAdjustmentRequest, InventoryItem,
    InventoryPage, InventoryQuery, SettingsDocument,
};
use crate::ids;

/// [`OpsStore`] over a Postgres pool.
#[derive(Clone)]
pub struct PgOpsStore {
    pool: PgPool,
}

impl PgOpsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OpsStore for PgOpsStore {
    async fn get_settings(&self, location_id: Option<Uuid>) -> Result<SettingsDocument, OpsError> {
        let row = sqlx::query_as::<_, (serde_json::Value, chrono::DateTime<chrono::Utc>)>(
            r#"
            SELECT settings, updated_at
            FROM location_settings
            WHERE ($1::uuid IS NULL AND location_id IS NULL) OR location_id = $1::uuid
            "#,
        )
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(OpsError::classify)?;

        match row {
            Some((settings, updated_at)) => Ok(SettingsDocument {
                location_id,
                settings,
                updated_at: Some(updated_at),
            }),
            None => Err(OpsError::NotFound(match location_id {
                Some(id) => format!("settings for location {id}"),
                None => "default settings".to_string(),
            })),
        }
    }

    async fn list_inventory(&self, query: &InventoryQuery) -> Result<InventoryPage, OpsError> {
        let items = sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT id, location_id, name, unit,
                   on_hand::float8 AS on_hand, par_level::float8 AS par_level
            FROM inventory_items
            WHERE ($1::uuid IS NULL OR location_id = $1::uuid)
              AND (NOT $2 OR (par_level IS NOT NULL AND on_hand < par_level))
            ORDER BY name, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(query.location_id)
        .bind(query.below_par_only)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(OpsError::classify)?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM inventory_items
            WHERE ($1::uuid IS NULL OR location_id = $1::uuid)
              AND (NOT $2 OR (par_level IS NOT NULL AND on_hand < par_level))
            "#,
        )
        .bind(query.location_id)
        .bind(query.below_par_only)
        .fetch_one(&self.pool)
        .await
        .map_err(OpsError::classify)?;

        Ok(InventoryPage { items, total })
    }

    async fn adjust_inventory(
        &self,
        request: &InventoryAdjustmentRequest,
    ) -> Result<InventoryAdjustment, OpsError> {
        let row = sqlx::query_as::<_, InventoryAdjustment>(
            r#"
            SELECT movement_id, item_id, delta::float8 AS delta,
                   on_hand_before::float8 AS on_hand_before,
                   on_hand_after::float8 AS on_hand_after, created_at
            FROM rpc_adjust_inventory($1, $2, $3, $4)
            "#,
        )
        .bind(request.item_id)
        .bind(request.delta)
        .bind(&request.note)
        .bind(&request.reason)
        .fetch_one(&self.pool)
        .await
        .map_err(OpsError::classify)?;
        Ok(row)
    }

    async fn trigger_etl(&self, request: &EtlTriggerRequest) -> Result<EtlRun, OpsError> {
        let row = sqlx::query_as::<_, EtlRun>(
            r#"
            SELECT run_id, job, status, queued_at
            FROM rpc_trigger_etl($1, $2, $3, $4)
            "#,
        )
        .bind(ids::run_id())
        .bind(&request.job)
        .bind(request.since)
        .bind(&request.reason)
        .fetch_one(&self.pool)
        .await
        .map_err(OpsError::classify)?;
        Ok(row)
    }
}
