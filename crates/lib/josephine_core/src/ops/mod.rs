//! Restaurant-operations data access used by MCP tools.
//!
//! The business schema belongs to the main application; this module only
//! reads from it and calls its RPC functions.

pub mod queries;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ops::{
    EtlRun, EtlTriggerRequest, InventoryAdjustment, InventoryAdjustmentRequest, InventoryPage,
    InventoryQuery, SettingsDocument,
};

pub use queries::PgOpsStore;

/// Postgres SQLSTATE for an undefined function.
const SQLSTATE_UNDEFINED_FUNCTION: &str = "42883";
/// Postgres SQLSTATE for an undefined table.
const SQLSTATE_UNDEFINED_TABLE: &str = "42P01";
/// Postgres SQLSTATE for insufficient privilege (also raised by RLS).
const SQLSTATE_INSUFFICIENT_PRIVILEGE: &str = "42501";
/// PL/pgSQL `no_data_found`, raised by RPCs for unknown ids.
const SQLSTATE_NO_DATA_FOUND: &str = "P0002";

/// Operations data-access errors.
#[derive(Debug, Error)]
pub enum OpsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied by row-level policy: {0}")]
    AccessDenied(String),

    #[error("Not supported by this database: {0}")]
    NotSupported(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

impl OpsError {
    /// Translate a driver error into the closest operations error.
    pub fn classify(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return OpsError::NotFound("row not found".into());
        }
        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());
        match code.as_deref() {
            Some(SQLSTATE_UNDEFINED_FUNCTION) | Some(SQLSTATE_UNDEFINED_TABLE) => {
                OpsError::NotSupported(err.to_string())
            }
            Some(SQLSTATE_INSUFFICIENT_PRIVILEGE) => OpsError::AccessDenied(err.to_string()),
            Some(SQLSTATE_NO_DATA_FOUND) => OpsError::NotFound(err.to_string()),
            _ => OpsError::DbError(err),
        }
    }
}

/// Data access behind the MCP tools.
#[async_trait]
pub trait OpsStore: Send + Sync {
    /// Settings for a location, or the organisation default when `None`.
    async fn get_settings(&self, location_id: Option<Uuid>) -> Result<SettingsDocument, OpsError>;

    /// One page of inventory items.
    async fn list_inventory(&self, query: &InventoryQuery) -> Result<InventoryPage, OpsError>;

    /// Apply a stock movement.
    async fn adjust_inventory(
        &self,
        request: &InventoryAdjustmentRequest,
    ) -> Result<InventoryAdjustment, OpsError>;

    /// Queue an ETL job.
    async fn trigger_etl(&self, request: &EtlTriggerRequest) -> Result<EtlRun, OpsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            OpsError::classify(sqlx::Error::RowNotFound),
            OpsError::NotFound(_)
        ));
    }

    #[test]
    fn non_database_errors_stay_db_errors() {
        assert!(matches!(
            OpsError::classify(sqlx::Error::PoolTimedOut),
            OpsError::DbError(_)
        ));
    }
}
