//! Restaurant-operations models returned by the business database.
//!
//! Quantities are cast to `float8` in SQL so they decode as `f64`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Settings document for a location (or the organisation default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    pub location_id: Option<Uuid>,
    pub settings: serde_json::Value,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A stock-tracked inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Uuid,
    pub location_id: Uuid,
    pub name: String,
    pub unit: String,
    pub on_hand: f64,
    pub par_level: Option<f64>,
}

/// Filter and page for `list_inventory`.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryQuery {
    pub location_id: Option<Uuid>,
    pub below_par_only: bool,
    pub limit: i64,
    pub offset: i64,
}

/// One page of inventory items.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryPage {
    pub items: Vec<InventoryItem>,
    pub total: i64,
}

/// Request to move stock for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryAdjustmentRequest {
    pub item_id: Uuid,
    pub delta: f64,
    pub note: Option<String>,
    pub reason: String,
}

/// Result of a stock movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAdjustment {
    pub movement_id: Uuid,
    pub item_id: Uuid,
    pub delta: f64,
    pub on_hand_before: f64,
    pub on_hand_after: f64,
    pub created_at: DateTime<Utc>,
}

/// Request to queue an ETL job.
#[derive(Debug, Clone, PartialEq)]
pub struct EtlTriggerRequest {
    pub job: String,
    pub since: Option<NaiveDate>,
    pub reason: String,
}

/// A queued ETL run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EtlRun {
    pub run_id: Uuid,
    pub job: String,
    pub status: String,
    pub queued_at: DateTime<Utc>,
}
