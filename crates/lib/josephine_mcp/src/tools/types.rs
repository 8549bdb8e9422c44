//! Parameter and response types for the Josephine MCP tools.
//!
//! Business fields the tools validate themselves are `Option` so a missing
//! value comes back as an `invalid_input` envelope instead of a protocol
//! error.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::guard::WriteControl;
use crate::registry::{ToolKind, ToolName};

/// Parameters for `get_settings`.
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetSettingsRequest {
    /// Location UUID. Omit for the organisation default.
    pub location_id: Option<String>,
}

/// Parameters for `list_inventory`.
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListInventoryRequest {
    /// Restrict to one location (UUID).
    pub location_id: Option<String>,
    /// Only items whose stock is below their par level.
    pub below_par_only: Option<bool>,
    /// Page size, 1 to 200. Defaults to 50.
    pub limit: Option<i64>,
    /// Items to skip. Defaults to 0.
    pub offset: Option<i64>,
}

/// Parameters for `adjust_inventory`.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustInventoryRequest {
    /// Inventory item UUID.
    pub item_id: Option<String>,
    /// Signed quantity change in the item's unit. Must be non-zero.
    pub delta: Option<f64>,
    /// Free-text note stored with the movement.
    pub note: Option<String>,
    #[serde(flatten)]
    pub control: WriteControl,
}

/// Parameters for `trigger_etl`.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEtlRequest {
    /// Job name, e.g. "sales_daily".
    pub job: Option<String>,
    /// Reprocess from this date (YYYY-MM-DD).
    pub since: Option<String>,
    #[serde(flatten)]
    pub control: WriteControl,
}

/// One row of the `server_info` tool table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    pub name: ToolName,
    pub version: &'static str,
    pub kind: ToolKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_sec: Option<u64>,
}

/// Data returned by `server_info`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfoData {
    pub server_name: &'static str,
    pub server_version: &'static str,
    pub writes_enabled: bool,
    pub tools: Vec<ToolSummary>,
}
