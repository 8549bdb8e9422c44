//! MCP server handler: defines the Josephine MCP server and its tools.

use std::sync::Arc;

use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};
use serde_json::json;
use tracing::debug;

use josephine_core::models::ops::{
    EtlTriggerRequest, InventoryAdjustmentRequest, InventoryQuery,
};
use josephine_core::ops::OpsStore;

use crate::envelope::{
    Envelope, EnvelopeParts, Pagination, ToolContext, build_envelope, start_context, summary_line,
    to_mcp_result,
};
use crate::error::ToolError;
use crate::guard::{WriteControl, WriteGuard};
use crate::registry::ToolName;
use crate::tools::types::{
    AdjustInventoryRequest, GetSettingsRequest, ListInventoryRequest, ServerInfoData,
    ToolSummary, TriggerEtlRequest,
};
use crate::tools::{check_delta, clamp_limit, parse_date, parse_uuid, require_uuid, to_data};

/// Name reported by `server_info`.
pub const SERVER_NAME: &str = "josephine-mcp";

/// Josephine MCP server handler.
///
/// A new instance is created per MCP session by the `StreamableHttpService`
/// factory; the data layer and write guard are shared across sessions so the
/// breaker and in-flight state are process-wide.
#[derive(Clone)]
pub struct JosephineMcpServer {
    ops: Arc<dyn OpsStore>,
    guard: Arc<WriteGuard>,
    tool_router: ToolRouter<Self>,
}

/// Render a finished envelope.
fn respond(ctx: &ToolContext, envelope: &Envelope, detail: &str) -> Result<CallToolResult, ErrorData> {
    debug!(
        tool = %ctx.tool(),
        request_id = %ctx.request_id(),
        status = ?envelope.status(),
        duration_ms = envelope.duration_ms(),
        "tool call finished"
    );
    to_mcp_result(&summary_line(ctx.tool(), envelope, detail), envelope)
}

/// Render a validation failure raised before any I/O.
fn reject(ctx: &ToolContext, error: ToolError) -> Result<CallToolResult, ErrorData> {
    let envelope = build_envelope(ctx, EnvelopeParts::error(error));
    respond(ctx, &envelope, "")
}

/// Summary detail for a write, flagging replays.
fn write_detail(envelope: &Envelope, done: &str) -> String {
    if envelope.meta().get("idempotency") == Some(&json!("replay")) {
        format!("{done} (replayed, nothing changed)")
    } else {
        done.to_string()
    }
}

/// Trimmed reason; the write guard rejects blank reasons before any op runs.
fn reason_of(control: &WriteControl) -> String {
    control
        .reason
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

#[tool_router]
impl JosephineMcpServer {
    /// Create a new server instance over a data layer and a shared write guard.
    pub fn new(ops: Arc<dyn OpsStore>, guard: Arc<WriteGuard>) -> Self {
        Self {
            ops,
            guard,
            tool_router: Self::tool_router(),
        }
    }

    /// Return tool definitions registered in this server.
    #[cfg(test)]
    pub(crate) fn list_tools() -> Vec<rmcp::model::Tool> {
        Self::tool_router().list_all()
    }

    #[tool(description = "Server version, whether writes are enabled, and every tool with its contract version")]
    pub(crate) async fn server_info(&self) -> Result<CallToolResult, ErrorData> {
        let ctx = start_context(ToolName::ServerInfo);
        let tools = ToolName::ALL
            .into_iter()
            .map(|tool| ToolSummary {
                name: tool,
                version: tool.version(),
                kind: tool.kind(),
                retry_after_sec: tool
                    .is_write()
                    .then(|| self.guard.breaker().check(tool))
                    .flatten(),
            })
            .collect();
        let info = ServerInfoData {
            server_name: SERVER_NAME,
            server_version: crate::version(),
            writes_enabled: self.guard.writes_enabled(),
            tools,
        };
        let parts = match to_data(&info) {
            Ok(data) => EnvelopeParts::ok(data),
            Err(e) => EnvelopeParts::failure(e),
        };
        let envelope = build_envelope(&ctx, parts);
        respond(&ctx, &envelope, &format!("{SERVER_NAME} {}", crate::version()))
    }

    #[tool(description = "Read the settings document for a location, or the organisation default when locationId is omitted")]
    pub(crate) async fn get_settings(
        &self,
        Parameters(req): Parameters<GetSettingsRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let ctx = start_context(ToolName::GetSettings);
        let location_id = match parse_uuid("locationId", req.location_id.as_deref()) {
            Ok(id) => id,
            Err(e) => return reject(&ctx, e),
        };

        let parts = match self.ops.get_settings(location_id).await {
            Ok(doc) => match to_data(&doc) {
                Ok(data) => EnvelopeParts::ok(data),
                Err(e) => EnvelopeParts::failure(e),
            },
            Err(e) => EnvelopeParts::failure(ToolError::from(e)),
        };
        let envelope = build_envelope(&ctx, parts);
        let detail = match location_id {
            Some(id) => format!("settings for location {id}"),
            None => "organisation default settings".to_string(),
        };
        respond(&ctx, &envelope, &detail)
    }

    #[tool(description = "List inventory items with stock levels, optionally only those below par. Paginated with limit (1-200, default 50) and offset")]
    pub(crate) async fn list_inventory(
        &self,
        Parameters(req): Parameters<ListInventoryRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let ctx = start_context(ToolName::ListInventory);
        let location_id = match parse_uuid("locationId", req.location_id.as_deref()) {
            Ok(id) => id,
            Err(e) => return reject(&ctx, e),
        };
        let offset = req.offset.unwrap_or(0);
        if offset < 0 {
            return reject(&ctx, ToolError::invalid_input("offset must not be negative"));
        }
        let (limit, warning) = clamp_limit(req.limit);
        let below_par_only = req.below_par_only.unwrap_or(false);

        let query = InventoryQuery {
            location_id,
            below_par_only,
            limit,
            offset,
        };
        let (parts, detail) = match self.ops.list_inventory(&query).await {
            Ok(page) => {
                let returned = page.items.len() as i64;
                let pagination = Pagination {
                    limit,
                    offset,
                    total: Some(page.total),
                    has_more: offset + returned < page.total,
                };
                let detail = format!("{returned} of {} items", page.total);
                let parts = match to_data(&page.items) {
                    Ok(data) => EnvelopeParts::ok(data)
                        .with_pagination(pagination)
                        .with_warnings(warning)
                        .with_meta("belowParOnly", json!(below_par_only)),
                    Err(e) => EnvelopeParts::failure(e),
                };
                (parts, detail)
            }
            Err(e) => (EnvelopeParts::failure(ToolError::from(e)), String::new()),
        };
        let envelope = build_envelope(&ctx, parts);
        respond(&ctx, &envelope, &detail)
    }

    #[tool(description = "Adjust the on-hand quantity of an inventory item by a signed delta. Write tool: requires confirm=true, an idempotencyKey and a reason")]
    pub(crate) async fn adjust_inventory(
        &self,
        Parameters(req): Parameters<AdjustInventoryRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let ctx = start_context(ToolName::AdjustInventory);
        let item_id = match require_uuid("itemId", req.item_id.as_deref()) {
            Ok(id) => id,
            Err(e) => return reject(&ctx, e),
        };
        let delta = match check_delta(req.delta) {
            Ok(d) => d,
            Err(e) => return reject(&ctx, e),
        };
        let input = match serde_json::to_value(&req) {
            Ok(v) => v,
            Err(e) => return reject(&ctx, ToolError::invalid_input(e.to_string())),
        };

        let request = InventoryAdjustmentRequest {
            item_id,
            delta,
            note: req.note.clone().filter(|n| !n.trim().is_empty()),
            reason: reason_of(&req.control),
        };
        let ops = self.ops.clone();
        let envelope = self
            .guard
            .run(&ctx, &req.control, &input, || async move {
                ops.adjust_inventory(&request)
                    .await
                    .map_err(ToolError::from)
                    .and_then(|adjustment| to_data(&adjustment))
            })
            .await;
        let detail = write_detail(&envelope, &format!("item {item_id} adjusted by {delta}"));
        respond(&ctx, &envelope, &detail)
    }

    #[tool(description = "Queue an ETL job, optionally reprocessing from a date. Write tool: requires confirm=true, an idempotencyKey and a reason")]
    pub(crate) async fn trigger_etl(
        &self,
        Parameters(req): Parameters<TriggerEtlRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let ctx = start_context(ToolName::TriggerEtl);
        let job = match req.job.as_deref().map(str::trim).filter(|j| !j.is_empty()) {
            Some(job) => job.to_string(),
            None => return reject(&ctx, ToolError::invalid_input("job is required")),
        };
        let since = match parse_date("since", req.since.as_deref()) {
            Ok(d) => d,
            Err(e) => return reject(&ctx, e),
        };
        let input = match serde_json::to_value(&req) {
            Ok(v) => v,
            Err(e) => return reject(&ctx, ToolError::invalid_input(e.to_string())),
        };

        let request = EtlTriggerRequest {
            job: job.clone(),
            since,
            reason: reason_of(&req.control),
        };
        let ops = self.ops.clone();
        let envelope = self
            .guard
            .run(&ctx, &req.control, &input, || async move {
                ops.trigger_etl(&request)
                    .await
                    .map_err(ToolError::from)
                    .and_then(|run| to_data(&run))
            })
            .await;
        let detail = write_detail(&envelope, &format!("job {job} queued"));
        respond(&ctx, &envelope, &detail)
    }
}

#[tool_handler]
impl ServerHandler for JosephineMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Josephine restaurant operations. Every tool returns a JSON envelope with \
                 status, data, warnings and errors. Write tools need confirm=true, a unique \
                 idempotencyKey and a reason; retry with the same key to get the original \
                 result back."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
