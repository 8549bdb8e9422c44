//! Response envelope: the single structure every tool call returns.
//!
//! Optional fields (`pagination`, `warnings`, `errors`, `meta`) are omitted
//! from the JSON when empty; clients treat absence as "none", so the omission
//! is part of the wire contract.

use std::time::Instant;

use rmcp::model::{CallToolResult, Content, ErrorCode as RpcErrorCode, ErrorData};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use josephine_core::ids;

use crate::error::{ErrorCode, ToolError};
use crate::registry::ToolName;

/// Terminal classification of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Preview,
    Error,
    NotSupported,
}

/// Per-call context captured before any I/O.
#[derive(Debug, Clone)]
pub struct ToolContext {
    request_id: Uuid,
    started: Instant,
    tool: ToolName,
}

impl ToolContext {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn tool(&self) -> ToolName {
        self.tool
    }

    /// Milliseconds since the call started, rounded to the nearest ms.
    pub fn elapsed_ms(&self) -> u64 {
        (self.started.elapsed().as_secs_f64() * 1000.0).round() as u64
    }
}

/// Start a tool call: mint a request id and capture the start instant.
pub fn start_context(tool: ToolName) -> ToolContext {
    ToolContext {
        request_id: ids::request_id(),
        started: Instant::now(),
        tool,
    }
}

/// Page position of a list result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
    pub total: Option<i64>,
    pub has_more: bool,
}

/// The envelope's variable parts. The constructors keep the status/data/errors
/// combination valid: errors only ever accompany `error` and `not_supported`,
/// and those never carry data.
#[derive(Debug, Clone)]
pub struct EnvelopeParts {
    status: Status,
    data: Value,
    pagination: Option<Pagination>,
    warnings: Vec<String>,
    errors: Vec<ToolError>,
    meta: Map<String, Value>,
}

impl EnvelopeParts {
    fn with_status(status: Status, data: Value, errors: Vec<ToolError>) -> Self {
        Self {
            status,
            data,
            pagination: None,
            warnings: Vec::new(),
            errors,
            meta: Map::new(),
        }
    }

    pub fn ok(data: Value) -> Self {
        Self::with_status(Status::Ok, data, Vec::new())
    }

    pub fn preview(data: Value) -> Self {
        Self::with_status(Status::Preview, data, Vec::new())
    }

    pub fn error(error: ToolError) -> Self {
        Self::with_status(Status::Error, Value::Null, vec![error])
    }

    pub fn not_supported(error: ToolError) -> Self {
        Self::with_status(Status::NotSupported, Value::Null, vec![error])
    }

    /// `not_supported` for that code, `error` for everything else.
    pub fn failure(error: ToolError) -> Self {
        if error.code == ErrorCode::NotSupported {
            Self::not_supported(error)
        } else {
            Self::error(error)
        }
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

/// One response per tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    status: Status,
    request_id: String,
    duration_ms: u64,
    server_version: &'static str,
    tool_version: &'static str,
    data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ToolError>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    meta: Map<String, Value>,
}

impl Envelope {
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn tool_version(&self) -> &'static str {
        self.tool_version
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[ToolError] {
        &self.errors
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    /// First error code, if any.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.errors.first().map(|e| e.code)
    }
}

/// Assemble the envelope for `ctx`, stamping duration and versions.
pub fn build_envelope(ctx: &ToolContext, parts: EnvelopeParts) -> Envelope {
    Envelope {
        status: parts.status,
        request_id: ctx.request_id.to_string(),
        duration_ms: ctx.elapsed_ms(),
        server_version: crate::version(),
        tool_version: ctx.tool.version(),
        data: parts.data,
        pagination: parts.pagination,
        warnings: parts.warnings,
        errors: parts.errors,
        meta: parts.meta,
    }
}

/// Default one-line summary for an envelope.
pub fn summary_line(tool: ToolName, envelope: &Envelope, detail: &str) -> String {
    match (envelope.status, envelope.errors.first()) {
        (Status::Ok, _) => format!("{tool}: ok - {detail}"),
        (Status::Preview, _) => format!("{tool}: preview only - {detail}"),
        (_, Some(err)) => format!("{tool}: {} - {}", err.code, err.message),
        (status, None) => format!("{tool}: {status:?}"),
    }
}

/// Render the two-channel tool result: a text line and a fenced JSON block
/// with the full envelope.
pub fn to_mcp_result(text_summary: &str, envelope: &Envelope) -> Result<CallToolResult, ErrorData> {
    let json = serde_json::to_string_pretty(envelope)
        .map_err(|e| ErrorData::new(RpcErrorCode::INTERNAL_ERROR, e.to_string(), None))?;
    let content = vec![
        Content::text(text_summary.to_string()),
        Content::text(format!("```json\n{json}\n```")),
    ];
    Ok(match envelope.status {
        Status::Error => CallToolResult::error(content),
        _ => CallToolResult::success(content),
    })
}
