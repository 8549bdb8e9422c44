//! Write guard: admission control for every write tool.
//!
//! Gate order: writes enabled, confirm/idempotency key/reason present,
//! circuit breaker closed, no in-flight call with the same key, idempotency
//! check. Only a call that passes every gate receives a [`WritePermit`] and
//! may mutate. The permit is finalized with [`WriteGuard::complete`] or
//! [`WriteGuard::fail`].

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use josephine_core::config::GuardConfig;
use josephine_core::config::guard::ENV_WRITES_ENABLED;
use josephine_core::idempotency::hash::EXCLUDED_FIELDS;
use josephine_core::idempotency::{
    IdempotencyDecision, IdempotencyGuard, IdempotencyStore, compute_request_hash,
};
use josephine_core::models::idempotency::NewIdempotencyRecord;

use crate::breaker::BreakerRegistry;
use crate::envelope::{Envelope, EnvelopeParts, ToolContext, build_envelope};
use crate::error::{ErrorCode, ToolError};
use crate::registry::ToolName;

/// Longest accepted idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 200;

/// Who is asking for the write, as reported by the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Actor {
    /// Display name of the person or agent.
    pub name: Option<String>,
    /// Role, e.g. "manager" or "chef".
    pub role: Option<String>,
}

/// Control fields shared by every write tool. All optional on the wire so a
/// missing field becomes a taxonomy error rather than a schema rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WriteControl {
    /// Must be `true` to apply the write.
    pub confirm: Option<bool>,
    /// Client-chosen key; retries with the same key and payload replay the
    /// first result.
    pub idempotency_key: Option<String>,
    /// Why the write is being made. Stored with the idempotency record.
    pub reason: Option<String>,
    /// Who is asking.
    pub actor: Option<Actor>,
    /// Optional correlation id. Not part of the request fingerprint.
    pub request_id: Option<String>,
}

/// Validated control fields.
#[derive(Debug, Clone)]
struct CheckedControl {
    idempotency_key: String,
    reason: String,
    actor: Option<Actor>,
}

/// Marks `(tool, key)` as executing until dropped.
struct InFlight {
    map: Arc<DashMap<(ToolName, String), Uuid>>,
    key: (ToolName, String),
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

/// Permission to perform one write.
pub struct WritePermit {
    tool: ToolName,
    request_id: Uuid,
    idempotency_key: String,
    request_hash: String,
    reason: String,
    actor: Option<Actor>,
    _in_flight: InFlight,
}

impl WritePermit {
    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }
}

/// Result of [`WriteGuard::admit`].
pub enum Admission {
    /// All gates passed; perform the mutation.
    Execute(WritePermit),
    /// Answer without mutating (rejection, preview or replay).
    Respond(EnvelopeParts),
}

/// Composes breaker, idempotency and confirmation checks.
pub struct WriteGuard {
    breaker: Arc<BreakerRegistry>,
    idempotency: IdempotencyGuard,
    in_flight: Arc<DashMap<(ToolName, String), Uuid>>,
    writes_enabled: bool,
}

impl WriteGuard {
    pub fn new(
        config: &GuardConfig,
        breaker: Arc<BreakerRegistry>,
        store: Arc<dyn IdempotencyStore>,
    ) -> Self {
        Self {
            breaker,
            idempotency: IdempotencyGuard::new(store, config.idempotency_fail_mode),
            in_flight: Arc::new(DashMap::new()),
            writes_enabled: config.writes_enabled,
        }
    }

    pub fn breaker(&self) -> &Arc<BreakerRegistry> {
        &self.breaker
    }

    pub fn writes_enabled(&self) -> bool {
        self.writes_enabled
    }

    /// Run every gate for a write call. `input` is the full request as JSON;
    /// control fields are stripped from it before fingerprinting.
    pub async fn admit(&self, ctx: &ToolContext, control: &WriteControl, input: &Value) -> Admission {
        let tool = ctx.tool();

        if !self.writes_enabled {
            return Admission::Respond(EnvelopeParts::error(
                ToolError::new(ErrorCode::WritesDisabled, "Write tools are disabled on this server")
                    .with_hint(format!("Set {ENV_WRITES_ENABLED}=true to enable writes")),
            ));
        }

        let control = match check_control(control) {
            Ok(c) => c,
            Err(e) => return Admission::Respond(EnvelopeParts::error(e)),
        };

        if let Some(retry_after_sec) = self.breaker.check(tool) {
            debug!(tool = %tool, retry_after_sec, "write short-circuited to preview");
            return Admission::Respond(preview_parts(tool, input, retry_after_sec));
        }

        let key = (tool, control.idempotency_key.clone());
        let in_flight = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(_) => {
                return Admission::Respond(EnvelopeParts::error(
                    ToolError::new(
                        ErrorCode::Conflict,
                        format!(
                            "A call with idempotency key \"{}\" is already in progress",
                            control.idempotency_key
                        ),
                    )
                    .with_hint("Wait for the first call to finish, then retry with the same key"),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(ctx.request_id());
                InFlight {
                    map: self.in_flight.clone(),
                    key,
                }
            }
        };

        let request_hash = compute_request_hash(tool.as_str(), input);
        let decision = match self
            .idempotency
            .check(tool.as_str(), &control.idempotency_key, &request_hash)
            .await
        {
            Ok(decision) => decision,
            Err(_) => {
                return Admission::Respond(EnvelopeParts::failure(
                    ToolError::idempotency_unavailable(),
                ));
            }
        };

        match decision {
            IdempotencyDecision::Proceed => {
                debug!(tool = %tool, request_id = %ctx.request_id(), "write admitted");
                Admission::Execute(WritePermit {
                    tool,
                    request_id: ctx.request_id(),
                    idempotency_key: control.idempotency_key,
                    request_hash,
                    reason: control.reason,
                    actor: control.actor,
                    _in_flight: in_flight,
                })
            }
            IdempotencyDecision::Replay(result) => {
                debug!(tool = %tool, key = %control.idempotency_key, "replaying stored result");
                Admission::Respond(
                    EnvelopeParts::ok(result)
                        .with_warning(
                            "Replayed the result of an earlier call with the same idempotencyKey; nothing was changed",
                        )
                        .with_meta("idempotency", json!("replay")),
                )
            }
            IdempotencyDecision::Conflict { .. } => Admission::Respond(EnvelopeParts::error(
                ToolError::new(
                    ErrorCode::Conflict,
                    format!(
                        "Idempotency key \"{}\" was already used for a different request",
                        control.idempotency_key
                    ),
                )
                .with_hint("Use a new idempotencyKey for a different request"),
            )),
        }
    }

    /// Bookkeeping after a successful mutation.
    pub async fn complete(&self, permit: WritePermit, result: &Value) {
        let actor_json = permit
            .actor
            .as_ref()
            .and_then(|a| serde_json::to_value(a).ok());
        self.idempotency
            .store(NewIdempotencyRecord {
                tool_name: permit.tool.as_str().to_string(),
                idempotency_key: permit.idempotency_key.clone(),
                request_hash: permit.request_hash.clone(),
                reason: permit.reason.clone(),
                actor_json,
                result_json: result.clone(),
            })
            .await;
        self.breaker.record_success(permit.tool);
        debug!(tool = %permit.tool, request_id = %permit.request_id, "write completed");
    }

    /// Bookkeeping after a failed mutation.
    pub fn fail(&self, permit: WritePermit, error: &ToolError) {
        warn!(
            tool = %permit.tool,
            request_id = %permit.request_id,
            code = %error.code,
            "write failed: {}",
            error.message
        );
        if self.breaker.record_error(permit.tool) {
            warn!(tool = %permit.tool, "tool switched to preview-only until the breaker resets");
        }
    }

    /// Admit, execute `op` when allowed, finalize, and build the envelope.
    pub async fn run<F, Fut>(
        &self,
        ctx: &ToolContext,
        control: &WriteControl,
        input: &Value,
        op: F,
    ) -> Envelope
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ToolError>>,
    {
        let permit = match self.admit(ctx, control, input).await {
            Admission::Execute(permit) => permit,
            Admission::Respond(parts) => return build_envelope(ctx, parts),
        };

        match op().await {
            Ok(data) => {
                self.complete(permit, &data).await;
                build_envelope(ctx, EnvelopeParts::ok(data).with_meta("idempotency", json!("executed")))
            }
            Err(err) => {
                self.fail(permit, &err);
                build_envelope(ctx, EnvelopeParts::failure(err))
            }
        }
    }
}

/// Local checks on the control fields; no I/O.
fn check_control(control: &WriteControl) -> Result<CheckedControl, ToolError> {
    if control.confirm != Some(true) {
        return Err(ToolError::new(
            ErrorCode::MissingConfirm,
            "Write tools require confirm=true",
        )
        .with_hint("Review the change, then call again with confirm=true"));
    }

    let key = control
        .idempotency_key
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if key.is_empty() {
        return Err(ToolError::new(
            ErrorCode::MissingIdempotencyKey,
            "Write tools require an idempotencyKey",
        )
        .with_hint("Send a unique key per logical write, e.g. a UUID; reuse it only for retries"));
    }
    if key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ToolError::invalid_input(format!(
            "idempotencyKey must be at most {MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }

    let reason = control
        .reason
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if reason.is_empty() {
        return Err(ToolError::new(
            ErrorCode::MissingReason,
            "Write tools require a reason",
        )
        .with_hint("Describe in a sentence why this change is being made"));
    }

    Ok(CheckedControl {
        idempotency_key: key.to_string(),
        reason: reason.to_string(),
        actor: control.actor.clone(),
    })
}

/// Preview returned while the tool's breaker is open.
fn preview_parts(tool: ToolName, input: &Value, retry_after_sec: u64) -> EnvelopeParts {
    let mut would_apply = input.clone();
    if let Value::Object(map) = &mut would_apply {
        for field in EXCLUDED_FIELDS {
            map.remove(field);
        }
    }
    EnvelopeParts::preview(json!({
        "applied": false,
        "tool": tool,
        "wouldApply": would_apply,
        "retryAfterSec": retry_after_sec,
    }))
    .with_warning(format!(
        "{tool} is paused after repeated failures; nothing was changed. Retry in {retry_after_sec}s"
    ))
    .with_meta(
        "circuitBreaker",
        json!({ "state": "open", "retryAfterSec": retry_after_sec }),
    )
}

#[cfg(test)]
mod tests;
