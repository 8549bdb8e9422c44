//! # josephine_mcp
//!
//! MCP (Model Context Protocol) tool server for Josephine.
//!
//! Every tool answers with a uniform envelope. Write tools pass through the
//! [`guard::WriteGuard`]: confirmation, idempotency and a per-tool circuit
//! breaker that degrades repeated failures to previews. The server is built as
//! a library crate; `josephine_mcp_server` wires it up on a port.

pub mod breaker;
pub mod envelope;
pub mod error;
pub mod guard;
pub mod registry;
pub mod server;
pub mod tools;

use std::sync::Arc;

use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::info;

use josephine_core::config::GuardConfig;
use josephine_core::idempotency::{IdempotencyStore, PgIdempotencyStore};
use josephine_core::ops::{OpsStore, PgOpsStore};

use crate::breaker::BreakerRegistry;
use crate::guard::WriteGuard;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Build the write guard shared by every MCP session.
pub fn write_guard(config: &GuardConfig, store: Arc<dyn IdempotencyStore>) -> Arc<WriteGuard> {
    let breaker = Arc::new(BreakerRegistry::new(config.breaker));
    Arc::new(WriteGuard::new(config, breaker, store))
}

/// Build an Axum router that serves the MCP Streamable HTTP endpoint at `/mcp`.
///
/// # Arguments
///
/// * `pool` - database pool for the operations schema and idempotency records.
/// * `config` - write guard settings, read once at startup.
/// * `ct` - cancellation token for graceful shutdown of SSE streams.
pub fn mcp_router(pool: PgPool, config: GuardConfig, ct: CancellationToken) -> axum::Router {
    let ops: Arc<dyn OpsStore> = Arc::new(PgOpsStore::new(pool.clone()));
    let store: Arc<dyn IdempotencyStore> = Arc::new(PgIdempotencyStore::new(pool));
    mcp_router_with(ops, write_guard(&config, store), ct)
}

/// Build the router over an explicit data layer and write guard.
pub fn mcp_router_with(
    ops: Arc<dyn OpsStore>,
    guard: Arc<WriteGuard>,
    ct: CancellationToken,
) -> axum::Router {
    info!(
        writes_enabled = guard.writes_enabled(),
        breaker_threshold = guard.breaker().config().threshold(),
        "MCP tool server configured"
    );

    let service: StreamableHttpService<server::JosephineMcpServer, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(server::JosephineMcpServer::new(ops.clone(), guard.clone())),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                stateful_mode: true,
                cancellation_token: ct,
                ..Default::default()
            },
        );

    axum::Router::new().nest_service("/mcp", service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
