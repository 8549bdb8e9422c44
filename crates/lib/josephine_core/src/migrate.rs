//! Embedded schema for the MCP server's own tables.
//!
//! Only `mcp_idempotency_keys` lives here; the business schema is owned and
//! migrated by the main application.

use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply pending migrations from `josephine_core/migrations/`.
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await?;
    info!(
        migrations = MIGRATOR.iter().count(),
        "MCP schema up to date"
    );
    Ok(())
}
