//! Josephine MCP tool server binary.
//!
//! Serves the MCP Streamable HTTP endpoint at `/mcp`.
//! Prints `{"mcpPort": N}` to stdout so a parent process can discover the
//! bound port.

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use josephine_core::config::GuardConfig;

/// CLI arguments for the MCP server.
#[derive(Parser, Debug)]
#[command(name = "josephine_mcp_server", about = "Josephine MCP tool server")]
struct Args {
    /// Port to listen on (0 = ephemeral).
    #[arg(long, env = "JOSEPHINE_MCP_PORT", default_value_t = 0)]
    port: u16,

    /// Address to bind.
    #[arg(long, env = "JOSEPHINE_MCP_HOST", default_value = "127.0.0.1")]
    host: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/josephine"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Run as a managed sidecar: exit automatically when the parent process dies.
    ///
    /// When set, the server monitors stdin for EOF. The parent keeps the write
    /// end of the pipe open; if the parent exits the OS closes the pipe and the
    /// server shuts down.
    #[arg(long, default_value_t = false)]
    sidecar: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Write logs to stderr so stdout is reserved for the JSON port message.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,josephine_mcp=debug,josephine_core=debug")
            }),
        )
        .init();

    let args = Args::parse();
    let guard_config = GuardConfig::from_env()?;

    info!(
        port = args.port,
        max_connections = args.max_connections,
        sidecar = args.sidecar,
        "starting josephine_mcp_server"
    );
    info!(
        writes_enabled = guard_config.writes_enabled,
        breaker_threshold = guard_config.breaker.threshold(),
        breaker_window_ms = guard_config.breaker.window().as_millis() as u64,
        breaker_cooldown_ms = guard_config.breaker.cooldown().as_millis() as u64,
        idempotency_fail_mode = ?guard_config.idempotency_fail_mode,
        "write guard configuration"
    );
    if !guard_config.writes_enabled {
        warn!("write tools are disabled; they will answer writes_disabled");
    }

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    josephine_core::migrate::migrate(&pool).await?;

    let ct = CancellationToken::new();
    let app = josephine_mcp::mcp_router(pool, guard_config, ct.clone());

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    let addr = listener.local_addr()?;

    // Report the bound port as JSON on stdout for the parent process.
    println!("{}", serde_json::json!({"mcpPort": addr.port()}));

    if args.sidecar {
        info!("sidecar mode: will exit when parent pipe closes");
        let ct = ct.clone();
        tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut stdin = tokio::io::stdin();
            let mut buf = [0u8; 1];
            // Blocks until the parent dies and the OS closes the pipe.
            let _ = stdin.read(&mut buf).await;
            info!("parent pipe closed, shutting down");
            ct.cancel();
        });
    }

    tokio::spawn({
        let ct = ct.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
            }
            ct.cancel();
        }
    });

    info!(%addr, "MCP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await?;

    info!("MCP server stopped");
    Ok(())
}
