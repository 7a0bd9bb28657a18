use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tracing::{info, warn};

use taskmill_core::TaskmillConfig;
use taskmill_scheduler::SchedulerEngine;
use taskmill_store::TaskStore;

mod app;
mod http;
#[cfg(test)]
mod tests;

/// Connection bootstrap: bounded attempts with a short delay, so a database
/// that is briefly locked at startup does not kill the service, but a truly
/// unreachable one fails fast.
const DB_OPEN_ATTEMPTS: u32 = 5;
const DB_OPEN_RETRY_DELAY: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "taskmill_gateway=info,taskmill_scheduler=info,taskmill_store=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    // load config: explicit env path > ./taskmill.toml; a missing database
    // path is startup-fatal.
    let config_path = std::env::var("TASKMILL_CONFIG").ok();
    let config = TaskmillConfig::load(config_path.as_deref())?;

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    // each subsystem gets its own connection for thread safety
    let api_store = TaskStore::new(open_with_retry(&db_path).await?)?;
    let engine_store = Arc::new(TaskStore::new(open_with_retry(&db_path).await?)?);

    // spawn the scheduler engine loop in the background
    let engine = SchedulerEngine::new(engine_store, &config.scheduler);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine_task = tokio::spawn(engine.run(shutdown_rx));

    let state = Arc::new(app::AppState::new(api_store));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    info!("taskmill gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // stop polling and let in-flight executions finish before exit
    let _ = shutdown_tx.send(true);
    engine_task.await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

/// Open the database with bounded retry, verifying each connection with a
/// trivial query before handing it out.
async fn open_with_retry(path: &str) -> anyhow::Result<Connection> {
    let mut last_err: Option<anyhow::Error> = None;

    for attempt in 1..=DB_OPEN_ATTEMPTS {
        match Connection::open(path) {
            Ok(conn) => match conn.execute_batch("PRAGMA journal_mode=WAL;") {
                Ok(()) => return Ok(conn),
                Err(e) => {
                    warn!(attempt, error = %e, "database liveness check failed");
                    last_err = Some(e.into());
                }
            },
            Err(e) => {
                warn!(attempt, error = %e, "database open failed");
                last_err = Some(e.into());
            }
        }
        tokio::time::sleep(DB_OPEN_RETRY_DELAY).await;
    }

    Err(last_err.unwrap_or_else(|| {
        anyhow::anyhow!("database unreachable after {DB_OPEN_ATTEMPTS} attempts")
    }))
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
