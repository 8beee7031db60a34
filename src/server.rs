//! HTTP server initialization and runtime setup.
//!
//! Handles the database bootstrap, router assembly and the axum server
//! lifecycle. The listener is bound only after the database is reachable.

use crate::bootstrap::{self, DbStatus};
use crate::config::Config;
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// Runs the gateway with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool (bounded retry with backoff)
/// - Session signing service
/// - The middleware pipeline and route table
/// - Axum HTTP server with per-connection peer info
///
/// # Errors
///
/// Returns an error if:
/// - The database stays unreachable past the retry policy
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let (status_tx, status_rx) = watch::channel(DbStatus::Connecting { attempt: 0 });

    let db = bootstrap::connect_postgres(&config, &status_tx).await?;
    tracing::info!("Connected to database");

    let port = config.port;
    let state = AppState::new(Arc::new(config), db, status_rx);
    let app = app_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    })
    .await?;

    Ok(())
}
