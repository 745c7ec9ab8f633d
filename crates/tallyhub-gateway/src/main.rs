//! tallyhub gateway
//!
//! - `/metrics` and `/metrics/snapshot` over HTTP
//! - optional TCP ingest of JSON observation lines
//! - optional fetch-and-merge of peer snapshots
//!
//! Usage: `tallyhub-gateway [config.yaml]` (default `tallyhub.yaml`).

use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

use tallyhub_core::error::{Result, TallyError};
use tallyhub_gateway::{aggregate, app_state::AppState, config, ingest, router};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "tallyhub.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.gateway.listen_addr()?;

    let state = AppState::new(cfg)?;
    let _ingest = ingest::spawn(state.clone()).await?;
    let _aggregator = aggregate::spawn_aggregator(state.clone())?;

    let app = router::build_router(state.clone());

    tracing::info!(%listen, config = %path, "tallyhub-gateway starting");
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| TallyError::Internal(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .map_err(|e| TallyError::Internal(format!("server failed: {e}")))?;

    tracing::info!("tallyhub-gateway stopped");
    Ok(())
}

async fn shutdown_signal(state: AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
    }
    state.set_draining();
    tracing::info!("draining");
}
