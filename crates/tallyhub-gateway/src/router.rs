//! Axum router wiring for the exposition endpoints.

use axum::{routing::get, Router};

use crate::{aggregate::SNAPSHOT_PATH, app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .route(SNAPSHOT_PATH, get(ops::snapshot))
        .with_state(state)
}
