//! Operational HTTP endpoints.
//!
//! - `/healthz`          : liveness
//! - `/readyz`           : readiness (503 when draining)
//! - `/metrics`          : OpenMetrics text of local + peer metrics, gzip when accepted
//! - `/metrics/snapshot` : binary snapshot of the local registry only

use std::io::Write;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use flate2::{write::GzEncoder, Compression};

use tallyhub_core::{exposition, protocol::snapshot as snapshot_codec};

use crate::app_state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "ready")
    }
}

pub async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let body = state.merged_view().render();

    if state.cfg().gateway.gzip && accepts_gzip(&headers) {
        match gzip(body.as_bytes()) {
            Ok(compressed) => {
                return (
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE, exposition::CONTENT_TYPE),
                        (header::CONTENT_ENCODING, "gzip"),
                    ],
                    compressed,
                )
                    .into_response();
            }
            Err(e) => tracing::warn!(error = %e, "gzip failed, serving plain metrics"),
        }
    }

    (StatusCode::OK, [(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body).into_response()
}

// Peers only ever export their own registry, so chained aggregators do not
// re-export (and double count) what they pulled from others.
pub async fn snapshot(State(state): State<AppState>) -> Response {
    let body = state.registry().serialize();
    (StatusCode::OK, [(header::CONTENT_TYPE, snapshot_codec::CONTENT_TYPE)], body).into_response()
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|coding| {
            let mut parts = coding.split(';').map(str::trim);
            let name = parts.next().unwrap_or_default();
            let refused = parts.any(|p| p == "q=0" || p == "q=0.0");
            (name.eq_ignore_ascii_case("gzip") || name == "*") && !refused
        })
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)?;
    enc.finish()
}
