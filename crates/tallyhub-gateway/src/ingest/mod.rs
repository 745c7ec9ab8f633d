//! TCP line listener for pushed observations.
//!
//! Clients keep one connection open and write one JSON observation per line
//! (see `tallyhub_core::protocol::line`). Lines that fail to decode are
//! counted and skipped; a line longer than `max_line_bytes` closes the
//! connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use tallyhub_core::error::{Result, TallyError};
use tallyhub_core::protocol::line::decode_line;
use tallyhub_core::Registry;

use crate::app_state::AppState;

const LINES_METRIC: &str = "tallyhub_ingest_lines";
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bind the configured ingest address and start accepting.
/// Returns `None` when ingest is not configured.
pub async fn spawn(state: AppState) -> Result<Option<JoinHandle<()>>> {
    let Some(ingest) = &state.cfg().ingest else {
        return Ok(None);
    };
    let addr = ingest.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| TallyError::Internal(format!("ingest bind {addr} failed: {e}")))?;
    tracing::info!(%addr, "ingest listener starting");
    Ok(Some(tokio::spawn(serve(listener, state))))
}

/// Accept loop. Stops once draining has started; a connection accepted
/// after that is dropped unserved.
pub async fn serve(listener: TcpListener, state: AppState) {
    let max_line = state
        .cfg()
        .ingest
        .as_ref()
        .map(|i| i.max_line_bytes)
        .unwrap_or(4096);

    loop {
        if state.is_draining() {
            tracing::info!("ingest listener stopping");
            break;
        }
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                // EMFILE and friends persist until connections close.
                tracing::warn!(error = %e, "ingest accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        if state.is_draining() {
            break;
        }
        let registry = state.registry();
        tokio::spawn(async move {
            if let Err(e) = handle_conn(stream, peer, registry, max_line).await {
                tracing::debug!(%peer, error = %e, "ingest connection closed with error");
            }
        });
    }
}

async fn handle_conn(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<Registry>,
    max_line: usize,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(256);
    let limit = max_line as u64 + 1;

    loop {
        buf.clear();
        let n = (&mut reader).take(limit).read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        if buf.last() != Some(&b'\n') && n as u64 == limit {
            tracing::warn!(%peer, max_line, "ingest line too long, closing connection");
            return Ok(());
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(s) => s.trim_end_matches(['\n', '\r']),
            Err(_) => {
                registry.inc_counter(LINES_METRIC, "outcome", "rejected", 1);
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match decode_line(line) {
            Ok(obs) => {
                obs.apply(&registry);
                registry.inc_counter(LINES_METRIC, "outcome", "accepted", 1);
            }
            Err(e) => {
                registry.inc_counter(LINES_METRIC, "outcome", "rejected", 1);
                tracing::debug!(%peer, error = %e, "ingest line rejected");
            }
        }
    }
}
