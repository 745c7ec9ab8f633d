//! Fetch-and-merge: pulls binary snapshots from peer gateways.
//!
//! Each peer's snapshot is cumulative, so only the latest one per peer is
//! kept and the merged view is rebuilt from scratch on every scrape. Merging
//! successive snapshots into one accumulator would count everything twice.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::task::JoinHandle;

use tallyhub_core::error::{Result, TallyError};
use tallyhub_core::Registry;

use crate::app_state::AppState;

/// Path every gateway serves its local snapshot on.
pub const SNAPSHOT_PATH: &str = "/metrics/snapshot";

const FETCH_METRIC: &str = "tallyhub_peer_fetch";

#[derive(Clone, Default)]
pub struct PeerState {
    pub snapshot: Option<Arc<Registry>>,
    pub last_ok: Option<Instant>,
    pub consecutive_failures: u32,
}

/// Latest snapshot per peer base URL.
#[derive(Default)]
pub struct PeerTable {
    peers: DashMap<String, PeerState>,
}

impl PeerTable {
    pub fn new(peers: &[String]) -> Self {
        let table = Self::default();
        for p in peers {
            table.peers.insert(p.clone(), PeerState::default());
        }
        table
    }

    /// Replace the peer's snapshot.
    pub fn record_success(&self, peer: &str, snapshot: Registry) {
        let mut entry = self.peers.entry(peer.to_owned()).or_default();
        entry.snapshot = Some(Arc::new(snapshot));
        entry.last_ok = Some(Instant::now());
        entry.consecutive_failures = 0;
    }

    /// Count a failed fetch. The previous snapshot is kept.
    pub fn record_failure(&self, peer: &str) -> u32 {
        let mut entry = self.peers.entry(peer.to_owned()).or_default();
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        entry.consecutive_failures
    }

    pub fn get(&self, peer: &str) -> Option<PeerState> {
        self.peers.get(peer).map(|r| r.value().clone())
    }

    pub fn snapshots(&self) -> Vec<Arc<Registry>> {
        self.peers
            .iter()
            .filter_map(|r| r.value().snapshot.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Fresh registry holding `local` plus every peer snapshot.
pub fn merged_view(local: &Registry, peers: &PeerTable) -> Registry {
    let view = Registry::with_boundaries(local.boundaries());
    view.merge(local);
    for snapshot in peers.snapshots() {
        view.merge(&snapshot);
    }
    view
}

pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TallyError::Internal(format!("http client build failed: {e}")))
}

/// GET and decode one peer's snapshot.
pub async fn fetch_snapshot(client: &reqwest::Client, peer: &str) -> Result<Registry> {
    let url = format!("{}{SNAPSHOT_PATH}", peer.trim_end_matches('/'));
    let body = client
        .get(&url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| TallyError::Internal(format!("fetch {url}: {e}")))?
        .bytes()
        .await
        .map_err(|e| TallyError::Internal(format!("read {url}: {e}")))?;
    Registry::deserialize(&body)
}

/// Fetch every configured peer once, concurrently. No retries: a failed peer
/// keeps its previous snapshot until the next cycle.
pub async fn poll_once(state: &AppState, client: &reqwest::Client) {
    let registry = state.registry();
    let fetches = state.cfg().aggregate.peers.iter().map(|peer| async move {
        let started = Instant::now();
        let res = fetch_snapshot(client, peer).await;
        (peer, started.elapsed(), res)
    });

    for (peer, elapsed, res) in join_all(fetches).await {
        registry.observe_duration(FETCH_METRIC, "peer", peer, elapsed);
        match res {
            Ok(snapshot) => {
                registry.inc_counter(FETCH_METRIC, "outcome", "ok", 1);
                tracing::debug!(peer = %peer, keys = snapshot.len(), "peer snapshot merged");
                state.peers().record_success(peer, snapshot);
            }
            Err(e) => {
                registry.inc_counter(FETCH_METRIC, "outcome", "error", 1);
                let failures = state.peers().record_failure(peer);
                tracing::warn!(peer = %peer, failures, error = %e, "peer snapshot fetch failed");
            }
        }
    }
}

/// Start the periodic fetch loop. Returns `None` when no peers are configured.
pub fn spawn_aggregator(state: AppState) -> Result<Option<JoinHandle<()>>> {
    let agg = &state.cfg().aggregate;
    if agg.peers.is_empty() {
        return Ok(None);
    }
    let client = build_client(Duration::from_millis(agg.timeout_ms))?;
    let period = Duration::from_millis(agg.interval_ms);
    tracing::info!(peers = agg.peers.len(), interval_ms = agg.interval_ms, "aggregator starting");

    Ok(Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if state.is_draining() {
                tracing::info!("aggregator stopping");
                break;
            }
            poll_once(&state, &client).await;
        }
    })))
}
