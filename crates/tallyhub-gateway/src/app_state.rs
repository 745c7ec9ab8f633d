//! Shared application state for the tallyhub gateway.
//!
//! Owns the process's single `Registry`. Every collaborator (HTTP handlers,
//! ingest listener, aggregator) gets it from here instead of a global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tallyhub_core::error::Result;
use tallyhub_core::Registry;

use crate::aggregate::{self, PeerTable};
use crate::config::TallyConfig;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    registry: Arc<Registry>,
}

struct AppStateInner {
    cfg: TallyConfig,
    peers: PeerTable,
    draining: AtomicBool,
}

impl AppState {
    /// Build application state with a fresh registry using the configured buckets.
    pub fn new(cfg: TallyConfig) -> Result<Self> {
        let registry = Registry::with_boundaries(cfg.histogram.boundaries()?);
        Ok(Self::with_registry(cfg, Arc::new(registry)))
    }

    /// Build application state around an existing registry.
    pub fn with_registry(cfg: TallyConfig, registry: Arc<Registry>) -> Self {
        let peers = PeerTable::new(&cfg.aggregate.peers);
        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                peers,
                draining: AtomicBool::new(false),
            }),
            registry,
        }
    }

    pub fn cfg(&self) -> &TallyConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn peers(&self) -> &PeerTable {
        &self.inner.peers
    }

    /// Local registry plus the latest snapshot of every peer.
    pub fn merged_view(&self) -> Registry {
        aggregate::merged_view(&self.registry, &self.inner.peers)
    }

    /// Mark draining state.
    pub fn set_draining(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
    }

    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }
}
