//! The metric registry: label-keyed store, exposition and cross-process merge.
//!
//! All state sits behind one `parking_lot::Mutex`. Every public operation
//! takes the lock for its whole duration and does no I/O while holding it, so
//! readers always observe a state produced by some interleaving of completed
//! writes.

mod set;

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::bucket::Boundaries;
use crate::error::Result;
use crate::{exposition, protocol::snapshot};

pub use set::{MetricKey, MetricSet};

/// Everything a registry holds. Also the unit the snapshot codec works on.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RegistryState {
    pub(crate) boundaries: Boundaries,
    pub(crate) sets: BTreeMap<MetricKey, MetricSet>,
}

/// Thread-safe accumulator of counters and latency histograms.
///
/// Construct one per process and hand it to collaborators by reference
/// (usually `Arc<Registry>`).
#[derive(Debug, Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    /// Registry with the default latency buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with custom bucket upper bounds (seconds).
    pub fn with_buckets(buckets: &[f64]) -> Result<Self> {
        Ok(Self::with_boundaries(Boundaries::new(buckets)?))
    }

    pub fn with_boundaries(boundaries: Boundaries) -> Self {
        Self::from_state(RegistryState { boundaries, sets: BTreeMap::new() })
    }

    fn from_state(state: RegistryState) -> Self {
        Self { state: Mutex::new(state) }
    }

    pub fn boundaries(&self) -> Boundaries {
        self.state.lock().boundaries.clone()
    }

    /// Add `delta` to the counter for `label_name=label_value` of `name`.
    /// Unknown keys are created.
    pub fn inc_counter(&self, name: &str, label_name: &str, label_value: &str, delta: u64) {
        let mut state = self.state.lock();
        state
            .sets
            .entry(MetricKey::new(name, label_name))
            .or_default()
            .add_counter(label_value, delta);
    }

    /// Record one observation of `seconds`: bumps the count, adds to the sum
    /// and increments every bucket whose bound is `>= seconds`.
    pub fn observe(&self, name: &str, label_name: &str, label_value: &str, seconds: f64) {
        let mut state = self.state.lock();
        let RegistryState { boundaries, sets } = &mut *state;
        sets.entry(MetricKey::new(name, label_name))
            .or_default()
            .add_observation(boundaries, label_value, seconds);
    }

    pub fn observe_duration(&self, name: &str, label_name: &str, label_value: &str, elapsed: Duration) {
        self.observe(name, label_name, label_value, elapsed.as_secs_f64());
    }

    /// Render the full registry as OpenMetrics text, ending with `# EOF`.
    pub fn render(&self) -> String {
        let state = self.state.lock();
        exposition::render(&state.boundaries, &state.sets)
    }

    /// Encode the whole registry (boundaries and sets) as a binary snapshot.
    pub fn serialize(&self) -> Bytes {
        let state = self.state.lock();
        snapshot::encode(&state)
    }

    /// Build a registry from a snapshot produced by [`Registry::serialize`].
    pub fn deserialize(blob: &[u8]) -> Result<Self> {
        Ok(Self::from_state(snapshot::decode(blob)?))
    }

    /// Replace this registry's state with a decoded snapshot.
    ///
    /// The blob is decoded completely before the lock is taken; on error the
    /// registry is left untouched.
    pub fn deserialize_into(&self, blob: &[u8]) -> Result<()> {
        let decoded = snapshot::decode(blob)?;
        *self.state.lock() = decoded;
        Ok(())
    }

    /// Add every accumulator of `other` into `self`.
    ///
    /// `other` is copied under its own lock, then folded in under `self`'s,
    /// so the two locks are never held at once. Keys missing in `self` are
    /// adopted; present ones are summed per label value and per bucket name.
    /// Buckets `self` has no boundary for are dropped.
    pub fn merge(&self, other: &Registry) {
        let incoming = other.state.lock().clone();
        self.absorb(incoming);
    }

    fn absorb(&self, incoming: RegistryState) {
        let mut state = self.state.lock();
        let RegistryState { boundaries, sets } = &mut *state;
        if *boundaries != incoming.boundaries {
            tracing::warn!(
                local = boundaries.len(),
                incoming = incoming.boundaries.len(),
                "merging registry with different histogram boundaries"
            );
        }

        let mut dropped = 0;
        for (key, set) in incoming.sets {
            dropped += sets.entry(key).or_default().absorb(set, boundaries);
        }
        if dropped > 0 {
            tracing::warn!(dropped, "discarded buckets with unknown boundaries during merge");
        }
    }

    /// Copy of the accumulators stored for `(name, label_name)`.
    pub fn metric_set(&self, name: &str, label_name: &str) -> Option<MetricSet> {
        self.state.lock().sets.get(&MetricKey::new(name, label_name)).cloned()
    }

    pub fn keys(&self) -> Vec<MetricKey> {
        self.state.lock().sets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().sets.is_empty()
    }
}
