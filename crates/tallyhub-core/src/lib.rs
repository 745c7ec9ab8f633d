//! tallyhub core: the in-process metric registry and its wire formats.
//!
//! A [`Registry`] accumulates labeled counters and latency histograms under a
//! single lock, renders them as OpenMetrics text, and round-trips through a
//! binary snapshot so registries from separate processes can be merged.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `TallyError`/`Result` so a bad snapshot or client line never
//! takes the process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod bucket;
pub mod error;
pub mod exposition;
pub mod protocol;
pub mod registry;

pub use bucket::{Boundaries, BucketBoundary, DEFAULT_BUCKETS};
/// Shared result type.
pub use error::{DecodeError, Result, TallyError};
pub use registry::{MetricKey, MetricSet, Registry};
