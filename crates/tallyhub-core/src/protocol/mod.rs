//! Wire formats.
//!
//! - `snapshot`: versioned binary encoding of a whole registry, used to ship
//!   one process's metrics to an aggregator.
//! - `line`: newline-delimited JSON observations pushed by client libraries.
//!
//! Both decoders are panic-free: malformed input is reported as an error,
//! never by panicking or indexing raw buffers.

pub mod line;
pub mod snapshot;
