//! tallyhub gateway library entry.
//!
//! Wires the core registry into a process: strict YAML config, HTTP
//! exposition endpoints, a TCP ingest listener for pushed observations and a
//! fetch-and-merge loop that folds peer snapshots into one view. Consumed by
//! the binary (`main.rs`) and by integration tests.

pub mod aggregate;
pub mod app_state;
pub mod config;
pub mod ingest;
pub mod ops;
pub mod router;
