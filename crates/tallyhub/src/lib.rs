//! Top-level facade crate for tallyhub.
//!
//! Re-exports the registry core and the gateway library so users can depend on a single crate.

pub mod core {
    pub use tallyhub_core::*;
}

pub mod gateway {
    pub use tallyhub_gateway::*;
}

pub use tallyhub_core::{Registry, Result, TallyError};
