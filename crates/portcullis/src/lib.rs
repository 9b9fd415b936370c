//! Top-level facade crate for Portcullis.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use portcullis_core::*;
}

pub mod gateway {
    pub use portcullis_gateway::*;
}
