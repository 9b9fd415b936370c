//! Portcullis gateway library entry.
//!
//! Wires configuration, mechanism prototypes, rule pipelines, outbound
//! endpoints and the HTTP decision surface into one gateway stack. Consumed
//! by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod endpoint;
pub mod mechanisms;
pub mod router;
pub mod rules;
pub mod transport;
