//! Transport layer (HTTP decision endpoint).
//!
//! Adapts inbound HTTP requests to the rule pipeline and renders decisions
//! back as HTTP responses.

pub mod decision;
pub mod request_data;
