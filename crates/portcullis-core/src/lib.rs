//! Portcullis core: pipeline data types and the shared error surface.
//!
//! This crate defines what flows through a rule pipeline (subject context,
//! request data access, execution context) and the error taxonomy shared by
//! the gateway and mechanism implementations. It carries no transport or
//! runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible
//! paths must surface as `PortcullisError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod auth_data;
pub mod context;
pub mod error;
pub mod subject;

pub use auth_data::{AuthDataSource, StaticAuthData};
pub use context::Context;
pub use error::{Category, ErrorCode, PortcullisError, Result};
pub use subject::{Subject, SubjectContext};
