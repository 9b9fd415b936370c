//! Axum router wiring.
//!
//! Exposes the decision endpoint under `/decisions`.

use axum::{routing::any, Router};

use crate::{app_state::AppState, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/decisions", any(transport::decision::decide))
        .route("/decisions/*path", any(transport::decision::decide))
        .with_state(state)
}
