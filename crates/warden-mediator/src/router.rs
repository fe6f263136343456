//! Axum router wiring for the decision service.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, transport::http};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/evaluate", post(http::evaluate))
        .route("/v1/mediate", post(http::mediate))
        .route("/v1/audit", get(http::audit_stats).delete(http::audit_clear))
        .route("/v1/audit/sync", post(http::audit_sync))
        .route("/metrics", get(http::metrics))
        .with_state(state)
}
