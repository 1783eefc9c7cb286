//! Route definitions for the GBP Hub HTTP API.
//!
//! All routes are mounted under `/api`.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(batch_routes())
        .merge(health_routes());

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Batch start, status, cancel
fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/batches/{workload}", post(handlers::batch::start_batch))
        .route("/batches/{workload}/{id}", get(handlers::batch::get_batch))
        .route(
            "/batches/{workload}/{id}/cancel",
            post(handlers::batch::cancel_batch),
        )
}

/// Health check
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}
