//! # gbphub-api
//!
//! HTTP API layer for GBP Hub built on Axum.
//!
//! Exposes batch start, status and cancellation per workload, plus a
//! health check. Handlers address workloads through the worker's
//! [`BatchRegistry`](gbphub_worker::BatchRegistry).

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
