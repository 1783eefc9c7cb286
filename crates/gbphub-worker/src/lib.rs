//! Batch orchestration engine for GBP Hub.
//!
//! This crate provides:
//! - A per-tenant [`RateLimiter`] and a classifying [`RetryPolicy`]
//! - Work-item sources that load and group eligible items by tenant
//! - A generic [`BatchExecutor`] that drains a work list with per-item
//!   failure isolation
//! - A [`ProgressTracker`] serving live and stored batch progress
//! - A [`BatchController`] per workload, addressed by name through the
//!   [`BatchRegistry`]
//! - A cron scheduler that starts batches and prunes old records

pub mod controller;
pub mod executor;
pub mod progress;
pub mod rate_limit;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod source;
pub mod workload;
pub mod workloads;

pub use controller::{BatchController, BatchStarted, StartOutcome};
pub use executor::BatchExecutor;
pub use progress::{ProgressSnapshot, ProgressTracker, SnapshotSource};
pub use rate_limit::RateLimiter;
pub use registry::{BatchRegistry, BatchRunner};
pub use retry::{ErrorClass, RetryError, RetryPolicy};
pub use scheduler::CronScheduler;
pub use workload::{FailureRecord, ItemFailure, Workload};
