//! Batch run entities.

pub mod filter;
pub mod model;
pub mod status;

pub use filter::BatchFilter;
pub use model::{BatchCompletion, BatchJob, CreateBatchJob};
pub use status::{BatchStatus, Workload};
