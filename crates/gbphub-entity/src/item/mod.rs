//! Work item and per-item result entities.

pub mod failure;
pub mod model;
pub mod payload;

pub use failure::{FailureClass, ItemDisposition};
pub use model::{ItemResult, WorkItem};
pub use payload::{CallToAction, KeywordCheckPayload, PostPublishPayload, PostTopic};
