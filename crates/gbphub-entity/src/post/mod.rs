//! Scheduled post entities.

pub mod model;

pub use model::{PostFailure, PostStatus, ScheduledPost};
