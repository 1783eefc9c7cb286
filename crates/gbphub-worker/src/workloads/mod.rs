//! Concrete workloads.

pub mod post_publish;
pub mod rank_check;

pub use post_publish::{DuePostSource, PostPublishWorkload};
pub use rank_check::{KeywordSource, RankCheckWorkload};
