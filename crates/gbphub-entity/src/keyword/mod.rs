//! Tracked keyword and rank history entities.

pub mod model;

pub use model::{CheckStatus, KeywordFailure, RankHistory, TrackedKeyword};
