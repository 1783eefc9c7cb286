//! # gbphub-client
//!
//! Thin HTTP clients for the two external services the batch engine drives.
//! Each service sits behind a trait so the engine can be exercised against
//! scripted fakes.

pub mod error;
pub mod http;
pub mod profile;
pub mod rank;

pub use error::RemoteError;
pub use profile::{HttpProfileClient, ProfilePublishApi, PublishedPost};
pub use rank::{HttpRankCheckClient, RankCheckApi, RankObservation};
