//! Shared value types.

pub mod id;
pub mod secret;

pub use id::{BatchId, KeywordId, PostId, TenantId};
pub use secret::AccessToken;
