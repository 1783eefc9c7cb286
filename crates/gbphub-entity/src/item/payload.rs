//! Typed payloads for the two workloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A keyword to re-check against the rank-check service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCheckPayload {
    /// Search phrase.
    pub keyword: String,
    /// Search location (e.g. `"Austin, Texas, United States"`).
    pub location: Option<String>,
    /// Domain whose organic position is tracked.
    pub domain: String,
    /// Business name matched against the local pack.
    pub business_name: Option<String>,
}

impl fmt::Display for KeywordCheckPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "\"{}\" @ {}", self.keyword, location),
            None => write!(f, "\"{}\"", self.keyword),
        }
    }
}

/// Post flavor understood by the business-profile API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "post_topic", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostTopic {
    /// Plain update.
    Standard,
    /// Event announcement.
    Event,
    /// Promotional offer.
    Offer,
}

impl PostTopic {
    /// The API's `topicType` value.
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Event => "EVENT",
            Self::Offer => "OFFER",
        }
    }
}

/// Button attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallToAction {
    /// Action type (e.g. `"LEARN_MORE"`, `"BOOK"`, `"CALL"`).
    pub action_type: String,
    /// Target URL, absent for `CALL`.
    pub url: Option<String>,
}

/// A post to publish to a business location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPublishPayload {
    /// Business-profile account id.
    pub account_id: String,
    /// Business-profile location id.
    pub location_id: String,
    /// Post body.
    pub summary: String,
    /// Post flavor.
    pub topic: PostTopic,
    /// Optional call-to-action button.
    pub call_to_action: Option<CallToAction>,
    /// Optional already-hosted image URL.
    pub media_url: Option<String>,
}

impl fmt::Display for PostPublishPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.summary.chars().take(40).collect();
        write!(f, "{} post to {}: {}", self.topic.api_name(), self.location_id, preview)
    }
}
