//! External API client configuration.

use serde::{Deserialize, Serialize};

/// Endpoints and transport settings for the external APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the rank-check service.
    #[serde(default = "default_rank_check_url")]
    pub rank_check_base_url: String,
    /// Base URL of the business-profile API.
    #[serde(default = "default_business_profile_url")]
    pub business_profile_base_url: String,
    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rank_check_base_url: default_rank_check_url(),
            business_profile_base_url: default_business_profile_url(),
            connect_timeout_seconds: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_rank_check_url() -> String {
    "https://api.dataforseo.com".to_string()
}

fn default_business_profile_url() -> String {
    "https://mybusiness.googleapis.com".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("gbphub/", env!("CARGO_PKG_VERSION")).to_string()
}
