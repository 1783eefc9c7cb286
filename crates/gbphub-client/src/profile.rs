//! Business-profile post publishing client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use gbphub_core::types::AccessToken;
use gbphub_entity::item::PostPublishPayload;

use crate::error::RemoteError;
use crate::http::error_for_response;

/// A post accepted by the business-profile API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    /// Resource name, `accounts/{a}/locations/{l}/localPosts/{p}`.
    pub name: String,
    /// Review state reported by the API.
    pub state: Option<String>,
    /// Public URL of the post.
    pub search_url: Option<String>,
}

/// Business-profile operations used by the engine.
#[async_trait]
pub trait ProfilePublishApi: Send + Sync {
    /// Create the post on the payload's location.
    async fn publish_post(
        &self,
        post: &PostPublishPayload,
        token: &AccessToken,
    ) -> Result<PublishedPost, RemoteError>;
}

/// HTTP client for the `localPosts` endpoint.
#[derive(Debug, Clone)]
pub struct HttpProfileClient {
    http: Client,
    base_url: String,
}

impl HttpProfileClient {
    /// Create a client against `base_url`.
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocalPostBody<'a> {
    language_code: &'static str,
    summary: &'a str,
    topic_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_to_action: Option<CallToActionBody<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    media: Vec<MediaBody<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallToActionBody<'a> {
    action_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaBody<'a> {
    media_format: &'static str,
    source_url: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalPostResponse {
    name: Option<String>,
    state: Option<String>,
    search_url: Option<String>,
}

impl<'a> From<&'a PostPublishPayload> for LocalPostBody<'a> {
    fn from(post: &'a PostPublishPayload) -> Self {
        Self {
            language_code: "en-US",
            summary: &post.summary,
            topic_type: post.topic.api_name(),
            call_to_action: post.call_to_action.as_ref().map(|cta| CallToActionBody {
                action_type: &cta.action_type,
                url: cta.url.as_deref(),
            }),
            media: post
                .media_url
                .as_deref()
                .map(|source_url| MediaBody {
                    media_format: "PHOTO",
                    source_url,
                })
                .into_iter()
                .collect(),
        }
    }
}

#[async_trait]
impl ProfilePublishApi for HttpProfileClient {
    async fn publish_post(
        &self,
        post: &PostPublishPayload,
        token: &AccessToken,
    ) -> Result<PublishedPost, RemoteError> {
        let url = format!(
            "{}/v4/accounts/{}/locations/{}/localPosts",
            self.base_url, post.account_id, post.location_id
        );

        debug!(post = %post, "Publishing post");
        let response = self
            .http
            .post(&url)
            .bearer_auth(token.expose())
            .json(&LocalPostBody::from(post))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let parsed: LocalPostResponse = response.json().await?;
        published_from_response(parsed)
    }
}

fn published_from_response(response: LocalPostResponse) -> Result<PublishedPost, RemoteError> {
    let name = response
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| RemoteError::InvalidResponse("created post has no name".into()))?;
    Ok(PublishedPost {
        name,
        state: response.state,
        search_url: response.search_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbphub_entity::item::{CallToAction, PostTopic};

    #[test]
    fn test_body_includes_cta_and_media() {
        let payload = PostPublishPayload {
            account_id: "111".to_string(),
            location_id: "222".to_string(),
            summary: "Spring special".to_string(),
            topic: PostTopic::Offer,
            call_to_action: Some(CallToAction {
                action_type: "BOOK".to_string(),
                url: Some("https://example.com/book".to_string()),
            }),
            media_url: Some("https://cdn.example.com/a.jpg".to_string()),
        };

        let body = serde_json::to_value(LocalPostBody::from(&payload)).unwrap();
        assert_eq!(body["topicType"], "OFFER");
        assert_eq!(body["callToAction"]["actionType"], "BOOK");
        assert_eq!(body["media"][0]["sourceUrl"], "https://cdn.example.com/a.jpg");
        assert_eq!(body["languageCode"], "en-US");
    }

    #[test]
    fn test_body_omits_absent_options() {
        let payload = PostPublishPayload {
            account_id: "111".to_string(),
            location_id: "222".to_string(),
            summary: "Open late".to_string(),
            topic: PostTopic::Standard,
            call_to_action: None,
            media_url: None,
        };

        let body = serde_json::to_value(LocalPostBody::from(&payload)).unwrap();
        assert!(body.get("callToAction").is_none());
        assert!(body.get("media").is_none());
    }

    #[test]
    fn test_response_requires_name() {
        let ok: LocalPostResponse = serde_json::from_str(
            r#"{"name":"accounts/1/locations/2/localPosts/3","state":"LIVE"}"#,
        )
        .unwrap();
        assert_eq!(
            published_from_response(ok).unwrap().name,
            "accounts/1/locations/2/localPosts/3"
        );

        let missing: LocalPostResponse = serde_json::from_str(r#"{"state":"LIVE"}"#).unwrap();
        assert!(published_from_response(missing).is_err());
    }
}
