//! Rank-check service client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use gbphub_core::types::AccessToken;
use gbphub_entity::item::KeywordCheckPayload;

use crate::error::RemoteError;
use crate::http::error_for_response;

/// Results inspected per query.
const SEARCH_DEPTH: u32 = 100;

/// Task status code the service uses for success.
const TASK_OK: i64 = 20000;

/// Ranking observed for one keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankObservation {
    /// Organic position of the tracked domain, `None` when not in the top results.
    pub position: Option<i32>,
    /// URL that ranked.
    pub url: Option<String>,
    /// Position of the business in the local pack.
    pub local_pack_position: Option<i32>,
}

/// Rank-check service operations used by the engine.
#[async_trait]
pub trait RankCheckApi: Send + Sync {
    /// Look up where the payload's domain ranks for its keyword.
    async fn check_rank(
        &self,
        query: &KeywordCheckPayload,
        token: &AccessToken,
    ) -> Result<RankObservation, RemoteError>;
}

/// HTTP client for a DataForSEO-style SERP endpoint.
#[derive(Debug, Clone)]
pub struct HttpRankCheckClient {
    http: Client,
    base_url: String,
}

impl HttpRankCheckClient {
    /// Create a client against `base_url`.
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SerpTask<'a> {
    keyword: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_name: Option<&'a str>,
    language_code: &'static str,
    depth: u32,
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    tasks: Vec<SerpTaskResult>,
}

#[derive(Debug, Deserialize)]
struct SerpTaskResult {
    status_code: i64,
    #[serde(default)]
    status_message: String,
    #[serde(default)]
    result: Option<Vec<SerpResult>>,
}

#[derive(Debug, Deserialize)]
struct SerpResult {
    #[serde(default)]
    items: Option<Vec<SerpItem>>,
}

#[derive(Debug, Deserialize)]
struct SerpItem {
    #[serde(rename = "type")]
    kind: String,
    rank_group: Option<i32>,
    domain: Option<String>,
    url: Option<String>,
    title: Option<String>,
}

#[async_trait]
impl RankCheckApi for HttpRankCheckClient {
    async fn check_rank(
        &self,
        query: &KeywordCheckPayload,
        token: &AccessToken,
    ) -> Result<RankObservation, RemoteError> {
        let url = format!("{}/v3/serp/google/organic/live/advanced", self.base_url);
        let body = [SerpTask {
            keyword: &query.keyword,
            location_name: query.location.as_deref(),
            language_code: "en",
            depth: SEARCH_DEPTH,
        }];

        debug!(keyword = %query, "Requesting rank check");
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", token.expose()))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let parsed: SerpResponse = response.json().await?;
        observation_from_response(query, parsed)
    }
}

/// Extract the tracked domain's rankings from a SERP response.
fn observation_from_response(
    query: &KeywordCheckPayload,
    response: SerpResponse,
) -> Result<RankObservation, RemoteError> {
    let task = response
        .tasks
        .into_iter()
        .next()
        .ok_or_else(|| RemoteError::InvalidResponse("response contained no tasks".into()))?;

    if task.status_code != TASK_OK {
        return Err(task_error(task.status_code, task.status_message));
    }

    let items: Vec<SerpItem> = task
        .result
        .unwrap_or_default()
        .into_iter()
        .flat_map(|r| r.items.unwrap_or_default())
        .collect();

    let domain = normalize_domain(&query.domain);
    let organic = items.iter().find(|item| {
        item.kind == "organic"
            && item
                .domain
                .as_deref()
                .is_some_and(|d| domain_matches(&normalize_domain(d), &domain))
    });

    let local_pack_position = query.business_name.as_deref().and_then(|name| {
        items
            .iter()
            .filter(|item| item.kind == "local_pack")
            .find(|item| {
                item.title
                    .as_deref()
                    .is_some_and(|t| t.trim().eq_ignore_ascii_case(name.trim()))
            })
            .and_then(|item| item.rank_group)
    });

    Ok(RankObservation {
        position: organic.and_then(|item| item.rank_group),
        url: organic.and_then(|item| item.url.clone()),
        local_pack_position,
    })
}

/// Map a task-level status code to a remote error.
fn task_error(code: i64, message: String) -> RemoteError {
    match code {
        40100..=40199 => RemoteError::Unauthorized(message),
        40202 => RemoteError::RateLimited { retry_after: None },
        50000.. => RemoteError::Status {
            status: 500,
            message,
        },
        _ => RemoteError::Status {
            status: 400,
            message,
        },
    }
}

fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_ascii_lowercase();
    let host = lower
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

fn domain_matches(candidate: &str, tracked: &str) -> bool {
    candidate == tracked || candidate.ends_with(&format!(".{tracked}"))
}
