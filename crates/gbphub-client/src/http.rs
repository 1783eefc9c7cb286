//! Shared HTTP plumbing for the API clients.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response};

use gbphub_core::config::client::ClientConfig;
use gbphub_core::error::{AppError, ErrorKind};

use crate::error::RemoteError;

/// Longest error message kept from a response body.
const MAX_ERROR_MESSAGE: usize = 200;

/// Build the shared `reqwest` client.
pub fn build_client(config: &ClientConfig) -> Result<Client, AppError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e))
}

/// Turn a non-success response into a [`RemoteError`].
pub async fn error_for_response(response: Response) -> RemoteError {
    let status = response.status().as_u16();
    let retry_after = parse_retry_after(response.headers(), Utc::now());
    let body = response.text().await.unwrap_or_default();
    RemoteError::from_status(status, error_message(&body), retry_after)
}

/// Read the `Retry-After` header as either delta-seconds or an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// Pull a readable message out of an error body.
///
/// Understands `{"error": {"message": ...}}` and `{"status_message": ...}`
/// and falls back to the raw body.
pub fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("status_message"))
                .and_then(|m| m.as_str())
        })
        .unwrap_or(body)
        .trim();
    message.chars().take(MAX_ERROR_MESSAGE).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(
            parse_retry_after(&headers, Utc::now()),
            Some(Duration::from_secs(12))
        );
    }

    #[test]
    fn test_retry_after_http_date() {
        let now = DateTime::parse_from_rfc2822("Wed, 21 Oct 2026 07:28:00 GMT")
            .unwrap()
            .with_timezone(&Utc);
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:30 GMT"),
        );
        assert_eq!(
            parse_retry_after(&headers, now),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_retry_after_missing_or_garbage() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers, Utc::now()), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers, Utc::now()), None);
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error":{"code":404,"message":"Location not found"}}"#),
            "Location not found"
        );
        assert_eq!(
            error_message(r#"{"status_code":40501,"status_message":"Invalid field"}"#),
            "Invalid field"
        );
        assert_eq!(error_message(" upstream down \n"), "upstream down");
        assert_eq!(error_message(&"x".repeat(500)).len(), MAX_ERROR_MESSAGE);
    }
}
