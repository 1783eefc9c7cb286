//! Errors returned by external API calls.

use std::time::Duration;

use thiserror::Error;

/// Failure of one external API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// HTTP 429 or the service's own quota signal.
    #[error("rate limited by remote service")]
    RateLimited {
        /// Server-sent `Retry-After` hint.
        retry_after: Option<Duration>,
    },
    /// Non-success HTTP status.
    #[error("remote service returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },
    /// The call exceeded its timeout.
    #[error("call timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// Connection or protocol failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),
    /// The tenant's credentials were rejected.
    #[error("credentials rejected: {0}")]
    Unauthorized(String),
    /// The response could not be understood.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Map an HTTP error status to a remote error.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        match status {
            429 => Self::RateLimited { retry_after },
            401 | 403 => Self::Unauthorized(message.into()),
            _ => Self::Status {
                status,
                message: message.into(),
            },
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Rate limiting, 500, 503, timeouts and transport failures are
    /// transient. Everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Transport(_) => true,
            Self::Status { status, .. } => matches!(status, 500 | 503),
            Self::Unauthorized(_) | Self::InvalidResponse(_) => false,
        }
    }

    /// Whether the service asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether the tenant's credentials were rejected.
    pub fn is_credential(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// The server's `Retry-After` hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), err.to_string(), None)
        } else {
            Self::Transport(err.to_string())
        }
    }
}
