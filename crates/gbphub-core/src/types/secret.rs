//! Redacted wrapper for external-API access tokens.

use std::fmt;

/// A bearer token or API key for an external service.
///
/// `Debug` and `Display` never print the value, so tokens can travel inside
/// work items and log fields without leaking.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the raw value for the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the token is empty.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(****)")
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let token = AccessToken::new("sk-live-123");
        assert_eq!(format!("{token:?}"), "AccessToken(****)");
        assert_eq!(token.to_string(), "****");
        assert_eq!(token.expose(), "sk-live-123");
    }

    #[test]
    fn test_blank_token_is_empty() {
        assert!(AccessToken::new("  ").is_empty());
        assert!(!AccessToken::new("x").is_empty());
    }
}
