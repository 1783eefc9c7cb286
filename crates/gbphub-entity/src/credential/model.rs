//! Tenant credential model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use gbphub_core::types::{AccessToken, TenantId};

/// External service a credential authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "credential_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CredentialProvider {
    /// Rank-check service API key.
    RankCheck,
    /// Business-profile OAuth access token.
    BusinessProfile,
}

/// A tenant's credential for one external service.
#[derive(Clone, Serialize, Deserialize, FromRow)]
pub struct TenantCredential {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Service the credential authorizes.
    pub provider: CredentialProvider,
    /// Raw token value.
    #[serde(skip_serializing)]
    pub access_token: String,
    /// Expiry, if the token expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the tenant or the provider revoked the credential.
    pub revoked: bool,
    /// When the credential was last updated.
    pub updated_at: DateTime<Utc>,
}

impl TenantCredential {
    /// Create an unrevoked credential.
    pub fn new(
        tenant_id: TenantId,
        provider: CredentialProvider,
        access_token: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            tenant_id,
            provider,
            access_token: access_token.into(),
            expires_at,
            revoked: false,
            updated_at: Utc::now(),
        }
    }

    /// Whether the credential can be used at `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.revoked
            && !self.access_token.trim().is_empty()
            && self.expires_at.is_none_or(|exp| exp > now)
    }

    /// The token wrapped for transport.
    pub fn token(&self) -> AccessToken {
        AccessToken::new(self.access_token.clone())
    }
}

impl std::fmt::Debug for TenantCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantCredential")
            .field("tenant_id", &self.tenant_id)
            .field("provider", &self.provider)
            .field("expires_at", &self.expires_at)
            .field("revoked", &self.revoked)
            .finish_non_exhaustive()
    }
}
