//! Tenant credential repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use gbphub_core::error::{AppError, ErrorKind};
use gbphub_core::result::AppResult;
use gbphub_core::types::TenantId;
use gbphub_entity::credential::{CredentialProvider, TenantCredential};

use crate::store::CredentialStore;

/// Repository for tenant credentials.
#[derive(Debug, Clone)]
pub struct CredentialRepository {
    pool: PgPool,
}

impl CredentialRepository {
    /// Create a new credential repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for CredentialRepository {
    async fn find_credential(
        &self,
        tenant_id: TenantId,
        provider: CredentialProvider,
    ) -> AppResult<Option<TenantCredential>> {
        sqlx::query_as::<_, TenantCredential>(
            "SELECT * FROM tenant_credentials WHERE tenant_id = $1 AND provider = $2",
        )
        .bind(tenant_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find credential", e))
    }
}
