//! Loading eligible work items and grouping them by tenant.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use gbphub_core::result::AppResult;
use gbphub_core::types::{AccessToken, TenantId};
use gbphub_database::store::CredentialStore;
use gbphub_entity::batch::BatchFilter;
use gbphub_entity::credential::CredentialProvider;
use gbphub_entity::item::WorkItem;

/// Supplies the ordered list of items for one batch.
#[async_trait]
pub trait WorkItemSource: Send + Sync {
    /// Item payload.
    type Payload: Send + Sync;

    /// Eligible items matching `filter`, in processing order.
    ///
    /// Returns an empty list when nothing is eligible.
    async fn load_batch(&self, filter: &BatchFilter) -> AppResult<Vec<WorkItem<Self::Payload>>>;
}

/// The items of one tenant, in source order.
#[derive(Debug)]
pub struct TenantGroup<P> {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Items to process sequentially.
    pub items: Vec<WorkItem<P>>,
}

/// Group items by tenant, keeping first-appearance tenant order and the
/// order of items within each tenant.
pub fn group_by_tenant<P>(items: Vec<WorkItem<P>>) -> Vec<TenantGroup<P>> {
    let mut index: HashMap<TenantId, usize> = HashMap::new();
    let mut groups: Vec<TenantGroup<P>> = Vec::new();

    for item in items {
        let slot = *index.entry(item.tenant_id).or_insert_with(|| {
            groups.push(TenantGroup {
                tenant_id: item.tenant_id,
                items: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].items.push(item);
    }

    groups
}

/// Resolves tenant credentials for a provider and drops tenants without a
/// usable one.
#[derive(Debug, Clone)]
pub struct CredentialGate {
    store: Arc<dyn CredentialStore>,
    provider: CredentialProvider,
}

impl CredentialGate {
    /// Create a gate for one provider.
    pub fn new(store: Arc<dyn CredentialStore>, provider: CredentialProvider) -> Self {
        Self { store, provider }
    }

    /// Tokens of the given tenants that hold a present, unrevoked,
    /// unexpired credential.
    pub async fn resolve(
        &self,
        tenants: &[TenantId],
    ) -> AppResult<HashMap<TenantId, AccessToken>> {
        let now = Utc::now();
        let mut tokens = HashMap::new();
        let mut seen = HashSet::new();

        for &tenant_id in tenants {
            if !seen.insert(tenant_id) {
                continue;
            }
            match self.store.find_credential(tenant_id, self.provider).await? {
                Some(credential) if credential.is_usable(now) => {
                    tokens.insert(tenant_id, credential.token());
                }
                Some(_) => warn!(
                    tenant_id = %tenant_id,
                    provider = ?self.provider,
                    "Credential expired or revoked, excluding tenant"
                ),
                None => warn!(
                    tenant_id = %tenant_id,
                    provider = ?self.provider,
                    "No credential configured, excluding tenant"
                ),
            }
        }

        Ok(tokens)
    }
}
