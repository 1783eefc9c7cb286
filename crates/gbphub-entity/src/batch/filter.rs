//! Filter narrowing which eligible items a batch picks up.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gbphub_core::types::TenantId;

/// Optional restrictions applied by a work-item source.
///
/// An empty filter selects every eligible item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFilter {
    /// Only these items (keyword or post ids). Empty means all.
    #[serde(default)]
    pub item_ids: Vec<Uuid>,
    /// Only items owned by this tenant.
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    /// Only keywords tracked for this location (case-insensitive).
    #[serde(default)]
    pub location: Option<String>,
}

impl BatchFilter {
    /// Filter restricted to one tenant.
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            ..Self::default()
        }
    }

    /// Filter restricted to explicit item ids.
    pub fn for_items(item_ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            item_ids: item_ids.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Whether the filter selects everything.
    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty() && self.tenant_id.is_none() && self.location.is_none()
    }

    /// Whether an item passes the id and tenant restrictions.
    pub fn matches(&self, item_id: Uuid, tenant_id: TenantId) -> bool {
        (self.item_ids.is_empty() || self.item_ids.contains(&item_id))
            && self.tenant_id.is_none_or(|t| t == tenant_id)
    }

    /// Whether a keyword location passes the location restriction.
    pub fn matches_location(&self, location: Option<&str>) -> bool {
        match (&self.location, location) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(wanted), Some(actual)) => wanted.trim().eq_ignore_ascii_case(actual.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = BatchFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(Uuid::new_v4(), TenantId::new()));
        assert!(filter.matches_location(None));
    }

    #[test]
    fn test_item_and_tenant_restrictions() {
        let wanted = Uuid::new_v4();
        let tenant = TenantId::new();
        let filter = BatchFilter {
            item_ids: vec![wanted],
            tenant_id: Some(tenant),
            location: None,
        };

        assert!(filter.matches(wanted, tenant));
        assert!(!filter.matches(Uuid::new_v4(), tenant));
        assert!(!filter.matches(wanted, TenantId::new()));
    }

    #[test]
    fn test_location_is_case_insensitive() {
        let filter = BatchFilter {
            location: Some("Austin, TX".to_string()),
            ..BatchFilter::default()
        };
        assert!(filter.matches_location(Some("austin, tx ")));
        assert!(!filter.matches_location(Some("Dallas, TX")));
        assert!(!filter.matches_location(None));
    }
}
