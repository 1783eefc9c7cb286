//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use gbphub_core::error::AppError;
use gbphub_core::types::TenantId;
use gbphub_entity::batch::BatchFilter;

/// Optional filter for starting a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartBatchRequest {
    /// Only these keyword or post ids.
    #[serde(default)]
    #[validate(length(max = 1000, message = "At most 1000 item ids per batch"))]
    pub item_ids: Vec<Uuid>,
    /// Only items of this tenant.
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
    /// Only keywords tracked for this location.
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Location must be 1-200 characters"))]
    pub location: Option<String>,
}

impl StartBatchRequest {
    /// Validate and convert into a source filter.
    pub fn into_filter(self) -> Result<BatchFilter, AppError> {
        self.validate()
            .map_err(|e| AppError::validation(format!("Invalid batch filter: {e}")))?;

        Ok(BatchFilter {
            item_ids: self.item_ids,
            tenant_id: self.tenant_id.map(TenantId::from_uuid),
            location: self.location.map(|l| l.trim().to_string()),
        })
    }
}
