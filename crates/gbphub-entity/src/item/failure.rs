//! Classified item failures and the cross-batch retry policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified reason an item did not succeed.
///
/// This is the only error information exposed to status readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_failure_class", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    /// Rate limited, 5xx, or timed out; in-batch retries were exhausted.
    Transient,
    /// Rejected by the remote service (bad request, not found, ...).
    Permanent,
    /// The tenant's credentials were rejected.
    Credential,
    /// An unexpected error or panic while processing the item.
    Internal,
}

impl FailureClass {
    /// Return the class as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Credential => "credential",
            Self::Internal => "internal",
        }
    }

    /// Whether another batch run may retry the item.
    pub fn carries_over(&self) -> bool {
        matches!(self, Self::Transient | Self::Internal)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happens to the underlying record after an item is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemDisposition {
    /// The external call succeeded.
    Succeeded,
    /// The record stays eligible and the next batch tries again.
    RetryNextRun,
    /// The record is marked failed and is no longer picked up.
    FailedPermanently,
}

impl ItemDisposition {
    /// Decide the disposition of a failed item.
    ///
    /// `attempts` is the record's attempt counter *after* counting this
    /// failure. Permanent and credential failures end the record at once;
    /// transient and internal failures carry over until `max_attempts`.
    pub fn for_failure(class: FailureClass, attempts: i32, max_attempts: i32) -> Self {
        if class.carries_over() && attempts < max_attempts {
            Self::RetryNextRun
        } else {
            Self::FailedPermanently
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_carries_over_until_cap() {
        assert_eq!(
            ItemDisposition::for_failure(FailureClass::Transient, 1, 3),
            ItemDisposition::RetryNextRun
        );
        assert_eq!(
            ItemDisposition::for_failure(FailureClass::Transient, 3, 3),
            ItemDisposition::FailedPermanently
        );
        assert_eq!(
            ItemDisposition::for_failure(FailureClass::Internal, 2, 3),
            ItemDisposition::RetryNextRun
        );
    }

    #[test]
    fn test_permanent_and_credential_end_immediately() {
        for class in [FailureClass::Permanent, FailureClass::Credential] {
            assert_eq!(
                ItemDisposition::for_failure(class, 1, 5),
                ItemDisposition::FailedPermanently
            );
        }
    }
}
