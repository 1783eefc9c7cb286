//! Batch status and workload enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "batch_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Created but not yet draining.
    Pending,
    /// Items are being processed.
    Running,
    /// Finished with at least one successful item.
    Completed,
    /// Every item failed, or the run was aborted by a fatal error.
    Failed,
    /// Stopped by an operator before the work list was drained.
    Cancelled,
}

impl BatchStatus {
    /// Check if the batch is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Terminal states are final; everything else may move forward.
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        match self {
            Self::Pending => next != Self::Pending,
            Self::Running => next.is_terminal(),
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of work a batch drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "batch_workload", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Workload {
    /// Re-check tracked keywords against the rank-check service.
    RankCheck,
    /// Publish posts whose scheduled time has passed.
    PostPublish,
}

impl Workload {
    /// Every workload, in a stable order.
    pub const ALL: [Workload; 2] = [Workload::RankCheck, Workload::PostPublish];

    /// Return the workload as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RankCheck => "rank_check",
            Self::PostPublish => "post_publish",
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Workload {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "rank_check" => Ok(Self::RankCheck),
            "post_publish" => Ok(Self::PostPublish),
            other => Err(format!("unknown workload '{other}'")),
        }
    }
}
