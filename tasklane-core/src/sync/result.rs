use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SyncError};
use crate::reconcile::ReconcilePlan;

/// Outcome of one provider cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub created: usize,
    pub updated: usize,
    pub soft_deleted: usize,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Fetched items whose identity could not be resolved.
    #[serde(default)]
    pub skipped: usize,
    /// The page ceiling cut the listing short.
    #[serde(default)]
    pub truncated: bool,
}

impl SyncResult {
    pub fn from_plan(plan: &ReconcilePlan, truncated: bool) -> Self {
        let (created, updated, soft_deleted) = plan.counts();
        SyncResult {
            created,
            updated,
            soft_deleted,
            skipped: plan.skipped,
            truncated,
            ..SyncResult::default()
        }
    }

    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        SyncResult {
            failed: true,
            error_kind: Some(kind),
            error: Some(message.into()),
            ..SyncResult::default()
        }
    }

    /// Mark a result failed while keeping the counts of what was already written.
    pub fn with_failure(mut self, e: &SyncError) -> Self {
        self.failed = true;
        self.error_kind = Some(e.kind());
        self.error = Some(e.to_string());
        self
    }

    /// True if the cycle committed and nothing was left out.
    pub fn is_clean(&self) -> bool {
        !self.failed && self.skipped == 0 && !self.truncated
    }

    pub fn has_changes(&self) -> bool {
        self.created + self.updated + self.soft_deleted > 0
    }
}

impl From<&SyncError> for SyncResult {
    fn from(e: &SyncError) -> Self {
        SyncResult::failed(e.kind(), e.to_string())
    }
}
