//! The output of a reconciliation: what to write, nothing written yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{FieldChange, Item, ItemId};
use crate::provider::ProviderKind;
use crate::reconcile::ChangeKind;

/// Provider-sourced update of an existing item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub id: ItemId,
    /// Title before the update, for reporting.
    pub title: String,
    /// Field changes, already stripped of locally edited fields. May be empty when only
    /// the watermark moves.
    pub changes: Vec<FieldChange>,
    /// New watermark for the item's `ExternalRef`.
    pub external_updated_at: DateTime<Utc>,
    /// The item was soft-deleted and showed up again.
    #[serde(default)]
    pub restore: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDelete {
    pub id: ItemId,
    pub title: String,
}

/// Bookkeeping for the deletion debounce. Not a user-visible change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedCycle {
    pub id: ItemId,
    pub missed_cycles: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePlan {
    pub provider: ProviderKind,
    /// Timestamp written as `last_synced_at` and `deleted_at`.
    pub synced_at: DateTime<Utc>,
    pub to_create: Vec<Item>,
    pub to_update: Vec<ItemUpdate>,
    pub to_soft_delete: Vec<SoftDelete>,
    pub missed: Vec<MissedCycle>,
    /// Fetched items left out because their identity couldn't be resolved.
    pub skipped: usize,
}

impl ReconcilePlan {
    pub fn new(provider: ProviderKind, synced_at: DateTime<Utc>) -> Self {
        ReconcilePlan {
            provider,
            synced_at,
            to_create: Vec::new(),
            to_update: Vec::new(),
            to_soft_delete: Vec::new(),
            missed: Vec::new(),
            skipped: 0,
        }
    }

    /// Nothing to write, bookkeeping included.
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty()
            && self.to_update.is_empty()
            && self.to_soft_delete.is_empty()
            && self.missed.is_empty()
    }

    /// (created, updated, soft-deleted)
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.to_create.len(),
            self.to_update.len(),
            self.to_soft_delete.len(),
        )
    }

    /// User-visible changes as (kind, title) pairs, creates first.
    pub fn changes(&self) -> Vec<(ChangeKind, &str)> {
        let creates = self
            .to_create
            .iter()
            .map(|item| (ChangeKind::Create, item.title.as_str()));
        let updates = self
            .to_update
            .iter()
            .map(|update| (ChangeKind::Update, update.title.as_str()));
        let deletes = self
            .to_soft_delete
            .iter()
            .map(|delete| (ChangeKind::SoftDelete, delete.title.as_str()));
        creates.chain(updates).chain(deletes).collect()
    }
}
