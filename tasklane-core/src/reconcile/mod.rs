//! The merge algorithm.
//!
//! `reconcile` compares one provider's fetched listing with what is stored for that
//! provider and returns a `ReconcilePlan`. It never touches storage and never resolves
//! identities itself: the caller passes the `external_id -> ItemId` map in.

mod change_kind;
mod plan;

pub use change_kind::ChangeKind;
pub use plan::{ItemUpdate, MissedCycle, ReconcilePlan, SoftDelete};

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::constants::DEFAULT_DELETION_THRESHOLD;
use crate::item::{Item, ItemId, UserId};
use crate::provider::{ExternalItem, ProviderKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Consecutive missed cycles before an item is soft-deleted. Values below 1 act as 1.
    pub deletion_threshold: u32,
    /// Whether the fetched listing is complete enough to infer deletions from.
    pub detect_missing: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            deletion_threshold: DEFAULT_DELETION_THRESHOLD,
            detect_missing: true,
        }
    }
}

/// Keep the last occurrence of each external id, in listing order.
fn dedup_latest(fetched: &[ExternalItem]) -> Vec<&ExternalItem> {
    let last_index: HashMap<&str, usize> = fetched
        .iter()
        .enumerate()
        .map(|(i, item)| (item.external_id.as_str(), i))
        .collect();

    fetched
        .iter()
        .enumerate()
        .filter(|(i, item)| last_index.get(item.external_id.as_str()) == Some(i))
        .map(|(_, item)| item)
        .collect()
}

pub fn reconcile(
    provider: ProviderKind,
    user: &UserId,
    fetched: &[ExternalItem],
    stored: &[Item],
    identities: &HashMap<String, ItemId>,
    options: &ReconcileOptions,
    now: DateTime<Utc>,
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::new(provider, now);

    let stored_by_external_id: HashMap<&str, &Item> = stored
        .iter()
        .filter_map(|item| match item.external_ref() {
            Some(r) if r.provider == provider => Some((r.external_id.as_str(), item)),
            _ => None,
        })
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();

    for external in dedup_latest(fetched) {
        seen.insert(external.external_id.as_str());

        let Some(&id) = identities.get(&external.external_id) else {
            plan.skipped += 1;
            continue;
        };

        let Some(existing) = stored_by_external_id.get(external.external_id.as_str()) else {
            let item = Item::from_external(id, user.clone(), provider, external, now);
            plan.to_create.push(item);
            continue;
        };

        let watermark = existing
            .external_ref()
            .map(|r| r.external_updated_at)
            .unwrap_or(existing.created_at);

        if !existing.is_deleted && external.updated_at <= watermark {
            // Stale or unchanged. Seeing it still clears a pending miss.
            if existing.missed_cycles > 0 {
                plan.missed.push(MissedCycle {
                    id: existing.id,
                    missed_cycles: 0,
                });
            }
            continue;
        }

        plan.to_update.push(ItemUpdate {
            id: existing.id,
            title: existing.title.clone(),
            changes: existing.provider_changes(external),
            external_updated_at: external.updated_at.max(watermark),
            restore: existing.is_deleted,
        });
    }

    if options.detect_missing {
        let threshold = options.deletion_threshold.max(1);
        for item in stored {
            let Some(r) = item.external_ref() else {
                continue;
            };
            if r.provider != provider || item.is_deleted || seen.contains(r.external_id.as_str())
            {
                continue;
            }

            let missed_cycles = item.missed_cycles.saturating_add(1);
            if missed_cycles >= threshold {
                plan.to_soft_delete.push(SoftDelete {
                    id: item.id,
                    title: item.title.clone(),
                });
            } else {
                plan.missed.push(MissedCycle {
                    id: item.id,
                    missed_cycles,
                });
            }
        }
    }

    plan
}
