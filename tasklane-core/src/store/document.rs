//! Document layout shared by the memory and file stores.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::item::{Item, ItemEdit, ItemId, Source};
use crate::reconcile::ReconcilePlan;
use crate::sync::SyncCursor;

/// A user's natively created items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NativeDocument {
    #[serde(default)]
    pub items: Vec<Item>,
}

/// Everything stored for one `(user, provider)` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderDocument {
    #[serde(default)]
    pub cursor: SyncCursor,
    /// external_id -> ItemId. Entries are never removed.
    #[serde(default)]
    pub identities: BTreeMap<String, ItemId>,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl ProviderDocument {
    /// Apply every part of `plan` or none of it.
    pub fn apply_plan(&mut self, plan: &ReconcilePlan) -> StoreResult<()> {
        let mut items = self.items.clone();
        let mut identities = self.identities.clone();
        let mut index: HashMap<ItemId, usize> =
            items.iter().enumerate().map(|(i, item)| (item.id, i)).collect();

        for item in &plan.to_create {
            if index.contains_key(&item.id) {
                return Err(StoreError::Conflict(format!("item {} already exists", item.id)));
            }
            if let Some(r) = item.external_ref() {
                identities.entry(r.external_id.clone()).or_insert(item.id);
            }
            index.insert(item.id, items.len());
            items.push(item.clone());
        }

        for update in &plan.to_update {
            let &i = index.get(&update.id).ok_or(StoreError::NotFound(update.id))?;
            let item = &mut items[i];
            // Edits committed after the plan was computed still pin their fields.
            for change in &update.changes {
                if !item.is_locally_edited(change.field()) {
                    item.apply(change);
                }
            }
            if let Source::External(r) = &mut item.source {
                r.external_updated_at = update.external_updated_at;
            }
            if update.restore {
                item.restore();
            }
            item.missed_cycles = 0;
            item.last_synced_at = Some(plan.synced_at);
        }

        for delete in &plan.to_soft_delete {
            let &i = index.get(&delete.id).ok_or(StoreError::NotFound(delete.id))?;
            items[i].soft_delete(plan.synced_at);
        }

        for missed in &plan.missed {
            let &i = index.get(&missed.id).ok_or(StoreError::NotFound(missed.id))?;
            items[i].missed_cycles = missed.missed_cycles;
        }

        self.items = items;
        self.identities = identities;
        Ok(())
    }
}

pub fn find_mut(items: &mut [Item], id: ItemId) -> Option<&mut Item> {
    items.iter_mut().find(|item| item.id == id)
}

pub fn edit(item: &mut Item, edit: &ItemEdit) -> Item {
    item.apply_edit(edit);
    item.clone()
}

/// Soft-delete a native item. Deleting twice keeps the first `deleted_at`.
pub fn delete(item: &mut Item, now: DateTime<Utc>) -> StoreResult<Item> {
    if let Some(provider) = item.source.provider() {
        return Err(StoreError::ExternalDeletion(item.id, provider));
    }
    if !item.is_deleted {
        item.soft_delete(now);
    }
    Ok(item.clone())
}

/// Drop soft-deleted items older than `cutoff`. Returns how many went.
pub fn collect_garbage(items: &mut Vec<Item>, cutoff: DateTime<Utc>) -> usize {
    let before = items.len();
    items.retain(|item| !(item.is_deleted && item.deleted_at.is_some_and(|at| at < cutoff)));
    before - items.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{FieldChange, NewItem, UserId};
    use crate::provider::{ExternalItem, ProviderKind};
    use crate::reconcile::{ItemUpdate, MissedCycle, SoftDelete};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    fn external_item(external_id: &str) -> Item {
        let fetched = ExternalItem {
            external_id: external_id.to_string(),
            title: external_id.to_string(),
            body: String::new(),
            due_at: None,
            completed: false,
            updated_at: now(),
            priority: None,
            deeplink: None,
        };
        let user = UserId::from("alice");
        Item::from_external(ItemId::new(), user, ProviderKind::Asana, &fetched, now())
    }

    #[test]
    fn failed_plan_leaves_document_untouched() {
        let mut doc = ProviderDocument::default();
        let mut plan = ReconcilePlan::new(ProviderKind::Asana, now());
        plan.to_create.push(external_item("A-1"));
        plan.to_update.push(ItemUpdate {
            id: ItemId::new(),
            title: "ghost".into(),
            changes: vec![FieldChange::Title("x".into())],
            external_updated_at: now(),
            restore: false,
        });

        assert!(matches!(doc.apply_plan(&plan), Err(StoreError::NotFound(_))));
        assert!(doc.items.is_empty());
        assert!(doc.identities.is_empty());
    }

    #[test]
    fn plan_records_identities_and_bookkeeping() {
        let mut doc = ProviderDocument::default();
        let first = external_item("A-1");
        let second = external_item("A-2");
        let mut plan = ReconcilePlan::new(ProviderKind::Asana, now());
        plan.to_create = vec![first.clone(), second.clone()];
        doc.apply_plan(&plan).unwrap();
        assert_eq!(doc.identities["A-1"], first.id);

        let later = now() + Duration::hours(1);
        let mut plan = ReconcilePlan::new(ProviderKind::Asana, later);
        plan.to_soft_delete.push(SoftDelete {
            id: first.id,
            title: first.title.clone(),
        });
        plan.missed.push(MissedCycle {
            id: second.id,
            missed_cycles: 1,
        });
        doc.apply_plan(&plan).unwrap();

        assert!(doc.items[0].is_deleted);
        assert_eq!(doc.items[0].deleted_at, Some(later));
        assert_eq!(doc.items[1].missed_cycles, 1);
        assert!(!doc.items[1].is_deleted);
    }

    #[test]
    fn update_skips_fields_edited_after_planning() {
        let mut doc = ProviderDocument::default();
        let item = external_item("A-1");
        let mut plan = ReconcilePlan::new(ProviderKind::Asana, now());
        plan.to_create.push(item.clone());
        doc.apply_plan(&plan).unwrap();

        let later = now() + Duration::hours(1);
        let mut plan = ReconcilePlan::new(ProviderKind::Asana, later);
        plan.to_update.push(ItemUpdate {
            id: item.id,
            title: item.title.clone(),
            changes: vec![
                FieldChange::Title("Provider renamed".into()),
                FieldChange::Body("new body".into()),
            ],
            external_updated_at: later,
            restore: false,
        });

        let stored = find_mut(&mut doc.items, item.id).unwrap();
        edit(stored, &ItemEdit::new().set(FieldChange::Title("My title".into())));
        doc.apply_plan(&plan).unwrap();

        let stored = &doc.items[0];
        assert_eq!(stored.title, "My title");
        assert_eq!(stored.body, "new body");
        assert_eq!(stored.last_synced_at, Some(later));
    }

    #[test]
    fn external_items_cannot_be_deleted_locally() {
        let mut item = external_item("A-1");
        let err = delete(&mut item, now()).unwrap_err();
        assert!(matches!(err, StoreError::ExternalDeletion(_, ProviderKind::Asana)));
        assert!(!item.is_deleted);
    }

    #[test]
    fn garbage_collection_respects_cutoff() {
        let user = UserId::from("alice");
        let new = |title: &str| NewItem {
            title: title.into(),
            ..NewItem::default()
        };
        let mut old = Item::native(user.clone(), new("old"), now());
        old.soft_delete(now() - Duration::days(40));
        let mut recent = Item::native(user.clone(), new("recent"), now());
        recent.soft_delete(now() - Duration::days(1));
        let live = Item::native(user, new("live"), now());
        let mut items = vec![old, recent, live];

        let removed = collect_garbage(&mut items, now() - Duration::days(30));

        assert_eq!(removed, 1);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["recent", "live"]);
    }
}
