//! Process-local store. Used by tests and by embedders that bring their own persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::identity::IdentityKey;
use crate::item::{Item, ItemEdit, ItemId, UserId};
use crate::provider::ProviderKind;
use crate::reconcile::ReconcilePlan;
use crate::store::document::{self, NativeDocument, ProviderDocument};
use crate::store::{ItemScope, Store};
use crate::sync::SyncCursor;

#[derive(Debug, Default)]
struct UserState {
    native: NativeDocument,
    providers: BTreeMap<ProviderKind, ProviderDocument>,
}

impl UserState {
    fn find_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        if let Some(item) = document::find_mut(&mut self.native.items, id) {
            return Some(item);
        }
        self.providers
            .values_mut()
            .find_map(|doc| document::find_mut(&mut doc.items, id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<UserId, UserState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_user<R>(&self, user: &UserId, f: impl FnOnce(&mut UserState) -> R) -> R {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        f(users.entry(user.clone()).or_default())
    }

    fn with_provider<R>(
        &self,
        user: &UserId,
        provider: ProviderKind,
        f: impl FnOnce(&mut ProviderDocument) -> R,
    ) -> R {
        self.with_user(user, |state| f(state.providers.entry(provider).or_default()))
    }
}

impl Store for MemoryStore {
    async fn load_items(&self, user: &UserId, scope: ItemScope) -> StoreResult<Vec<Item>> {
        Ok(self.with_user(user, |state| match scope {
            ItemScope::All => state
                .native
                .items
                .iter()
                .chain(state.providers.values().flat_map(|doc| doc.items.iter()))
                .cloned()
                .collect(),
            ItemScope::Native => state.native.items.clone(),
            ItemScope::Provider(provider) => state
                .providers
                .get(&provider)
                .map(|doc| doc.items.clone())
                .unwrap_or_default(),
        }))
    }

    async fn commit_plan(&self, user: &UserId, plan: &ReconcilePlan) -> StoreResult<()> {
        self.with_provider(user, plan.provider, |doc| doc.apply_plan(plan))
    }

    async fn load_cursor(&self, user: &UserId, provider: ProviderKind) -> StoreResult<SyncCursor> {
        Ok(self.with_provider(user, provider, |doc| doc.cursor.clone()))
    }

    async fn save_cursor(
        &self,
        user: &UserId,
        provider: ProviderKind,
        cursor: &SyncCursor,
    ) -> StoreResult<()> {
        self.with_provider(user, provider, |doc| doc.cursor = cursor.clone());
        Ok(())
    }

    async fn clear_cursor(&self, user: &UserId, provider: ProviderKind) -> StoreResult<()> {
        self.with_provider(user, provider, |doc| doc.cursor = SyncCursor::default());
        Ok(())
    }

    async fn lookup_identity(&self, key: &IdentityKey) -> StoreResult<Option<ItemId>> {
        Ok(self.with_provider(&key.user, key.provider, |doc| {
            doc.identities.get(&key.external_id).copied()
        }))
    }

    async fn insert_identity(&self, key: &IdentityKey, id: ItemId) -> StoreResult<()> {
        self.with_provider(&key.user, key.provider, |doc| {
            if doc.identities.contains_key(&key.external_id) {
                return Err(StoreError::Conflict(key.to_string()));
            }
            doc.identities.insert(key.external_id.clone(), id);
            Ok(())
        })
    }

    async fn insert_native(&self, item: &Item) -> StoreResult<()> {
        self.with_user(&item.user_id, |state| {
            state.native.items.push(item.clone());
        });
        Ok(())
    }

    async fn edit_item(&self, user: &UserId, id: ItemId, edit: &ItemEdit) -> StoreResult<Item> {
        self.with_user(user, |state| {
            let item = state.find_mut(id).ok_or(StoreError::NotFound(id))?;
            Ok(document::edit(item, edit))
        })
    }

    async fn delete_item(
        &self,
        user: &UserId,
        id: ItemId,
        now: DateTime<Utc>,
    ) -> StoreResult<Item> {
        self.with_user(user, |state| {
            let item = state.find_mut(id).ok_or(StoreError::NotFound(id))?;
            document::delete(item, now)
        })
    }

    async fn collect_garbage(&self, user: &UserId, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        Ok(self.with_user(user, |state| {
            let native = document::collect_garbage(&mut state.native.items, cutoff);
            let external: usize = state
                .providers
                .values_mut()
                .map(|doc| document::collect_garbage(&mut doc.items, cutoff))
                .sum();
            native + external
        }))
    }
}
