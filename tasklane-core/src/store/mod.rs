//! Storage gateway.
//!
//! The `Store` trait is everything the engine and the client surfaces need from
//! persistence. Items are partitioned per user into native items and one document per
//! connected provider; a provider document also holds that pair's cursor and identity
//! table, so a reconciliation commit only ever touches one document.

mod document;
mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::identity::IdentityKey;
use crate::item::{Item, ItemEdit, ItemId, NewItem, UserId};
use crate::provider::ProviderKind;
use crate::reconcile::ReconcilePlan;
use crate::sync::SyncCursor;

/// Which items `Store::load_items` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemScope {
    /// Native items plus every provider's items.
    All,
    Native,
    Provider(ProviderKind),
}

pub trait Store: Send + Sync + 'static {
    /// Load items for a user, soft-deleted ones included.
    fn load_items(
        &self,
        user: &UserId,
        scope: ItemScope,
    ) -> impl Future<Output = StoreResult<Vec<Item>>> + Send;

    /// Apply a plan to the plan's provider document. All or nothing.
    fn commit_plan(
        &self,
        user: &UserId,
        plan: &ReconcilePlan,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// The stored cursor, or a fresh one if the pair never synced.
    fn load_cursor(
        &self,
        user: &UserId,
        provider: ProviderKind,
    ) -> impl Future<Output = StoreResult<SyncCursor>> + Send;

    fn save_cursor(
        &self,
        user: &UserId,
        provider: ProviderKind,
        cursor: &SyncCursor,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn clear_cursor(
        &self,
        user: &UserId,
        provider: ProviderKind,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn lookup_identity(
        &self,
        key: &IdentityKey,
    ) -> impl Future<Output = StoreResult<Option<ItemId>>> + Send;

    /// Insert-if-absent. Fails with `StoreError::Conflict` when the key is already mapped.
    fn insert_identity(
        &self,
        key: &IdentityKey,
        id: ItemId,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn insert_native(&self, item: &Item) -> impl Future<Output = StoreResult<()>> + Send;

    /// Apply a user edit to any of the user's items and return the result.
    fn edit_item(
        &self,
        user: &UserId,
        id: ItemId,
        edit: &ItemEdit,
    ) -> impl Future<Output = StoreResult<Item>> + Send;

    /// Soft-delete a native item. External items fail with `StoreError::ExternalDeletion`.
    fn delete_item(
        &self,
        user: &UserId,
        id: ItemId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Item>> + Send;

    /// Hard-delete soft-deleted items whose `deleted_at` is before `cutoff`.
    fn collect_garbage(
        &self,
        user: &UserId,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<usize>> + Send;
}

/// Creates a native item and stores it.
pub async fn create_native<S: Store>(
    store: &S,
    user: &UserId,
    new: NewItem,
    now: DateTime<Utc>,
) -> StoreResult<Item> {
    let item = Item::native(user.clone(), new, now);
    store.insert_native(&item).await?;
    Ok(item)
}
