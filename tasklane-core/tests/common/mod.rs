#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tasklane_core::error::{AdapterResult, StoreResult};
use tasklane_core::identity::IdentityKey;
use tasklane_core::reconcile::ReconcilePlan;
use tasklane_core::store::{ItemScope, MemoryStore, Store};
use tasklane_core::sync::SyncCursor;
use tasklane_core::{
    AdapterError, ErrorKind, ExternalItem, Item, ItemEdit, ItemId, Page, ProviderAdapter,
    ProviderKind, StoreError, UserId,
};
use tokio::sync::Notify;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

pub fn alice() -> UserId {
    UserId::from("alice")
}

/// A provider record last changed `minutes` after `base_time`.
pub fn external(id: &str, title: &str, minutes: i64) -> ExternalItem {
    ExternalItem {
        external_id: id.to_string(),
        title: title.to_string(),
        body: String::new(),
        due_at: None,
        completed: false,
        updated_at: base_time() + Duration::minutes(minutes),
        priority: None,
        deeplink: None,
    }
}

#[derive(Default)]
struct ListingState {
    items: Vec<ExternalItem>,
    error: Option<AdapterError>,
    page_size: Option<usize>,
    revision: usize,
    cursors_seen: Vec<Option<String>>,
}

/// In-process provider serving a mutable listing. Clones share state.
///
/// Pages continue with `page:<offset>` cursors; the last page hands out `rev:<n>`.
#[derive(Clone, Default)]
pub struct ListingAdapter {
    state: Arc<Mutex<ListingState>>,
    gate: Option<Arc<Notify>>,
    calls: Arc<AtomicUsize>,
}

impl ListingAdapter {
    pub fn new(items: Vec<ExternalItem>) -> Self {
        let adapter = ListingAdapter::default();
        adapter.set_items(items);
        adapter
    }

    pub fn failing(kind: ErrorKind) -> Self {
        let adapter = ListingAdapter::default();
        adapter.state.lock().unwrap().error = Some(AdapterError::new(kind, "scripted failure"));
        adapter
    }

    /// Every fetch waits for a `Notify` permit first.
    pub fn gated(items: Vec<ExternalItem>) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut adapter = ListingAdapter::new(items);
        adapter.gate = Some(gate.clone());
        (adapter, gate)
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.lock().unwrap().page_size = Some(page_size);
        self
    }

    pub fn set_items(&self, items: Vec<ExternalItem>) {
        let mut state = self.state.lock().unwrap();
        state.items = items;
        state.revision += 1;
    }

    pub fn cursors_seen(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().cursors_seen.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProviderAdapter for ListingAdapter {
    async fn fetch_page(&self, cursor: Option<&str>) -> AdapterResult<Page> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let mut state = self.state.lock().unwrap();
        state.cursors_seen.push(cursor.map(String::from));
        if let Some(error) = &state.error {
            return Err(error.clone());
        }

        let offset = cursor
            .and_then(|c| c.strip_prefix("page:"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        let size = state.page_size.unwrap_or(state.items.len().max(1));
        let end = (offset + size).min(state.items.len());
        let items = state.items[offset.min(end)..end].to_vec();
        let has_more = end < state.items.len();
        let next_cursor = if has_more {
            format!("page:{end}")
        } else {
            format!("rev:{}", state.revision)
        };

        Ok(Page {
            items,
            next_cursor: Some(next_cursor),
            has_more,
        })
    }
}

/// `MemoryStore` with switchable faults.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    fail_commits: AtomicBool,
    fail_cursor_saves: AtomicBool,
    race_identities: AtomicBool,
    commits: AtomicUsize,
    edit_before_commit: Mutex<Option<(ItemId, ItemEdit)>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cursor_saves(&self, fail: bool) {
        self.fail_cursor_saves.store(fail, Ordering::SeqCst);
    }

    /// Apply `edit` to `id` at the start of the next commit, after the plan was computed.
    pub fn edit_before_next_commit(&self, id: ItemId, edit: ItemEdit) {
        *self.edit_before_commit.lock().unwrap() = Some((id, edit));
    }

    /// Make every identity insert lose to a writer that got there first.
    pub fn race_identities(&self, race: bool) {
        self.race_identities.store(race, Ordering::SeqCst);
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl Store for FaultyStore {
    async fn load_items(&self, user: &UserId, scope: ItemScope) -> StoreResult<Vec<Item>> {
        self.inner.load_items(user, scope).await
    }

    async fn commit_plan(&self, user: &UserId, plan: &ReconcilePlan) -> StoreResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        let pending = self.edit_before_commit.lock().unwrap().take();
        if let Some((id, edit)) = pending {
            self.inner.edit_item(user, id, &edit).await?;
        }
        self.inner.commit_plan(user, plan).await
    }

    async fn load_cursor(&self, user: &UserId, provider: ProviderKind) -> StoreResult<SyncCursor> {
        self.inner.load_cursor(user, provider).await
    }

    async fn save_cursor(
        &self,
        user: &UserId,
        provider: ProviderKind,
        cursor: &SyncCursor,
    ) -> StoreResult<()> {
        if self.fail_cursor_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("read-only file system")));
        }
        self.inner.save_cursor(user, provider, cursor).await
    }

    async fn clear_cursor(&self, user: &UserId, provider: ProviderKind) -> StoreResult<()> {
        self.inner.clear_cursor(user, provider).await
    }

    async fn lookup_identity(&self, key: &IdentityKey) -> StoreResult<Option<ItemId>> {
        self.inner.lookup_identity(key).await
    }

    async fn insert_identity(&self, key: &IdentityKey, id: ItemId) -> StoreResult<()> {
        if self.race_identities.load(Ordering::SeqCst) {
            self.inner.insert_identity(key, ItemId::new()).await?;
        }
        self.inner.insert_identity(key, id).await
    }

    async fn insert_native(&self, item: &Item) -> StoreResult<()> {
        self.inner.insert_native(item).await
    }

    async fn edit_item(&self, user: &UserId, id: ItemId, edit: &ItemEdit) -> StoreResult<Item> {
        self.inner.edit_item(user, id, edit).await
    }

    async fn delete_item(
        &self,
        user: &UserId,
        id: ItemId,
        now: DateTime<Utc>,
    ) -> StoreResult<Item> {
        self.inner.delete_item(user, id, now).await
    }

    async fn collect_garbage(&self, user: &UserId, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        self.inner.collect_garbage(user, cutoff).await
    }
}
