//! JSON documents on disk.
//!
//! ```text
//! <root>/<user>/native.json
//! <root>/<user>/providers/<provider>.json
//! ```
//!
//! Every write goes to a uniquely named `.tmp` sibling first and is renamed over the
//! document, so a reader never sees a half-written file. Read-modify-write cycles on one
//! document are serialized within the process by an async mutex and across processes by
//! an advisory lock on a `<document>.lock` sibling.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::identity::IdentityKey;
use crate::item::{Item, ItemEdit, ItemId, UserId};
use crate::provider::ProviderKind;
use crate::reconcile::ReconcilePlan;
use crate::store::document::{self, NativeDocument, ProviderDocument};
use crate::store::{ItemScope, Store};
use crate::sync::SyncCursor;

const NATIVE_FILE: &str = "native.json";
const PROVIDERS_DIR: &str = "providers";

/// Exclusive advisory lock on a document, released when dropped.
struct DocumentLock {
    _file: File,
}

impl DocumentLock {
    async fn acquire(path: &Path) -> StoreResult<Self> {
        let lock_path = path.with_extension("json.lock");
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            if let Some(parent) = lock_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(DocumentLock { _file: file })
    }
}

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn native_path(&self, user: &UserId) -> PathBuf {
        self.root.join(user.as_str()).join(NATIVE_FILE)
    }

    fn provider_path(&self, user: &UserId, provider: ProviderKind) -> PathBuf {
        self.root
            .join(user.as_str())
            .join(PROVIDERS_DIR)
            .join(format!("{}.json", provider.name()))
    }

    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    async fn read<T: DeserializeOwned + Default>(path: &Path) -> StoreResult<T> {
        match fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp = path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        fs::write(&temp, serde_json::to_vec_pretty(value)?).await?;
        fs::rename(&temp, path).await?;
        Ok(())
    }

    /// Locked read-modify-write that always writes the document back.
    async fn rewrite<T, R, F>(&self, path: PathBuf, f: F) -> StoreResult<R>
    where
        T: Serialize + DeserializeOwned + Default + Send,
        R: Send,
        F: FnOnce(&mut T) -> StoreResult<R> + Send,
    {
        let lock = self.lock_for(&path);
        let _guard = lock.lock().await;
        let _file_lock = DocumentLock::acquire(&path).await?;

        let mut doc: T = Self::read(&path).await?;
        let result = f(&mut doc)?;
        Self::write(&path, &doc).await?;
        Ok(result)
    }

    /// Like `rewrite`, but the document is only written back when `f` returns `Some`.
    async fn modify<T, R, F>(&self, path: PathBuf, f: F) -> StoreResult<Option<R>>
    where
        T: Serialize + DeserializeOwned + Default + Send,
        R: Send,
        F: FnOnce(&mut T) -> StoreResult<Option<R>> + Send,
    {
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let lock = self.lock_for(&path);
        let _guard = lock.lock().await;
        let _file_lock = DocumentLock::acquire(&path).await?;

        let mut doc: T = Self::read(&path).await?;
        let result = f(&mut doc)?;
        if result.is_some() {
            Self::write(&path, &doc).await?;
        }
        Ok(result)
    }

    async fn read_provider(
        &self,
        user: &UserId,
        provider: ProviderKind,
    ) -> StoreResult<ProviderDocument> {
        Self::read(&self.provider_path(user, provider)).await
    }

    async fn rewrite_provider<R: Send>(
        &self,
        user: &UserId,
        provider: ProviderKind,
        f: impl FnOnce(&mut ProviderDocument) -> StoreResult<R> + Send,
    ) -> StoreResult<R> {
        self.rewrite(self.provider_path(user, provider), f).await
    }

    /// Run `f` against whichever document holds item `id`.
    async fn modify_item<R: Send>(
        &self,
        user: &UserId,
        id: ItemId,
        f: impl Fn(&mut Item) -> StoreResult<R> + Send + Sync,
    ) -> StoreResult<R> {
        let native = self
            .modify(self.native_path(user), |doc: &mut NativeDocument| {
                document::find_mut(&mut doc.items, id).map(&f).transpose()
            })
            .await?;
        if let Some(result) = native {
            return Ok(result);
        }

        for provider in ProviderKind::ALL {
            let found = self
                .modify(self.provider_path(user, provider), |doc: &mut ProviderDocument| {
                    document::find_mut(&mut doc.items, id).map(&f).transpose()
                })
                .await?;
            if let Some(result) = found {
                return Ok(result);
            }
        }

        Err(StoreError::NotFound(id))
    }
}

impl Store for FileStore {
    async fn load_items(&self, user: &UserId, scope: ItemScope) -> StoreResult<Vec<Item>> {
        match scope {
            ItemScope::Native => {
                let doc: NativeDocument = Self::read(&self.native_path(user)).await?;
                Ok(doc.items)
            }
            ItemScope::Provider(provider) => Ok(self.read_provider(user, provider).await?.items),
            ItemScope::All => {
                let native: NativeDocument = Self::read(&self.native_path(user)).await?;
                let mut items = native.items;
                for provider in ProviderKind::ALL {
                    items.extend(self.read_provider(user, provider).await?.items);
                }
                Ok(items)
            }
        }
    }

    async fn commit_plan(&self, user: &UserId, plan: &ReconcilePlan) -> StoreResult<()> {
        self.rewrite_provider(user, plan.provider, |doc| doc.apply_plan(plan))
            .await
    }

    async fn load_cursor(&self, user: &UserId, provider: ProviderKind) -> StoreResult<SyncCursor> {
        Ok(self.read_provider(user, provider).await?.cursor)
    }

    async fn save_cursor(
        &self,
        user: &UserId,
        provider: ProviderKind,
        cursor: &SyncCursor,
    ) -> StoreResult<()> {
        self.rewrite_provider(user, provider, |doc| {
            doc.cursor = cursor.clone();
            Ok(())
        })
        .await
    }

    async fn clear_cursor(&self, user: &UserId, provider: ProviderKind) -> StoreResult<()> {
        self.save_cursor(user, provider, &SyncCursor::default()).await
    }

    async fn lookup_identity(&self, key: &IdentityKey) -> StoreResult<Option<ItemId>> {
        let doc = self.read_provider(&key.user, key.provider).await?;
        Ok(doc.identities.get(&key.external_id).copied())
    }

    async fn insert_identity(&self, key: &IdentityKey, id: ItemId) -> StoreResult<()> {
        self.rewrite_provider(&key.user, key.provider, |doc| {
            if doc.identities.contains_key(&key.external_id) {
                return Err(StoreError::Conflict(key.to_string()));
            }
            doc.identities.insert(key.external_id.clone(), id);
            Ok(())
        })
        .await
    }

    async fn insert_native(&self, item: &Item) -> StoreResult<()> {
        let path = self.native_path(&item.user_id);
        self.rewrite(path, |doc: &mut NativeDocument| {
            doc.items.push(item.clone());
            Ok(())
        })
        .await
    }

    async fn edit_item(&self, user: &UserId, id: ItemId, edit: &ItemEdit) -> StoreResult<Item> {
        self.modify_item(user, id, |item| Ok(document::edit(item, edit)))
            .await
    }

    async fn delete_item(
        &self,
        user: &UserId,
        id: ItemId,
        now: DateTime<Utc>,
    ) -> StoreResult<Item> {
        self.modify_item(user, id, |item| document::delete(item, now))
            .await
    }

    async fn collect_garbage(&self, user: &UserId, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let collect = |items: &mut Vec<Item>| -> StoreResult<Option<usize>> {
            let removed = document::collect_garbage(items, cutoff);
            Ok((removed > 0).then_some(removed))
        };

        let mut total = self
            .modify(self.native_path(user), |doc: &mut NativeDocument| {
                collect(&mut doc.items)
            })
            .await?
            .unwrap_or(0);

        for provider in ProviderKind::ALL {
            total += self
                .modify(self.provider_path(user, provider), |doc: &mut ProviderDocument| {
                    collect(&mut doc.items)
                })
                .await?
                .unwrap_or(0);
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{FieldChange, NewItem};
    use crate::provider::ExternalItem;
    use crate::store::create_native;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    fn fetched(external_id: &str) -> ExternalItem {
        ExternalItem {
            external_id: external_id.to_string(),
            title: format!("Issue {external_id}"),
            body: String::new(),
            due_at: None,
            completed: false,
            updated_at: now(),
            priority: Some(2),
            deeplink: Some(format!("https://github.com/acme/app/issues/{external_id}")),
        }
    }

    fn github_item(user: &UserId, external_id: &str) -> Item {
        let fetched = fetched(external_id);
        Item::from_external(ItemId::new(), user.clone(), ProviderKind::Github, &fetched, now())
    }

    #[tokio::test]
    async fn committed_plan_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let user = UserId::from("alice");
        let item = github_item(&user, "7");
        let mut plan = ReconcilePlan::new(ProviderKind::Github, now());
        plan.to_create.push(item.clone());

        FileStore::new(dir.path()).commit_plan(&user, &plan).await.unwrap();

        let reopened = FileStore::new(dir.path());
        let items = reopened
            .load_items(&user, ItemScope::Provider(ProviderKind::Github))
            .await
            .unwrap();
        assert_eq!(items, vec![item.clone()]);

        let key = IdentityKey::new(&user, ProviderKind::Github, "7");
        assert_eq!(reopened.lookup_identity(&key).await.unwrap(), Some(item.id));

        let path = dir.path().join("alice/providers/github.json");
        assert!(path.exists());
        assert!(leftover_temp_files(&dir.path().join("alice/providers")).is_empty());
    }

    fn leftover_temp_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "tmp"))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_stores_on_one_directory_do_not_lose_writes() {
        let dir = tempfile::tempdir().unwrap();
        let stores = [
            Arc::new(FileStore::new(dir.path())),
            Arc::new(FileStore::new(dir.path())),
        ];
        let user = UserId::from("alice");

        let mut tasks = tokio::task::JoinSet::new();
        for n in 0..24 {
            let store = stores[n % 2].clone();
            let key = IdentityKey::new(&user, ProviderKind::Jira, &format!("JIRA-{n}"));
            tasks.spawn(async move { store.insert_identity(&key, ItemId::new()).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let doc = FileStore::new(dir.path())
            .read_provider(&user, ProviderKind::Jira)
            .await
            .unwrap();
        assert_eq!(doc.identities.len(), 24);
        assert!(leftover_temp_files(&dir.path().join("alice/providers")).is_empty());
    }

    #[tokio::test]
    async fn edits_reach_provider_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let user = UserId::from("alice");
        let item = github_item(&user, "8");
        let mut plan = ReconcilePlan::new(ProviderKind::Github, now());
        plan.to_create.push(item.clone());
        store.commit_plan(&user, &plan).await.unwrap();

        let edit = ItemEdit::new().set(FieldChange::Title("Triage".into()));
        let edited = store.edit_item(&user, item.id, &edit).await.unwrap();
        assert_eq!(edited.title, "Triage");

        let err = store.delete_item(&user, item.id, now()).await.unwrap_err();
        assert!(matches!(err, StoreError::ExternalDeletion(_, ProviderKind::Github)));
    }

    #[tokio::test]
    async fn native_delete_then_garbage_collect() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let user = UserId::from("alice");
        let new = NewItem {
            title: "Dentist".into(),
            ..NewItem::default()
        };
        let item = create_native(&store, &user, new, now()).await.unwrap();

        let deleted = store.delete_item(&user, item.id, now()).await.unwrap();
        assert!(deleted.is_deleted);

        let kept = store.collect_garbage(&user, now() - Duration::days(30)).await.unwrap();
        assert_eq!(kept, 0);
        let removed = store.collect_garbage(&user, now() + Duration::days(1)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.load_items(&user, ItemScope::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_documents_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let user = UserId::from("nobody");

        assert!(store.load_items(&user, ItemScope::All).await.unwrap().is_empty());
        assert!(store.load_cursor(&user, ProviderKind::Jira).await.unwrap().is_fresh());
        let err = store
            .edit_item(&user, ItemId::new(), &ItemEdit::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
