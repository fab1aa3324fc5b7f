//! Identity resolution: provider records to stable `ItemId`s.
//!
//! The mapping table lives in the store. Creation is serialized per key with an
//! in-process lock map, and the store's insert-if-absent contract catches other
//! resolvers sharing the same store. Different keys resolve in parallel.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, SyncError};
use crate::item::{ItemId, UserId};
use crate::provider::ProviderKind;
use crate::store::Store;

/// Identity of a provider record, scoped to the user it was fetched for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub user: UserId,
    pub provider: ProviderKind,
    pub external_id: String,
}

impl IdentityKey {
    pub fn new(user: &UserId, provider: ProviderKind, external_id: &str) -> Self {
        IdentityKey {
            user: user.clone(),
            provider,
            external_id: external_id.to_string(),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.user, self.provider, self.external_id)
    }
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;

#[derive(Default)]
pub struct IdentityResolver {
    locks: Mutex<HashMap<IdentityKey, KeyLock>>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the `ItemId` mapped to `key`, creating the mapping on first sight.
    pub async fn resolve<S: Store>(
        &self,
        store: &S,
        key: &IdentityKey,
    ) -> Result<ItemId, SyncError> {
        if let Some(id) = store.lookup_identity(key).await? {
            return Ok(id);
        }

        let lock = self.key_lock(key);
        let result = {
            let _guard = lock.lock().await;
            self.resolve_locked(store, key).await
        };
        self.release(key, lock);
        result
    }

    /// Lookup only. Never creates a mapping.
    pub async fn peek<S: Store>(
        &self,
        store: &S,
        key: &IdentityKey,
    ) -> Result<Option<ItemId>, SyncError> {
        Ok(store.lookup_identity(key).await?)
    }

    async fn resolve_locked<S: Store>(
        &self,
        store: &S,
        key: &IdentityKey,
    ) -> Result<ItemId, SyncError> {
        for attempt in 1..=2 {
            match Self::try_create(store, key).await {
                Ok(id) => return Ok(id),
                Err(SyncError::ConflictRetry) => {
                    debug!(%key, attempt, "identity creation raced, re-reading");
                }
                Err(e) => return Err(e),
            }
        }

        Err(SyncError::IdentityResolutionFailed {
            provider: key.provider,
            external_id: key.external_id.clone(),
        })
    }

    async fn try_create<S: Store>(store: &S, key: &IdentityKey) -> Result<ItemId, SyncError> {
        if let Some(id) = store.lookup_identity(key).await? {
            return Ok(id);
        }

        let id = ItemId::new();
        match store.insert_identity(key, id).await {
            Ok(()) => {
                debug!(%key, %id, "created identity");
                Ok(id)
            }
            Err(StoreError::Conflict(_)) => Err(SyncError::ConflictRetry),
            Err(e) => Err(e.into()),
        }
    }

    fn key_lock(&self, key: &IdentityKey) -> KeyLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.clone()).or_default().clone()
    }

    /// Drop the key's lock entry once no other resolver holds it.
    fn release(&self, key: &IdentityKey, lock: KeyLock) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn key(external_id: &str) -> IdentityKey {
        IdentityKey::new(&UserId::from("alice"), ProviderKind::Jira, external_id)
    }

    #[tokio::test]
    async fn repeated_resolution_returns_same_id() {
        let store = MemoryStore::new();
        let resolver = IdentityResolver::new();

        let first = resolver.resolve(&store, &key("JIRA-1")).await.unwrap();
        let second = resolver.resolve(&store, &key("JIRA-1")).await.unwrap();
        let other = resolver.resolve(&store, &key("JIRA-2")).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(resolver.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn keys_are_scoped_per_user() {
        let store = MemoryStore::new();
        let resolver = IdentityResolver::new();

        let alice = resolver.resolve(&store, &key("JIRA-1")).await.unwrap();
        let bob_key = IdentityKey::new(&UserId::from("bob"), ProviderKind::Jira, "JIRA-1");
        let bob = resolver.resolve(&store, &bob_key).await.unwrap();

        assert_ne!(alice, bob);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_sightings_create_one_identity() {
        let store = Arc::new(MemoryStore::new());
        let resolver = Arc::new(IdentityResolver::new());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..32 {
            let store = store.clone();
            let resolver = resolver.clone();
            tasks.spawn(async move { resolver.resolve(&*store, &key("JIRA-7")).await.unwrap() });
        }

        let mut ids = std::collections::HashSet::new();
        while let Some(id) = tasks.join_next().await {
            ids.insert(id.unwrap());
        }
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn separate_resolvers_converge_through_the_store() {
        // Two engines sharing one store: the loser of the insert re-reads the winner's id.
        let store = MemoryStore::new();
        let a = IdentityResolver::new();
        let b = IdentityResolver::new();
        let shared = key("JIRA-9");

        let (left, right) = tokio::join!(a.resolve(&store, &shared), b.resolve(&store, &shared));
        assert_eq!(left.unwrap(), right.unwrap());
    }

    #[tokio::test]
    async fn peek_does_not_create() {
        let store = MemoryStore::new();
        let resolver = IdentityResolver::new();

        assert_eq!(resolver.peek(&store, &key("JIRA-3")).await.unwrap(), None);
        let id = resolver.resolve(&store, &key("JIRA-3")).await.unwrap();
        assert_eq!(resolver.peek(&store, &key("JIRA-3")).await.unwrap(), Some(id));
    }
}
