//! Sync orchestrator.
//!
//! A cycle for one `(user, provider)` pair is: page through the adapter, resolve
//! identities, reconcile against the stored items, commit the plan, advance the cursor.
//! `run_cycle` runs one such cycle per connected provider concurrently and always returns
//! a result for each of them; a failing provider never takes the others down.

mod cursor;
mod in_flight;
mod result;

pub use cursor::SyncCursor;
pub use result::SyncResult;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

use crate::config::SyncPolicy;
use crate::error::{AdapterError, AdapterResult, ErrorKind, SyncError};
use crate::identity::{IdentityKey, IdentityResolver};
use crate::item::{ItemId, UserId};
use crate::provider::{ExternalItem, ProviderAdapter, ProviderKind};
use crate::reconcile::{ReconcileOptions, ReconcilePlan, reconcile};
use crate::store::{ItemScope, Store};

use in_flight::InFlight;

/// Per-provider outcome of a cycle.
pub type CycleReport = BTreeMap<ProviderKind, SyncResult>;

/// Everything one cycle pulled from a provider.
#[derive(Debug)]
struct Fetched {
    items: Vec<ExternalItem>,
    /// Token to store for the next cycle. Only meaningful when `complete`.
    token: Option<String>,
    /// False when the page ceiling stopped paging early.
    complete: bool,
    pages: usize,
}

/// Page through `adapter` from `start` until it runs out or `max_pages` is reached.
async fn fetch_all<A: ProviderAdapter>(
    adapter: &A,
    start: Option<&str>,
    max_pages: usize,
) -> AdapterResult<Fetched> {
    let max_pages = max_pages.max(1);
    let mut items = Vec::new();
    let mut cursor = start.map(String::from);
    let mut pages = 0;

    loop {
        let page = adapter.fetch_page(cursor.as_deref()).await?;
        pages += 1;
        items.extend(page.items);

        if !page.has_more {
            return Ok(Fetched {
                items,
                token: page.next_cursor,
                complete: true,
                pages,
            });
        }

        let Some(next) = page.next_cursor else {
            return Err(AdapterError::new(
                ErrorKind::Unknown,
                "provider reported more pages without a cursor",
            ));
        };

        if pages >= max_pages {
            return Ok(Fetched {
                items,
                token: None,
                complete: false,
                pages,
            });
        }

        cursor = Some(next);
    }
}

type UserAdapters<A> = BTreeMap<ProviderKind, Arc<A>>;

struct Inner<S, A> {
    store: S,
    resolver: IdentityResolver,
    policy: SyncPolicy,
    connections: RwLock<HashMap<UserId, UserAdapters<A>>>,
    global: Arc<Semaphore>,
    per_user: Mutex<HashMap<UserId, Arc<Semaphore>>>,
    in_flight: Arc<InFlight>,
}

pub struct SyncEngine<S, A> {
    inner: Arc<Inner<S, A>>,
}

impl<S, A> Clone for SyncEngine<S, A> {
    fn clone(&self) -> Self {
        SyncEngine {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store, A: ProviderAdapter> SyncEngine<S, A> {
    pub fn new(store: S, policy: SyncPolicy) -> Self {
        let global = Arc::new(Semaphore::new(policy.max_in_flight.max(1)));
        SyncEngine {
            inner: Arc::new(Inner {
                store,
                resolver: IdentityResolver::new(),
                policy,
                connections: RwLock::new(HashMap::new()),
                global,
                per_user: Mutex::new(HashMap::new()),
                in_flight: Arc::new(InFlight::default()),
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.inner.policy
    }

    /// Attach an adapter for `provider` to `user`, replacing any previous one.
    pub fn connect(&self, user: &UserId, provider: ProviderKind, adapter: A) {
        let mut connections = self
            .inner
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        connections
            .entry(user.clone())
            .or_default()
            .insert(provider, Arc::new(adapter));
        debug!(%user, %provider, "provider connected");
    }

    /// Detach a provider. Its stored items stay until the next full resync or GC.
    pub fn disconnect(&self, user: &UserId, provider: ProviderKind) -> bool {
        let mut connections = self
            .inner
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let removed = connections
            .get_mut(user)
            .is_some_and(|adapters| adapters.remove(&provider).is_some());
        if removed {
            debug!(%user, %provider, "provider disconnected");
        }
        removed
    }

    pub fn connected(&self, user: &UserId) -> Vec<ProviderKind> {
        self.adapters(user).into_keys().collect()
    }

    pub fn is_running(&self, user: &UserId, provider: ProviderKind) -> bool {
        self.inner.in_flight.is_running(user, provider)
    }

    fn adapters(&self, user: &UserId) -> UserAdapters<A> {
        let connections = self
            .inner
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        connections.get(user).cloned().unwrap_or_default()
    }

    fn adapter(&self, user: &UserId, provider: ProviderKind) -> Option<Arc<A>> {
        let connections = self
            .inner
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        connections.get(user)?.get(&provider).cloned()
    }

    fn user_semaphore(&self, user: &UserId) -> Arc<Semaphore> {
        let mut per_user = self
            .inner
            .per_user
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let permits = self.inner.policy.max_in_flight_per_user.max(1);
        per_user
            .entry(user.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(permits)))
            .clone()
    }

    fn default_deadline(&self) -> Instant {
        Instant::now() + self.inner.policy.cycle_timeout
    }

    /// Sync every provider connected for `user`, bounded by the configured cycle timeout.
    pub async fn run_cycle(&self, user: &UserId) -> CycleReport {
        self.run_cycle_until(user, self.default_deadline()).await
    }

    pub async fn run_cycle_until(&self, user: &UserId, deadline: Instant) -> CycleReport {
        let adapters = self.adapters(user);
        let mut tasks = JoinSet::new();

        for (&provider, adapter) in &adapters {
            let engine = self.clone();
            let user = user.clone();
            let adapter = Arc::clone(adapter);
            tasks.spawn(async move {
                let result = engine
                    .sync_provider(&user, provider, adapter, deadline, false)
                    .await;
                (provider, result)
            });
        }

        let mut report = CycleReport::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((provider, result)) => {
                    report.insert(provider, result);
                }
                Err(e) => error!(%user, error = %e, "provider task did not finish"),
            }
        }

        for provider in adapters.keys() {
            report
                .entry(*provider)
                .or_insert_with(|| SyncResult::failed(ErrorKind::Unknown, "provider task aborted"));
        }

        report
    }

    pub async fn run_cycle_for_provider(&self, user: &UserId, provider: ProviderKind) -> SyncResult {
        self.run_cycle_for_provider_until(user, provider, self.default_deadline())
            .await
    }

    pub async fn run_cycle_for_provider_until(
        &self,
        user: &UserId,
        provider: ProviderKind,
        deadline: Instant,
    ) -> SyncResult {
        match self.adapter(user, provider) {
            Some(adapter) => {
                self.sync_provider(user, provider, adapter, deadline, false)
                    .await
            }
            None => SyncResult::from(&SyncError::NotConnected(provider)),
        }
    }

    /// Forget the stored cursor and run a cycle from the start of the listing.
    pub async fn full_resync(&self, user: &UserId, provider: ProviderKind) -> SyncResult {
        match self.adapter(user, provider) {
            Some(adapter) => {
                let deadline = self.default_deadline();
                self.sync_provider(user, provider, adapter, deadline, true)
                    .await
            }
            None => SyncResult::from(&SyncError::NotConnected(provider)),
        }
    }

    /// Fetch and reconcile without committing anything or creating identities.
    ///
    /// Items never seen before get throwaway ids in the returned plan.
    pub async fn preview(
        &self,
        user: &UserId,
        provider: ProviderKind,
    ) -> Result<ReconcilePlan, SyncError> {
        let adapter = self
            .adapter(user, provider)
            .ok_or(SyncError::NotConnected(provider))?;
        let store = &self.inner.store;

        let cursor = store.load_cursor(user, provider).await?;
        let fetch = fetch_all(&*adapter, cursor.token.as_deref(), self.inner.policy.max_pages);
        let fetched = timeout_at(self.default_deadline(), fetch)
            .await
            .map_err(|_| SyncError::Timeout)??;

        let stored = store.load_items(user, ItemScope::Provider(provider)).await?;
        let mut identities = HashMap::new();
        for item in &fetched.items {
            if identities.contains_key(&item.external_id) {
                continue;
            }
            let key = IdentityKey::new(user, provider, &item.external_id);
            let id = self
                .inner
                .resolver
                .peek(store, &key)
                .await?
                .unwrap_or_else(ItemId::new);
            identities.insert(item.external_id.clone(), id);
        }

        Ok(reconcile(
            provider,
            user,
            &fetched.items,
            &stored,
            &identities,
            &self.reconcile_options(fetched.complete),
            Utc::now(),
        ))
    }

    fn reconcile_options(&self, complete: bool) -> ReconcileOptions {
        ReconcileOptions {
            deletion_threshold: self.inner.policy.deletion_threshold,
            detect_missing: complete,
        }
    }

    async fn sync_provider(
        &self,
        user: &UserId,
        provider: ProviderKind,
        adapter: Arc<A>,
        deadline: Instant,
        reset_cursor: bool,
    ) -> SyncResult {
        let Some(_guard) = self.inner.in_flight.try_begin(user, provider) else {
            warn!(%user, %provider, "cycle already running, not starting another");
            return SyncResult::from(&SyncError::AlreadyRunning(provider));
        };

        let started = std::time::Instant::now();
        match self
            .cycle(user, provider, &adapter, deadline, reset_cursor)
            .await
        {
            Ok(result) => {
                info!(
                    %user,
                    %provider,
                    created = result.created,
                    updated = result.updated,
                    soft_deleted = result.soft_deleted,
                    skipped = result.skipped,
                    truncated = result.truncated,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "sync cycle committed"
                );
                result
            }
            Err(e) => {
                warn!(
                    %user,
                    %provider,
                    kind = %e.kind(),
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "sync cycle failed"
                );
                SyncResult::from(&e)
            }
        }
    }

    async fn acquire_permits(
        &self,
        user: &UserId,
    ) -> Result<(OwnedSemaphorePermit, OwnedSemaphorePermit), SyncError> {
        let global = Arc::clone(&self.inner.global)
            .acquire_owned()
            .await
            .map_err(|_| SyncError::Shutdown)?;
        let local = self
            .user_semaphore(user)
            .acquire_owned()
            .await
            .map_err(|_| SyncError::Shutdown)?;
        Ok((global, local))
    }

    async fn cycle(
        &self,
        user: &UserId,
        provider: ProviderKind,
        adapter: &A,
        deadline: Instant,
        reset_cursor: bool,
    ) -> Result<SyncResult, SyncError> {
        let store = &self.inner.store;

        if reset_cursor {
            store.clear_cursor(user, provider).await?;
            info!(%user, %provider, "cursor cleared for full resync");
        }
        let cursor = store.load_cursor(user, provider).await?;

        // Permit wait and fetch share the deadline. Partial pages are dropped on expiry.
        let max_pages = self.inner.policy.max_pages;
        let (_permits, fetched) = timeout_at(deadline, async {
            let permits = self.acquire_permits(user).await?;
            let fetched = fetch_all(adapter, cursor.token.as_deref(), max_pages).await?;
            Ok::<_, SyncError>((permits, fetched))
        })
        .await
        .map_err(|_| SyncError::Timeout)??;

        debug!(
            %user,
            %provider,
            pages = fetched.pages,
            items = fetched.items.len(),
            complete = fetched.complete,
            "fetched provider listing"
        );
        if !fetched.complete {
            warn!(%user, %provider, max_pages, "page ceiling reached, not inferring deletions");
        }

        let stored = store.load_items(user, ItemScope::Provider(provider)).await?;
        let identities = self.resolve_identities(user, provider, &fetched.items).await?;

        let plan = reconcile(
            provider,
            user,
            &fetched.items,
            &stored,
            &identities,
            &self.reconcile_options(fetched.complete),
            Utc::now(),
        );

        if !plan.is_empty() {
            store
                .commit_plan(user, &plan)
                .await
                .map_err(SyncError::StorageCommitFailed)?;
        }

        let result = SyncResult::from_plan(&plan, !fetched.complete);
        if fetched.complete && plan.skipped == 0 {
            let cursor = SyncCursor::advanced(fetched.token, plan.synced_at);
            if let Err(e) = store.save_cursor(user, provider, &cursor).await {
                let e = SyncError::StorageCommitFailed(e);
                warn!(%user, %provider, error = %e, "plan committed but cursor was not saved");
                return Ok(result.with_failure(&e));
            }
        }

        Ok(result)
    }

    /// Map every fetched external id to an `ItemId`. Ids that fail to resolve are left
    /// out of the map and end up counted as skipped by the reconciler.
    async fn resolve_identities(
        &self,
        user: &UserId,
        provider: ProviderKind,
        fetched: &[ExternalItem],
    ) -> Result<HashMap<String, ItemId>, SyncError> {
        let mut identities = HashMap::with_capacity(fetched.len());
        for item in fetched {
            if identities.contains_key(&item.external_id) {
                continue;
            }
            let key = IdentityKey::new(user, provider, &item.external_id);
            match self.inner.resolver.resolve(&self.inner.store, &key).await {
                Ok(id) => {
                    identities.insert(item.external_id.clone(), id);
                }
                Err(e @ SyncError::IdentityResolutionFailed { .. }) => {
                    warn!(%key, error = %e, "skipping item");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(identities)
    }
}
