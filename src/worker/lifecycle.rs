//! Lifecycle Controller Module
//!
//! Install, activate, fetch and message handling of the offline worker,
//! independent of any particular host platform.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::strategy::{cache_key, classify, is_cacheable};
use crate::cache::{
    CacheStats, CacheStorage, Clock, EntryIndex, LruEvictor, Request, Response, Strategy,
};
use crate::error::{OfflineError, Result};
use crate::queue::{EventKind, EventLog};
use crate::storage::Database;
use crate::worker::{
    CacheNames, ClientCommand, ClientRegistry, Network, WorkerConfig, WorkerMessage,
};

// == Worker State ==
/// Platform-driven lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to activate
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    /// Only an active worker intercepts fetches.
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub precached: usize,
    /// The host should activate right away instead of waiting
    pub skip_waiting: bool,
}

/// Result of an activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub deleted_caches: Vec<String>,
    /// Metadata records dropped because their entry no longer exists
    pub pruned_metadata: usize,
    pub claimed_clients: usize,
    pub notified_clients: usize,
}

/// What a page message led to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MessageOutcome {
    Activated(ActivationReport),
    /// Recognized command, but there was no waiting worker
    NothingWaiting,
    /// Unrecognized command shape
    Ignored,
}

// == Lifecycle Controller ==
/// The offline worker.
///
/// Collaborators are injected so hosts and tests choose the cache storage,
/// network and database. All shared state sits behind async locks that are
/// never held across a network fetch.
pub struct LifecycleController {
    config: Arc<WorkerConfig>,
    names: CacheNames,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    index: EntryIndex,
    evictor: LruEvictor,
    events: EventLog,
    clients: Arc<ClientRegistry>,
    state: RwLock<WorkerState>,
    stats: RwLock<CacheStats>,
    writes_since_check: AtomicU64,
}

impl LifecycleController {
    // == Constructor ==
    pub fn new(
        config: WorkerConfig,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        db: Database,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let names = config.cache_names();
        let index = EntryIndex::new(db.clone(), clock);
        let evictor = LruEvictor::new(caches.clone(), index.clone());

        Self {
            config: Arc::new(config),
            names,
            caches,
            network,
            index,
            evictor,
            events: EventLog::new(db),
            clients: Arc::new(ClientRegistry::new()),
            state: RwLock::new(WorkerState::Parsed),
            stats: RwLock::new(CacheStats::new()),
            writes_since_check: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn cache_names(&self) -> &CacheNames {
        &self.names
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Moves to `next` if the current state is one of `from`, returning the
    /// previous state.
    async fn transition(&self, from: &[WorkerState], next: WorkerState) -> Result<WorkerState> {
        let mut state = self.state.write().await;
        let previous = *state;
        if !from.contains(&previous) {
            return Err(OfflineError::InvalidState(format!(
                "cannot move from {:?} to {:?}",
                previous, next
            )));
        }
        *state = next;
        Ok(previous)
    }

    async fn set_state(&self, next: WorkerState) {
        *self.state.write().await = next;
    }

    async fn log_event(&self, kind: EventKind, detail: Option<String>) {
        if let Err(e) = self.events.record(kind, detail).await {
            warn!("Could not record {:?} event: {}", kind, e);
        }
    }

    // == Install ==
    /// Seeds the precache with every manifest asset.
    ///
    /// All assets are fetched before any is written, so a failure leaves the
    /// precache untouched and the worker in its previous state, ready for the
    /// platform to retry. Installing again overwrites entries in place.
    ///
    /// # Errors
    /// `PrecacheFailure` if any asset fails to fetch or answers non-2xx.
    pub async fn install(&self) -> Result<InstallReport> {
        let previous = self
            .transition(
                &[
                    WorkerState::Parsed,
                    WorkerState::Installed,
                    WorkerState::Activated,
                ],
                WorkerState::Installing,
            )
            .await?;

        match self.precache().await {
            Ok(precached) => {
                let next = if previous == WorkerState::Activated {
                    WorkerState::Activated
                } else {
                    WorkerState::Installed
                };
                self.set_state(next).await;
                self.stats.write().await.set_precached(precached);
                self.log_event(
                    EventKind::Installed,
                    Some(format!("{} assets into {}", precached, self.names.precache)),
                )
                .await;
                info!(
                    "Worker v{} installed: {} assets precached",
                    self.config.version, precached
                );

                Ok(InstallReport {
                    precached,
                    skip_waiting: self.config.skip_waiting_on_install,
                })
            }
            Err(e) => {
                self.set_state(previous).await;
                self.log_event(EventKind::InstallFailed, Some(e.to_string()))
                    .await;
                warn!("Worker v{} install failed: {}", self.config.version, e);
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize> {
        let urls = self
            .config
            .precache_urls()
            .map_err(|e| OfflineError::PrecacheFailure(e.to_string()))?;

        let mut fetched = Vec::with_capacity(urls.len());
        for url in urls {
            let request = Request::get(url);
            let response = self.network.fetch(&request).await.map_err(|e| {
                OfflineError::PrecacheFailure(format!("{}: {}", request.url, e))
            })?;
            if !response.ok() {
                return Err(OfflineError::PrecacheFailure(format!(
                    "{}: status {}",
                    request.url, response.status
                )));
            }
            debug!("Precache fetched {}", request.url);
            fetched.push((cache_key(&request), response));
        }

        self.caches.open(&self.names.precache).await?;
        for (key, response) in &fetched {
            self.caches
                .put(&self.names.precache, key, response.clone())
                .await?;
            self.index.record(&self.names.precache, key, response).await?;
        }
        Ok(fetched.len())
    }

    // == Activate ==
    /// Deletes stale caches, claims every client and tells them so.
    pub async fn activate(&self) -> Result<ActivationReport> {
        self.transition(
            &[WorkerState::Installed, WorkerState::Activating],
            WorkerState::Activating,
        )
        .await?;

        let mut report = ActivationReport::default();
        for name in self.caches.cache_names().await? {
            if self.names.is_current(&name) {
                continue;
            }
            self.caches.delete_cache(&name).await?;
            if let Err(e) = self.index.remove_cache(&name).await {
                warn!("Could not drop metadata of '{}': {}", name, e);
            }
            info!("Deleted stale cache '{}'", name);
            report.deleted_caches.push(name);
        }

        self.caches.open(&self.names.runtime).await?;
        self.caches.open(&self.names.queue).await?;

        match self.prune_metadata().await {
            Ok(pruned) => report.pruned_metadata = pruned,
            Err(e) => warn!("Could not prune cache metadata: {}", e),
        }

        report.claimed_clients = self.clients.claim().await;
        report.notified_clients = self.clients.broadcast(WorkerMessage::SwActivated).await;

        self.set_state(WorkerState::Activated).await;
        self.log_event(
            EventKind::Activated,
            Some(format!(
                "v{}, {} stale caches deleted",
                self.config.version,
                report.deleted_caches.len()
            )),
        )
        .await;
        info!(
            "Worker v{} activated: {} clients claimed",
            self.config.version, report.claimed_clients
        );

        Ok(report)
    }

    /// Drops metadata records that no longer describe a stored entry: those
    /// of caches outside the allow-list, and those whose entry is gone (for
    /// example after a restart with volatile cache storage).
    async fn prune_metadata(&self) -> Result<usize> {
        let mut live: HashMap<String, HashSet<String>> = HashMap::new();
        for name in self.names.allow_list() {
            live.insert(
                name.to_string(),
                self.caches.keys(name).await?.into_iter().collect(),
            );
        }

        let mut pruned = 0;
        for entry in self.index.all().await? {
            let stored = live
                .get(&entry.cache)
                .is_some_and(|keys| keys.contains(&entry.key));
            if !stored {
                self.index.remove(&entry.cache, &entry.key).await?;
                pruned += 1;
            }
        }
        if pruned > 0 {
            info!("Pruned {} orphaned cache metadata records", pruned);
        }
        Ok(pruned)
    }

    /// Marks the worker as replaced.
    pub async fn retire(&self) {
        self.set_state(WorkerState::Redundant).await;
        self.log_event(EventKind::Retired, None).await;
        info!("Worker v{} retired", self.config.version);
    }

    // == Fetch ==
    /// Answers a request according to its strategy.
    ///
    /// # Errors
    /// `NetworkFailure` when the network fails and no cached copy exists.
    pub async fn fetch(&self, request: &Request) -> Result<Response> {
        if !self.state().await.can_intercept_fetch() {
            return self.network.fetch(request).await;
        }

        match classify(request, self.config.asset_match) {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::PassThrough => self.network.fetch(request).await,
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<Response> {
        let key = cache_key(request);
        if let Some(response) = self.lookup(&key).await? {
            self.stats.write().await.record_hit();
            return Ok(response);
        }

        self.stats.write().await.record_miss();
        let response = self.network.fetch(request).await?;
        self.store_runtime(&key, &response).await;
        Ok(response)
    }

    async fn network_first(&self, request: &Request) -> Result<Response> {
        let key = cache_key(request);
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_runtime(&key, &response).await;
                Ok(response)
            }
            Err(e) => match self.lookup(&key).await {
                Ok(Some(response)) => {
                    debug!("Network failed for {}, serving cached copy", request.url);
                    self.stats.write().await.record_fallback();
                    Ok(response)
                }
                Ok(None) => Err(e),
                Err(lookup_error) => {
                    warn!("Cache fallback for {} failed: {}", request.url, lookup_error);
                    Err(e)
                }
            },
        }
    }

    /// Finds a cached response in the runtime cache, then the precache,
    /// stamping its access time.
    async fn lookup(&self, key: &str) -> Result<Option<Response>> {
        for cache in [&self.names.runtime, &self.names.precache] {
            if let Some(response) = self.caches.match_key(cache, key).await? {
                if let Err(e) = self.index.touch(cache, key, &response).await {
                    warn!("Could not update access time of '{}': {}", key, e);
                }
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    /// Stores a cacheable response in the runtime cache. Failures only cost
    /// the cached copy, never the response.
    async fn store_runtime(&self, key: &str, response: &Response) {
        if !is_cacheable(response) {
            return;
        }

        let runtime = &self.names.runtime;
        if let Err(e) = self.caches.put(runtime, key, response.clone()).await {
            warn!("Could not cache '{}': {}", key, e);
            return;
        }
        if let Err(e) = self.index.record(runtime, key, response).await {
            warn!("Could not record metadata of '{}': {}", key, e);
        }

        let writes = self.writes_since_check.fetch_add(1, Ordering::SeqCst) + 1;
        if writes >= self.config.eviction_check_every {
            self.writes_since_check.store(0, Ordering::SeqCst);
            if let Err(e) = self.enforce_budget().await {
                warn!("Opportunistic eviction failed: {}", e);
            }
        }
    }

    // == Enforce Budget ==
    /// Evicts from the runtime cache if it exceeds the configured budget.
    /// Returns the number of entries removed.
    pub async fn enforce_budget(&self) -> Result<usize> {
        let runtime = &self.names.runtime;
        let max_bytes = self.config.max_runtime_bytes;

        if !self.evictor.is_over_limit(runtime, max_bytes).await? {
            return Ok(0);
        }

        let evicted = self.evictor.evict_to_fit(runtime, max_bytes).await?;
        if evicted > 0 {
            self.stats.write().await.record_evictions(evicted);
            self.log_event(
                EventKind::Evicted,
                Some(format!("{} entries from {}", evicted, runtime)),
            )
            .await;
        }
        Ok(evicted)
    }

    /// Evicts from any named cache down to `max_bytes`.
    pub async fn evict_to_fit(&self, cache_name: &str, max_bytes: u64) -> Result<usize> {
        let evicted = self.evictor.evict_to_fit(cache_name, max_bytes).await?;
        self.stats.write().await.record_evictions(evicted);
        Ok(evicted)
    }

    // == Message ==
    /// Handles a page message. Unknown shapes are ignored, never an error.
    pub async fn message(&self, raw: &Value) -> Result<MessageOutcome> {
        match ClientCommand::parse(raw) {
            Some(ClientCommand::SkipWaiting) => {
                if self.state().await == WorkerState::Installed {
                    info!("SKIP_WAITING received, activating now");
                    Ok(MessageOutcome::Activated(self.activate().await?))
                } else {
                    Ok(MessageOutcome::NothingWaiting)
                }
            }
            None => {
                debug!("Ignoring unrecognized message: {}", raw);
                Ok(MessageOutcome::Ignored)
            }
        }
    }
}
