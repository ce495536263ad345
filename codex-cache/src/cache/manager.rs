//! Two-tier document cache with LRU eviction and stale-while-revalidate

use crate::cache::{
    clock::{Clock, SystemClock},
    config::CacheConfig,
    entry::{CacheEntry, Freshness},
    invalidation::{InvalidationReason, UriPattern},
    persistence::CachePersistence,
    types::{CacheLayer, CacheLookup, CacheStats},
};
use crate::error::Result;
use crate::reference::{parse_uri, Reference};
use crate::storage::{FetchOptions, FetchResult, StorageManager};
use crate::ttl::TypeRegistry;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Options for a cached read
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// TTL for a newly fetched entry; overrides the type registry and default
    pub ttl: Option<Duration>,
    /// Passed to the storage providers on a fetch
    pub fetch: FetchOptions,
}

impl GetOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.fetch.branch = Some(branch.into());
        self
    }
}

type RefreshFuture = Shared<BoxFuture<'static, ()>>;
type RefreshRegistry = Arc<Mutex<HashMap<String, RefreshFuture>>>;

/// Document cache: an in-memory LRU index over the on-disk store, filled
/// from the storage providers on a miss
///
/// - Fresh entries are served with no I/O beyond the first disk load
/// - Stale entries are served immediately while one background refresh
///   per URI fetches a replacement
/// - Expired or missing entries are fetched synchronously
/// - Memory is bounded by entry count and total bytes; eviction never
///   touches disk
#[derive(Clone)]
pub struct CacheManager {
    config: CacheConfig,
    persistence: CachePersistence,
    storage: StorageManager,
    clock: Arc<dyn Clock>,
    type_registry: Option<Arc<TypeRegistry>>,
    store: Arc<RwLock<CacheStore>>,
    refreshes: RefreshRegistry,
}

/// In-memory index
#[derive(Default)]
struct CacheStore {
    entries: HashMap<String, CacheEntry>,

    /// Access order, least recently used first
    lru_queue: VecDeque<String>,

    current_size_bytes: u64,

    /// Runtime counters
    stats: CacheStats,
}

impl CacheStore {
    fn promote(&mut self, uri: &str) {
        self.lru_queue.retain(|k| k != uri);
        self.lru_queue.push_back(uri.to_string());
    }

    fn insert(&mut self, entry: CacheEntry) {
        let uri = entry.uri().to_string();
        self.current_size_bytes += entry.size();
        if let Some(previous) = self.entries.insert(uri.clone(), entry) {
            self.current_size_bytes = self.current_size_bytes.saturating_sub(previous.size());
        }
        self.promote(&uri);
    }

    fn remove(&mut self, uri: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(uri)?;
        self.lru_queue.retain(|k| k != uri);
        self.current_size_bytes = self.current_size_bytes.saturating_sub(entry.size());
        Some(entry)
    }

    /// Evict least recently used entries until both limits hold
    fn evict(&mut self, config: &CacheConfig) {
        while self.entries.len() > config.max_memory_entries {
            let Some(uri) = self.lru_queue.pop_front() else {
                break;
            };
            self.evict_one(&uri, InvalidationReason::CountLimit);
        }

        while self.current_size_bytes > config.max_memory_bytes {
            let Some(uri) = self.lru_queue.pop_front() else {
                break;
            };
            self.evict_one(&uri, InvalidationReason::SizeLimit);
        }
    }

    fn evict_one(&mut self, uri: &str, reason: InvalidationReason) {
        if self.remove(uri).is_some() {
            debug!("Evicting {} from memory ({})", uri, reason);
            match reason {
                InvalidationReason::SizeLimit => self.stats.evictions_size += 1,
                _ => self.stats.evictions_count += 1,
            }
        }
    }
}

/// Removes a URI from the refresh registry when the refresh task ends,
/// however it ends
struct RefreshGuard {
    registry: RefreshRegistry,
    uri: String,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.remove(&self.uri);
    }
}

impl CacheManager {
    pub fn new(config: CacheConfig, storage: StorageManager) -> Self {
        Self::with_clock(config, storage, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, storage: StorageManager, clock: Arc<dyn Clock>) -> Self {
        info!(
            "Initializing document cache at {} (ttl {:?}, stale window {:?})",
            config.cache_dir.display(),
            config.default_ttl,
            config.stale_window
        );

        Self {
            persistence: CachePersistence::new(config.cache_dir.clone(), config.atomic_writes),
            config,
            storage,
            clock,
            type_registry: None,
            store: Arc::new(RwLock::new(CacheStore::default())),
            refreshes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Pick TTLs for new entries from artifact types when the caller gives none
    pub fn with_type_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.type_registry = Some(registry);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn persistence(&self) -> &CachePersistence {
        &self.persistence
    }

    /// Read a document through the cache
    pub async fn get(&self, reference: &Reference, options: &GetOptions) -> Result<FetchResult> {
        let uri = &reference.uri;
        let now = self.clock.now();

        if let Some((entry, layer)) = self.load(uri).await {
            let freshness = entry.freshness(now, self.config.stale_window);
            let servable = match freshness {
                Freshness::Fresh => true,
                Freshness::Stale => self.config.stale_while_revalidate,
                Freshness::Expired => false,
            };

            if servable {
                debug!("Cache hit ({}, {}): {}", layer, freshness, uri);
                let result = self
                    .touch(uri, layer)
                    .await
                    .unwrap_or_else(|| entry.to_fetch_result());
                if freshness == Freshness::Stale {
                    self.spawn_refresh(reference.clone(), options.clone()).await;
                }
                return Ok(result);
            }

            debug!("Cache entry {} for {}, fetching", freshness, uri);
        } else {
            debug!("Cache miss: {}", uri);
        }

        self.store.write().await.stats.misses += 1;
        self.fetch_and_store(reference, options).await
    }

    /// Whether a non-expired entry exists in memory or on disk
    pub async fn has(&self, uri: &str) -> bool {
        self.lookup(uri)
            .await
            .freshness
            .is_some_and(|f| f != Freshness::Expired)
    }

    /// Probe the cache without touching counters, LRU order or disk state
    pub async fn lookup(&self, uri: &str) -> CacheLookup {
        let now = self.clock.now();

        {
            let store = self.store.read().await;
            if let Some(entry) = store.entries.get(uri) {
                return CacheLookup::hit(
                    entry.freshness(now, self.config.stale_window),
                    CacheLayer::Memory,
                );
            }
        }

        match self.persistence.read_metadata(uri).await {
            Ok(Some(metadata)) => CacheLookup::hit(
                metadata.freshness(now, self.config.stale_window),
                CacheLayer::Disk,
            ),
            _ => CacheLookup::miss(),
        }
    }

    /// Store content directly, without consulting providers
    pub async fn set(&self, uri: &str, result: FetchResult, ttl: Option<Duration>) -> Result<()> {
        let parsed = parse_uri(uri)?;
        let uri = parsed.to_uri();
        let ttl = self.resolve_ttl(&parsed.path, ttl);
        self.store_entry(&uri, result, ttl).await?;
        Ok(())
    }

    /// Remove one URI from memory and disk; `true` if it was cached anywhere
    pub async fn invalidate(&self, uri: &str) -> Result<bool> {
        let in_memory = {
            let mut store = self.store.write().await;
            let removed = store.remove(uri).is_some();
            store.stats.invalidations += 1;
            removed
        };
        let on_disk = self.persistence.delete(uri).await?;

        if in_memory || on_disk {
            debug!("Invalidated {} ({})", uri, InvalidationReason::Manual);
        }
        Ok(in_memory || on_disk)
    }

    /// Remove every cached URI matching a glob pattern; returns how many
    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        let pattern = UriPattern::new(pattern)?;

        let mut uris: BTreeSet<String> = self.persistence.list().await?.into_iter().collect();
        uris.extend(self.store.read().await.entries.keys().cloned());

        let mut removed = 0;
        for uri in uris.iter().filter(|uri| pattern.matches(uri)) {
            if self.invalidate(uri).await? {
                removed += 1;
            }
        }

        info!("Invalidated {} entries ({})", removed, pattern.reason());
        Ok(removed)
    }

    /// Drop everything from memory and disk; returns the number of entries removed
    pub async fn clear(&self) -> Result<usize> {
        let in_memory: BTreeSet<String> = {
            let mut store = self.store.write().await;
            let uris = store.entries.keys().cloned().collect();
            store.entries.clear();
            store.lru_queue.clear();
            store.current_size_bytes = 0;
            uris
        };
        let on_disk = self.persistence.list().await?;
        self.persistence.clear().await?;

        let mut all = in_memory;
        all.extend(on_disk);
        {
            let mut store = self.store.write().await;
            store.stats.invalidations += all.len() as u64;
        }

        info!("Cleared {} entries ({})", all.len(), InvalidationReason::Cleared);
        Ok(all.len())
    }

    /// Remove entries whose `expires_at` has passed, stale ones included
    pub async fn clear_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut removed: BTreeSet<String> =
            self.persistence.clear_expired(now).await?.into_iter().collect();

        {
            let mut store = self.store.write().await;
            let expired: Vec<String> = store
                .entries
                .values()
                .filter(|e| e.metadata.expires_at <= now)
                .map(|e| e.uri().to_string())
                .collect();
            for uri in expired {
                store.remove(&uri);
                removed.insert(uri);
            }
            store.stats.invalidations += removed.len() as u64;
        }

        if !removed.is_empty() {
            debug!("Removed {} entries ({})", removed.len(), InvalidationReason::Expired);
        }
        Ok(removed.len())
    }

    /// Disk counts by freshness, overlaid with memory usage and counters
    pub async fn get_stats(&self) -> Result<CacheStats> {
        let now = self.clock.now();
        let disk = self.persistence.stats(now, self.config.stale_window).await?;
        let store = self.store.read().await;

        Ok(CacheStats {
            entry_count: disk.entry_count,
            total_size: disk.total_size,
            fresh_count: disk.fresh_count,
            stale_count: disk.stale_count,
            expired_count: disk.expired_count,
            memory_entries: store.entries.len(),
            memory_size: store.current_size_bytes,
            ..store.stats.clone()
        })
    }

    /// Warm the cache; failures are logged and skipped. Returns the number
    /// of references that were loaded.
    pub async fn preload(&self, references: &[Reference], options: &GetOptions) -> usize {
        let results = join_all(references.iter().map(|r| self.get(r, options))).await;

        let mut loaded = 0;
        for (reference, result) in references.iter().zip(results) {
            match result {
                Ok(_) => loaded += 1,
                Err(e) => debug!("Preload of {} failed: {}", reference.uri, e),
            }
        }
        info!("Preloaded {}/{} references", loaded, references.len());
        loaded
    }

    /// URIs with a background refresh in flight
    pub fn in_flight_refreshes(&self) -> Vec<String> {
        let registry = self.refreshes.lock().unwrap_or_else(|e| e.into_inner());
        let mut uris: Vec<String> = registry.keys().cloned().collect();
        uris.sort();
        uris
    }

    /// Wait until every refresh in flight at call time has settled
    pub async fn wait_for_refreshes(&self) {
        let pending: Vec<RefreshFuture> = {
            let registry = self.refreshes.lock().unwrap_or_else(|e| e.into_inner());
            registry.values().cloned().collect()
        };
        join_all(pending).await;
    }

    /// Entries held in memory
    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.entries.is_empty()
    }

    /// Content bytes held in memory
    pub async fn size_bytes(&self) -> u64 {
        self.store.read().await.current_size_bytes
    }

    pub async fn contains_in_memory(&self, uri: &str) -> bool {
        self.store.read().await.entries.contains_key(uri)
    }

    /// Find an entry in memory, else load it from disk into memory
    async fn load(&self, uri: &str) -> Option<(CacheEntry, CacheLayer)> {
        {
            let store = self.store.read().await;
            if let Some(entry) = store.entries.get(uri) {
                return Some((entry.clone(), CacheLayer::Memory));
            }
        }

        match self.persistence.read(uri).await {
            Ok(Some(entry)) => {
                let mut store = self.store.write().await;
                store.insert(entry.clone());
                store.evict(&self.config);
                Some((entry, CacheLayer::Disk))
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to load cached {} from disk: {}", uri, e);
                None
            }
        }
    }

    /// Record a hit on a memory-resident entry and return its content
    async fn touch(&self, uri: &str, layer: CacheLayer) -> Option<FetchResult> {
        let now = self.clock.now();
        let mut store = self.store.write().await;
        match layer {
            CacheLayer::Memory => store.stats.memory_hits += 1,
            CacheLayer::Disk => store.stats.disk_hits += 1,
        }

        let entry = store.entries.get_mut(uri)?;
        entry.touch(now);
        let result = entry.to_fetch_result();
        store.promote(uri);
        Some(result)
    }

    fn resolve_ttl(&self, path: &str, explicit: Option<Duration>) -> Duration {
        explicit
            .or_else(|| {
                self.type_registry
                    .as_ref()
                    .and_then(|registry| registry.ttl_for(path))
            })
            .unwrap_or(self.config.default_ttl)
    }

    async fn fetch_and_store(&self, reference: &Reference, options: &GetOptions) -> Result<FetchResult> {
        let result = self.storage.fetch(reference, &options.fetch).await?;
        let ttl = self.resolve_ttl(&reference.path, options.ttl);
        self.store_entry(&reference.uri, result, ttl).await
    }

    /// Wrap, persist and index a result, superseding any existing entry
    async fn store_entry(&self, uri: &str, result: FetchResult, ttl: Duration) -> Result<FetchResult> {
        let previous_accesses = self.access_count(uri).await;

        let mut entry = CacheEntry::new(uri, result, ttl, self.clock.now());
        entry.metadata.access_count = previous_accesses;

        self.persistence.write(&entry).await?;
        let result = entry.to_fetch_result();

        let mut store = self.store.write().await;
        store.insert(entry);
        store.evict(&self.config);
        Ok(result)
    }

    async fn access_count(&self, uri: &str) -> u64 {
        if let Some(entry) = self.store.read().await.entries.get(uri) {
            return entry.metadata.access_count;
        }
        match self.persistence.read_metadata(uri).await {
            Ok(Some(metadata)) => metadata.access_count,
            _ => 0,
        }
    }

    /// Start a background refresh unless one is already running for this URI
    async fn spawn_refresh(&self, reference: Reference, options: GetOptions) {
        let started = {
            let mut registry = self.refreshes.lock().unwrap_or_else(|e| e.into_inner());
            if registry.contains_key(&reference.uri) {
                debug!("Refresh already in flight: {}", reference.uri);
                false
            } else {
                let uri = reference.uri.clone();
                let guard = RefreshGuard {
                    registry: Arc::clone(&self.refreshes),
                    uri: uri.clone(),
                };
                let manager = self.clone();

                let handle = tokio::spawn(async move {
                    let _guard = guard;
                    manager.refresh(&reference, &options).await;
                });
                let settled = async move {
                    let _ = handle.await;
                }
                .boxed()
                .shared();

                registry.insert(uri, settled);
                true
            }
        };

        if started {
            self.store.write().await.stats.refreshes_started += 1;
        }
    }

    async fn refresh(&self, reference: &Reference, options: &GetOptions) {
        debug!("Refreshing stale entry: {}", reference.uri);
        match self.fetch_and_store(reference, options).await {
            Ok(_) => debug!("Refreshed {}", reference.uri),
            Err(e) => {
                warn!("Background refresh of {} failed: {}", reference.uri, e);
                self.store.write().await.stats.refreshes_failed += 1;
            }
        }
    }
}
