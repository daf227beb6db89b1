use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, info, warn};

use super::{
    backend::{CacheBackend, CacheEntry, RedisBackend},
    fingerprint::Fingerprint,
};
use crate::{config::PlannerConfig, error::CacheError, types::Itinerary};

const REDIS_KEY_PREFIX: &str = "travel-buddy";
const PRIMARY_OP_TIMEOUT: Duration = Duration::from_millis(750);

/// Which store currently serves reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Primary,
    Fallback,
}

impl CacheBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackendKind::Primary => "primary",
            CacheBackendKind::Fallback => "fallback",
        }
    }
}

/// Read-only monitoring snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub backend: CacheBackendKind,
    pub fallback_entries: usize,
}

struct FallbackEntry {
    itinerary: Arc<Itinerary>,
    expires_at: Instant,
    last_used: u64,
}

enum FallbackLookup {
    Hit(Arc<Itinerary>),
    Expired,
    Absent,
}

/// Capacity-bounded in-process map with least-recently-used eviction.
struct FallbackMap {
    entries: HashMap<String, FallbackEntry>,
    capacity: usize,
    tick: u64,
}

impl FallbackMap {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn get(&mut self, key: &str, now: Instant) -> FallbackLookup {
        let tick = self.next_tick();
        match self.entries.get_mut(key) {
            Some(entry) if now < entry.expires_at => {
                entry.last_used = tick;
                FallbackLookup::Hit(Arc::clone(&entry.itinerary))
            }
            Some(_) => {
                self.entries.remove(key);
                FallbackLookup::Expired
            }
            None => FallbackLookup::Absent,
        }
    }

    /// Insert or overwrite `key`; returns how many entries were evicted to make room.
    fn insert(&mut self, key: &str, itinerary: Arc<Itinerary>, expires_at: Instant) -> u64 {
        let tick = self.next_tick();
        let mut evicted = 0;

        if !self.entries.contains_key(key) {
            let now = Instant::now();
            let before = self.entries.len();
            self.entries.retain(|_, entry| now < entry.expires_at);
            evicted += (before - self.entries.len()) as u64;

            while self.entries.len() >= self.capacity {
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(oldest) => {
                        self.entries.remove(&oldest);
                        evicted += 1;
                    }
                    None => break,
                }
            }
        }

        self.entries.insert(
            key.to_string(),
            FallbackEntry {
                itinerary,
                expires_at,
                last_used: tick,
            },
        );
        evicted
    }

    fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn remove_matching(&mut self, pattern: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.contains(pattern));
        before - self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// TTL cache of finished itineraries keyed by request fingerprint.
///
/// Reads and writes go to the primary backend while it is reachable and to an
/// in-process LRU map otherwise. Primary failures are logged and absorbed:
/// callers see the same `Option`/`()` results whichever store answered.
pub struct ItineraryCache {
    primary: Option<Arc<dyn CacheBackend>>,
    primary_available: AtomicBool,
    fallback: Mutex<FallbackMap>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ItineraryCache {
    /// Cache with no primary store; everything lives in the fallback map.
    pub fn in_memory(capacity: usize, ttl: Duration) -> Self {
        Self {
            primary: None,
            primary_available: AtomicBool::new(false),
            fallback: Mutex::new(FallbackMap::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Cache backed by `primary`, starting on the fallback map if the first
    /// ping fails.
    pub async fn with_primary(
        primary: Arc<dyn CacheBackend>,
        capacity: usize,
        ttl: Duration,
    ) -> Self {
        let mut cache = Self::in_memory(capacity, ttl);
        let reachable = match with_deadline(primary.ping()).await {
            Ok(()) => {
                info!(target: "travel_buddy::cache", backend = primary.name(), "connected to primary cache");
                true
            }
            Err(err) => {
                warn!(target: "travel_buddy::cache", backend = primary.name(), error = %err, "primary cache unreachable, using in-memory fallback");
                false
            }
        };
        cache.primary_available = AtomicBool::new(reachable);
        cache.primary = Some(primary);
        cache
    }

    /// Build the cache described by `config`: Redis when `redis_url` is set.
    pub async fn from_config(config: &PlannerConfig) -> Self {
        match config.redis_url.as_deref() {
            Some(url) => match RedisBackend::new(url, REDIS_KEY_PREFIX) {
                Ok(backend) => {
                    Self::with_primary(Arc::new(backend), config.cache_capacity, config.cache_ttl)
                        .await
                }
                Err(err) => {
                    warn!(target: "travel_buddy::cache", error = %err, "invalid redis url, using in-memory cache");
                    Self::in_memory(config.cache_capacity, config.cache_ttl)
                }
            },
            None => Self::in_memory(config.cache_capacity, config.cache_ttl),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn active_primary(&self) -> Option<&Arc<dyn CacheBackend>> {
        self.primary
            .as_ref()
            .filter(|_| self.primary_available.load(Ordering::Acquire))
    }

    fn mark_unavailable(&self, err: &CacheError) {
        if self.primary_available.swap(false, Ordering::AcqRel) {
            warn!(target: "travel_buddy::cache", error = %err, "primary cache unavailable, switching to fallback");
        }
    }

    /// Return the cached itinerary for `key` if present and younger than the TTL.
    pub async fn get(&self, key: &Fingerprint) -> Option<Arc<Itinerary>> {
        let found = self.lookup(key).await;
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Like [`get`](Self::get) but leaves the hit and miss counters alone.
    /// Used to re-check a key the caller has already looked up once.
    pub async fn peek(&self, key: &Fingerprint) -> Option<Arc<Itinerary>> {
        self.lookup(key).await
    }

    async fn lookup(&self, key: &Fingerprint) -> Option<Arc<Itinerary>> {
        if let Some(primary) = self.active_primary() {
            match with_deadline(primary.get(key.as_str())).await {
                Ok(Some(entry)) if entry.is_fresh_at(Utc::now()) => {
                    debug!(target: "travel_buddy::cache", %key, "primary hit");
                    return Some(Arc::new(entry.itinerary));
                }
                Ok(Some(_)) => {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    if let Err(err) = with_deadline(primary.delete(key.as_str())).await {
                        self.mark_unavailable(&err);
                    }
                }
                Ok(None) => {}
                Err(err) => self.mark_unavailable(&err),
            }
        }

        // Entries written during an outage stay readable until they expire.
        let lookup = self.fallback.lock().get(key.as_str(), Instant::now());
        match lookup {
            FallbackLookup::Hit(itinerary) => {
                debug!(target: "travel_buddy::cache", %key, "fallback hit");
                Some(itinerary)
            }
            FallbackLookup::Expired => {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(target: "travel_buddy::cache", %key, "expired entry evicted");
                None
            }
            FallbackLookup::Absent => None,
        }
    }

    /// Store `itinerary` under `key` for one TTL, replacing any previous entry.
    pub async fn put(&self, key: &Fingerprint, itinerary: Arc<Itinerary>) {
        if let Some(primary) = self.active_primary() {
            let entry = CacheEntry::new(itinerary.as_ref().clone(), self.ttl);
            match with_deadline(primary.set(key.as_str(), &entry)).await {
                Ok(()) => {
                    debug!(target: "travel_buddy::cache", %key, "stored in primary");
                    return;
                }
                Err(err) => self.mark_unavailable(&err),
            }
        }

        let evicted =
            self.fallback
                .lock()
                .insert(key.as_str(), itinerary, Instant::now() + self.ttl);
        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
        debug!(target: "travel_buddy::cache", %key, evicted, "stored in fallback");
    }

    /// Drop the entry for `key` from both stores.
    pub async fn invalidate(&self, key: &Fingerprint) -> bool {
        let mut removed = self.fallback.lock().remove(key.as_str());
        if let Some(primary) = self.active_primary() {
            match with_deadline(primary.delete(key.as_str())).await {
                Ok(()) => removed = true,
                Err(err) => self.mark_unavailable(&err),
            }
        }
        removed
    }

    /// Drop every entry whose key contains `pattern` from both stores;
    /// returns the number of entries removed.
    pub async fn invalidate_matching(&self, pattern: &str) -> usize {
        let mut removed = self.fallback.lock().remove_matching(pattern);
        if let Some(primary) = self.active_primary() {
            match with_deadline(primary.delete_matching(pattern)).await {
                Ok(count) => removed += count,
                Err(err) => self.mark_unavailable(&err),
            }
        }
        debug!(target: "travel_buddy::cache", pattern, removed, "invalidated matching entries");
        removed
    }

    pub async fn clear(&self) {
        self.fallback.lock().clear();
        if let Some(primary) = self.active_primary() {
            if let Err(err) = with_deadline(primary.clear()).await {
                self.mark_unavailable(&err);
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let backend = if self.active_primary().is_some() {
            CacheBackendKind::Primary
        } else {
            CacheBackendKind::Fallback
        };
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            backend,
            fallback_entries: self.fallback.lock().len(),
        }
    }

    /// Ping the primary if it is marked unavailable; returns whether it is usable now.
    pub async fn try_reconnect(&self) -> bool {
        let Some(primary) = self.primary.as_ref() else {
            return false;
        };
        if self.primary_available.load(Ordering::Acquire) {
            return true;
        }
        match with_deadline(primary.ping()).await {
            Ok(()) => {
                self.primary_available.store(true, Ordering::Release);
                info!(target: "travel_buddy::cache", backend = primary.name(), "primary cache reachable again");
                true
            }
            Err(err) => {
                debug!(target: "travel_buddy::cache", error = %err, "primary cache still unreachable");
                false
            }
        }
    }

    /// Periodically retry the primary store until the cache is dropped.
    pub fn spawn_reconnect(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                cache.try_reconnect().await;
            }
        })
    }
}

async fn with_deadline<T>(
    operation: impl Future<Output = Result<T, CacheError>>,
) -> Result<T, CacheError> {
    tokio::time::timeout(PRIMARY_OP_TIMEOUT, operation)
        .await
        .map_err(|_| CacheError::Connection("primary cache operation timed out".to_string()))?
}
