//! Bounded single-flight document cache.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lru::LruCache;
use metrics::{counter, histogram};
use tracing::{debug, warn};

use crate::domain::entities::Document;

use super::config::CacheConfig;
use super::error::CacheError;
use super::keys::DocumentKey;
use super::loader::{DocumentLoader, LoaderError};
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

pub const METRIC_HIT: &str = "docasm_cache_hit_total";
pub const METRIC_MISS: &str = "docasm_cache_miss_total";
pub const METRIC_COALESCED: &str = "docasm_cache_coalesced_total";
pub const METRIC_EVICT: &str = "docasm_cache_evict_total";
pub const METRIC_INVALIDATE: &str = "docasm_cache_invalidate_total";
pub const METRIC_LOAD_FAILURE: &str = "docasm_cache_load_failure_total";
pub const METRIC_LOAD_MS: &str = "docasm_cache_load_ms";

type LoadOutcome = Result<Arc<Document>, CacheError>;
type SharedLoad = Shared<BoxFuture<'static, LoadOutcome>>;

struct InFlight {
    generation: u64,
    load: SharedLoad,
    invalidated: Arc<AtomicBool>,
}

struct Inner {
    config: CacheConfig,
    loader: Arc<dyn DocumentLoader>,
    entries: Mutex<LruCache<DocumentKey, Arc<Document>>>,
    in_flight: DashMap<DocumentKey, InFlight>,
    generations: AtomicU64,
}

/// Memoizes [`DocumentLoader`] results per [`DocumentKey`].
///
/// Concurrent misses on one key share a single load. Loads run on their own
/// task, so a caller that stops waiting does not cancel the load for the
/// others. Neither `NotFound` nor load failures are retained.
#[derive(Clone)]
pub struct DocumentCache {
    inner: Arc<Inner>,
}

impl DocumentCache {
    pub fn new(config: CacheConfig, loader: Arc<dyn DocumentLoader>) -> Self {
        let entries = LruCache::new(config.capacity_non_zero());
        Self {
            inner: Arc::new(Inner {
                config,
                loader,
                entries: Mutex::new(entries),
                in_flight: DashMap::new(),
                generations: AtomicU64::new(0),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.config.capacity_non_zero().get()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.inner.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached document for `key`, loading it on a miss.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn get_or_load(&self, key: &DocumentKey) -> Result<Arc<Document>, CacheError> {
        if let Some(document) = self.inner.lookup(key, "get_or_load") {
            counter!(METRIC_HIT).increment(1);
            return Ok(document);
        }

        let load = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                counter!(METRIC_COALESCED).increment(1);
                debug!(key = %key, "joining in-flight load");
                occupied.get().load.clone()
            }
            Entry::Vacant(vacant) => {
                // A load may have installed and deregistered since the first lookup.
                if let Some(document) = self.inner.lookup(key, "get_or_load_recheck") {
                    counter!(METRIC_HIT).increment(1);
                    return Ok(document);
                }
                counter!(METRIC_MISS).increment(1);
                let flight = self.start_load(key.clone());
                let load = flight.load.clone();
                vacant.insert(flight);
                load
            }
        };

        load.await
    }

    /// Returns the cached document without ever invoking the loader.
    pub fn peek(&self, key: &DocumentKey) -> Option<Arc<Document>> {
        mutex_lock(&self.inner.entries, SOURCE, "peek")
            .peek(key)
            .cloned()
    }

    /// Drops the entry for `key`. A load for `key` that is still running is
    /// detached: its current waiters still receive its result, but it is never
    /// installed and later callers start a fresh load.
    pub fn invalidate(&self, key: &DocumentKey) {
        // Flag first, then pop: a load that installs before the pop is removed
        // by it, and one that installs after it sees the flag.
        let interrupted = match self.inner.in_flight.remove(key) {
            Some((_, flight)) => {
                flight.invalidated.store(true, Ordering::Release);
                true
            }
            None => false,
        };

        let removed = mutex_lock(&self.inner.entries, SOURCE, "invalidate")
            .pop(key)
            .is_some();

        counter!(METRIC_INVALIDATE).increment(1);
        debug!(key = %key, removed, interrupted, "cache entry invalidated");
    }

    /// Drops every entry and detaches every running load.
    pub fn clear(&self) {
        self.inner.in_flight.retain(|_, flight| {
            flight.invalidated.store(true, Ordering::Release);
            false
        });
        mutex_lock(&self.inner.entries, SOURCE, "clear").clear();
        debug!("cache cleared");
    }

    fn start_load(&self, key: DocumentKey) -> InFlight {
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);
        let invalidated = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(Arc::clone(&self.inner).run_load(
            key.clone(),
            generation,
            Arc::clone(&invalidated),
        ));

        let load = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    warn!(key = %key, error = %join_error, "document load task failed");
                    counter!(METRIC_LOAD_FAILURE).increment(1);
                    Err(CacheError::from(LoaderError::Aborted {
                        key,
                        reason: join_error.to_string(),
                    }))
                }
            }
        }
        .boxed()
        .shared();

        InFlight {
            generation,
            load,
            invalidated,
        }
    }
}

impl Inner {
    fn lookup(&self, key: &DocumentKey, op: &'static str) -> Option<Arc<Document>> {
        mutex_lock(&self.entries, SOURCE, op).get(key).cloned()
    }

    async fn run_load(
        self: Arc<Self>,
        key: DocumentKey,
        generation: u64,
        invalidated: Arc<AtomicBool>,
    ) -> LoadOutcome {
        let _registration = FlightGuard {
            inner: Arc::clone(&self),
            key: key.clone(),
            generation,
        };

        let timeout = self.config.load_timeout;
        let started = Instant::now();
        let result = tokio::time::timeout(timeout, self.loader.load(&key)).await;
        histogram!(METRIC_LOAD_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        let loaded = match result {
            Ok(loaded) => loaded,
            Err(_) => Err(LoaderError::Timeout {
                key: key.clone(),
                timeout,
            }),
        };

        match loaded {
            Ok(document) => {
                let document = Arc::new(document);
                self.install(&key, &document, &invalidated);
                Ok(document)
            }
            Err(LoaderError::NotFound { key }) => {
                debug!(key = %key, "document not found");
                Err(CacheError::NotFound { key })
            }
            Err(error) => {
                counter!(METRIC_LOAD_FAILURE).increment(1);
                warn!(key = %key, error = %error, "document load failed");
                Err(CacheError::from(error))
            }
        }
    }

    fn install(&self, key: &DocumentKey, document: &Arc<Document>, invalidated: &AtomicBool) {
        let mut entries = mutex_lock(&self.entries, SOURCE, "install");
        if invalidated.load(Ordering::Acquire) {
            debug!(key = %key, "discarding load invalidated while in flight");
            return;
        }
        // `push` hands back the replaced pair on overwrite, the LRU pair on eviction.
        match entries.push(key.clone(), Arc::clone(document)) {
            Some((evicted, _)) if evicted != *key => {
                counter!(METRIC_EVICT).increment(1);
                debug!(key = %evicted, "evicted least recently used document");
            }
            _ => {}
        }
    }
}

/// Deregisters a load once its task finishes, including by panic.
struct FlightGuard {
    inner: Arc<Inner>,
    key: DocumentKey,
    generation: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .remove_if(&self.key, |_, flight| flight.generation == self.generation);
    }
}
