//! Elevation providers cached per index snapshot.
//!
//! Entries are keyed by snapshot identity, so a new index snapshot naturally
//! misses and builds a fresh provider while stale snapshots are simply never
//! asked for again (and fall out of the LRU when a bound is configured).
//! [`SnapshotCache::invalidate_all`] drops everything after a configuration
//! reload.

use crate::provider::ElevationProvider;
use ahash::AHashMap;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-key lock serializing provider construction.
type BuildSlot = Arc<Mutex<()>>;

/// Snapshot identity to lazily-built [`ElevationProvider`].
///
/// Reads of built entries only take a shared lock. Construction is serialized
/// per key, so racing callers for the same unseen snapshot wait for a single
/// build and all observe the same `Arc`.
pub struct SnapshotCache<K> {
    /// Built providers. Read through `peek` so lookups stay shared.
    entries: RwLock<LruCache<K, Arc<ElevationProvider>>>,
    /// Build slots for keys currently being constructed.
    building: Mutex<AHashMap<K, BuildSlot>>,
    /// Bumped by every invalidation; a build only stores its result if the
    /// generation it started under is still current.
    generation: AtomicU64,
}

impl<K: Hash + Eq> fmt::Debug for SnapshotCache<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("entries", &self.entries.read().len())
            .field("building", &self.building.lock().len())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}

impl<K: Hash + Eq + Clone + fmt::Debug> SnapshotCache<K> {
    /// A cache retaining at most `capacity` snapshots (LRU by insertion and
    /// rebuild), or every snapshot when `None`.
    pub fn new(capacity: Option<NonZeroUsize>) -> Self {
        let entries = match capacity {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self {
            entries: RwLock::new(entries),
            building: Mutex::new(AHashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Returns the cached provider for `key`, building it on a miss.
    pub fn get_or_build<F>(&self, key: &K, build: F) -> Arc<ElevationProvider>
    where
        F: FnOnce() -> ElevationProvider,
    {
        match self.get_or_try_build(key, || Ok::<_, std::convert::Infallible>(build())) {
            Ok(provider) => provider,
            Err(never) => match never {},
        }
    }

    /// Returns the cached provider for `key`, building it on a miss.
    ///
    /// A failed build stores nothing; the next call for `key` tries again.
    pub fn get_or_try_build<F, E>(&self, key: &K, build: F) -> Result<Arc<ElevationProvider>, E>
    where
        F: FnOnce() -> Result<ElevationProvider, E>,
    {
        self.get_or_try_build_shared(key, || build().map(Arc::new))
    }

    /// Like [`SnapshotCache::get_or_build`] for a builder that may hand back an
    /// already shared provider (e.g. the last good one after a failed reload).
    pub fn get_or_build_shared<F>(&self, key: &K, build: F) -> Arc<ElevationProvider>
    where
        F: FnOnce() -> Arc<ElevationProvider>,
    {
        match self.get_or_try_build_shared(key, || Ok::<_, std::convert::Infallible>(build())) {
            Ok(provider) => provider,
            Err(never) => match never {},
        }
    }

    fn get_or_try_build_shared<F, E>(&self, key: &K, build: F) -> Result<Arc<ElevationProvider>, E>
    where
        F: FnOnce() -> Result<Arc<ElevationProvider>, E>,
    {
        if let Some(provider) = self.get(key) {
            tracing::trace!("Elevation cache hit for {:?}", key);
            return Ok(provider);
        }

        let slot = Arc::clone(self.building.lock().entry(key.clone()).or_default());
        let result = {
            let _guard = slot.lock();

            // Another caller may have finished the build while we waited.
            if let Some(provider) = self.get(key) {
                tracing::debug!("Elevation provider for {:?} built by a concurrent caller", key);
                return Ok(provider);
            }

            self.build_and_store(key, build)
        };

        self.building.lock().remove(key);
        result
    }

    fn build_and_store<F, E>(&self, key: &K, build: F) -> Result<Arc<ElevationProvider>, E>
    where
        F: FnOnce() -> Result<Arc<ElevationProvider>, E>,
    {
        let generation = self.generation.load(Ordering::SeqCst);
        let start = std::time::Instant::now();
        let provider = build()?;

        let mut entries = self.entries.write();
        if self.generation.load(Ordering::SeqCst) == generation {
            if let Some((evicted, _)) = entries.push(key.clone(), Arc::clone(&provider))
                && evicted != *key
            {
                tracing::debug!("Evicted elevation provider for {:?}", evicted);
            }
            tracing::info!(
                "Built elevation provider for {:?} ({} rules) in {:?}",
                key,
                provider.size(),
                start.elapsed()
            );
        } else {
            tracing::debug!(
                "Cache invalidated while building provider for {:?}; not storing it",
                key
            );
        }

        Ok(provider)
    }

    /// Returns the cached provider without building.
    pub fn get(&self, key: &K) -> Option<Arc<ElevationProvider>> {
        self.entries.read().peek(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.read().contains(key)
    }

    /// Number of cached snapshots.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every cached provider.
    ///
    /// Any `get_or_build` that starts after this returns misses on all keys and
    /// rebuilds; builds already in flight return their result to their own
    /// caller without storing it.
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write();
        self.generation.fetch_add(1, Ordering::SeqCst);
        let dropped = entries.len();
        entries.clear();
        tracing::info!("Invalidated elevation cache ({} snapshots dropped)", dropped);
    }
}
