use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::ThreadId;

use crate::foundation::error::{MosaicError, MosaicResult};

/// Recipe for a value the cache can compute, drop, and compute again.
///
/// `generate` must be deterministic: after an eviction the cache calls it again and callers
/// expect an identical value.
pub trait Generator: Send + Sync + 'static {
    /// Value produced by [`Generator::generate`].
    type Value: Send + Sync + 'static;

    /// Declared resident size of the generated value, used for budget accounting.
    fn size_bytes(&self) -> usize;

    /// Compute the value.
    fn generate(&self) -> MosaicResult<Self::Value>;
}

/// Generation cache configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheOpts {
    /// Budget for the summed declared size of resident entries.
    pub max_bytes: usize,
}

impl Default for CacheOpts {
    fn default() -> Self {
        Self {
            max_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Point-in-time counters of a [`GenerationCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Configured budget in bytes.
    pub budget_bytes: usize,
    /// Summed declared size of resident entries.
    pub resident_bytes: usize,
    /// Number of resident entries.
    pub resident_entries: usize,
    /// Accesses served without generating.
    pub hits: u64,
    /// Completed generations.
    pub generations: u64,
    /// Entries dropped to stay within budget (or by [`GenerationCache::clear`]).
    pub evictions: u64,
}

/// Size-bounded store of lazily generated, reference-counted values.
///
/// Entries are registered with [`GenerationCache::insert`] and computed on first
/// [`CacheHandle::access`]. When the resident total exceeds the budget the least recently used
/// entries are dropped; an evicted entry regenerates on its next access. Cloning the cache
/// yields another reference to the same store.
#[derive(Clone)]
pub struct GenerationCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for GenerationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCache")
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for GenerationCache {
    fn default() -> Self {
        Self::with_opts(CacheOpts::default())
    }
}

impl GenerationCache {
    /// Cache with a budget of `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        Self::with_opts(CacheOpts { max_bytes })
    }

    /// Cache configured by `opts`.
    pub fn with_opts(opts: CacheOpts) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                budget: opts.max_bytes,
                state: Mutex::new(CacheState::default()),
                next_id: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                generations: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    /// Register `generator` without computing anything.
    pub fn insert<G: Generator>(&self, generator: G) -> CacheHandle<G> {
        let size = generator.size_bytes();
        CacheHandle {
            entry: Arc::new(Entry {
                id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
                size,
                generator,
                slot: Mutex::new(Slot::Empty),
                ready: Condvar::new(),
                cache: Arc::downgrade(&self.inner),
            }),
        }
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let (resident_bytes, resident_entries) = {
            let st = self.inner.lock_state();
            (st.resident_bytes, st.entries.len())
        };
        CacheStats {
            budget_bytes: self.inner.budget,
            resident_bytes,
            resident_entries,
            hits: self.inner.hits.load(Ordering::Relaxed),
            generations: self.inner.generations.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
        }
    }

    /// Evict every resident entry. Handles stay valid and regenerate on access.
    pub fn clear(&self) {
        let victims: Vec<_> = {
            let mut st = self.inner.lock_state();
            st.lru.clear();
            st.resident_bytes = 0;
            st.entries.drain().map(|(_, r)| r.entry).collect()
        };
        self.inner.evict_all(victims);
    }
}

/// Shared reference to one cache entry.
pub struct CacheHandle<G: Generator> {
    entry: Arc<Entry<G>>,
}

impl<G: Generator> Clone for CacheHandle<G> {
    fn clone(&self) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
        }
    }
}

impl<G: Generator> std::fmt::Debug for CacheHandle<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle")
            .field("id", &self.entry.id)
            .field("size_bytes", &self.entry.size)
            .field("resident", &self.is_resident())
            .finish()
    }
}

impl<G: Generator> CacheHandle<G> {
    /// Value of the entry, generating it first if it is not resident.
    ///
    /// Concurrent callers share one generation; they block until it finishes. Accessing an entry
    /// from inside its own generator fails with [`MosaicError::Cache`].
    pub fn access(&self) -> MosaicResult<Arc<G::Value>> {
        Entry::access(&self.entry)
    }

    /// Mark the entry as the first candidate for eviction.
    pub fn deprioritize(&self) {
        if let Some(cache) = self.entry.cache.upgrade() {
            cache.lock_state().retick(self.entry.id, Tick::Lowest);
        }
    }

    /// Whether a value is currently held. Never triggers generation.
    pub fn is_resident(&self) -> bool {
        matches!(*lock(&self.entry.slot), Slot::Ready(_))
    }

    /// Declared size of the entry.
    pub fn size_bytes(&self) -> usize {
        self.entry.size
    }

    /// The generator behind this entry.
    pub fn generator(&self) -> &G {
        &self.entry.generator
    }
}

struct CacheInner {
    budget: usize,
    state: Mutex<CacheState>,
    next_id: AtomicU64,
    hits: AtomicU64,
    generations: AtomicU64,
    evictions: AtomicU64,
}

impl CacheInner {
    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        lock(&self.state)
    }

    /// Account a freshly generated entry and evict least recently used entries over budget.
    fn admit(&self, id: u64, size: usize, entry: Weak<dyn Evictable>) {
        let victims = {
            let mut st = self.lock_state();
            st.forget(id);
            let tick = st.next_tick(Tick::Newest);
            st.lru.insert(tick, id);
            st.entries.insert(id, Resident { size, tick, entry });
            st.resident_bytes += size;

            let mut victims = Vec::new();
            while st.resident_bytes > self.budget {
                let Some(victim) = st.lru.values().copied().find(|v| *v != id) else {
                    break;
                };
                if let Some(r) = st.forget(victim) {
                    victims.push(r.entry);
                }
            }
            if st.resident_bytes > self.budget {
                tracing::warn!(
                    entry = id,
                    size,
                    budget = self.budget,
                    "cache entry exceeds the whole budget; keeping it resident"
                );
            }
            victims
        };
        self.evict_all(victims);
    }

    /// Drop values outside the state lock; upgraded entries may run `Drop`, which re-locks it.
    fn evict_all(&self, victims: Vec<Weak<dyn Evictable>>) {
        for weak in victims {
            if let Some(entry) = weak.upgrade() {
                entry.evict();
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[derive(Default)]
struct CacheState {
    resident_bytes: usize,
    newest: i64,
    lowest: i64,
    lru: BTreeMap<i64, u64>,
    entries: HashMap<u64, Resident>,
}

#[derive(Clone, Copy)]
enum Tick {
    Newest,
    Lowest,
}

impl CacheState {
    fn next_tick(&mut self, which: Tick) -> i64 {
        match which {
            Tick::Newest => {
                self.newest += 1;
                self.newest
            }
            Tick::Lowest => {
                self.lowest -= 1;
                self.lowest
            }
        }
    }

    fn retick(&mut self, id: u64, which: Tick) {
        let tick = self.next_tick(which);
        if let Some(r) = self.entries.get_mut(&id) {
            self.lru.remove(&r.tick);
            r.tick = tick;
            self.lru.insert(tick, id);
        }
    }

    fn forget(&mut self, id: u64) -> Option<Resident> {
        let r = self.entries.remove(&id)?;
        self.lru.remove(&r.tick);
        self.resident_bytes = self.resident_bytes.saturating_sub(r.size);
        Some(r)
    }
}

struct Resident {
    size: usize,
    tick: i64,
    entry: Weak<dyn Evictable>,
}

trait Evictable: Send + Sync {
    fn evict(&self);
}

enum Slot<V> {
    Empty,
    Computing(ThreadId),
    Ready(Arc<V>),
}

struct Entry<G: Generator> {
    id: u64,
    size: usize,
    generator: G,
    slot: Mutex<Slot<G::Value>>,
    ready: Condvar,
    cache: Weak<CacheInner>,
}

impl<G: Generator> Entry<G> {
    fn access(this: &Arc<Self>) -> MosaicResult<Arc<G::Value>> {
        let me = std::thread::current().id();
        let mut slot = lock(&this.slot);
        loop {
            match &*slot {
                Slot::Ready(v) => {
                    let v = Arc::clone(v);
                    drop(slot);
                    this.touch();
                    if let Some(cache) = this.cache.upgrade() {
                        cache.hits.fetch_add(1, Ordering::Relaxed);
                    }
                    return Ok(v);
                }
                Slot::Computing(owner) if *owner == me => {
                    return Err(MosaicError::cache(format!(
                        "re-entrant access of cache entry {} from its own generator",
                        this.id
                    )));
                }
                Slot::Computing(_) => {
                    slot = this
                        .ready
                        .wait(slot)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Slot::Empty => break,
            }
        }
        *slot = Slot::Computing(me);
        drop(slot);

        let mut guard = ComputeGuard {
            entry: this,
            done: false,
        };
        tracing::debug!(entry = this.id, size = this.size, "generating cache entry");
        let value = Arc::new(this.generator.generate()?);
        guard.done = true;

        *lock(&this.slot) = Slot::Ready(Arc::clone(&value));
        this.ready.notify_all();
        if let Some(cache) = this.cache.upgrade() {
            cache.generations.fetch_add(1, Ordering::Relaxed);
            let weak: Weak<dyn Evictable> = Arc::downgrade(this) as Weak<dyn Evictable>;
            cache.admit(this.id, this.size, weak);
        }
        Ok(value)
    }

    fn touch(&self) {
        if let Some(cache) = self.cache.upgrade() {
            cache.lock_state().retick(self.id, Tick::Newest);
        }
    }
}

impl<G: Generator> Evictable for Entry<G> {
    fn evict(&self) {
        let old = {
            let mut slot = lock(&self.slot);
            match &*slot {
                Slot::Ready(_) => std::mem::replace(&mut *slot, Slot::Empty),
                _ => return,
            }
        };
        drop(old);
    }
}

impl<G: Generator> Drop for Entry<G> {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.upgrade() {
            cache.lock_state().forget(self.id);
        }
    }
}

/// Resets a `Computing` slot when generation fails or unwinds, waking any waiters.
struct ComputeGuard<'a, G: Generator> {
    entry: &'a Entry<G>,
    done: bool,
}

impl<G: Generator> Drop for ComputeGuard<'_, G> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        *lock(&self.entry.slot) = Slot::Empty;
        self.entry.ready.notify_all();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "../../tests/unit/cache/generation.rs"]
mod tests;
