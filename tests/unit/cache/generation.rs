use std::sync::OnceLock;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use super::*;

struct Counted {
    size: usize,
    value: u32,
    calls: Arc<AtomicUsize>,
}

impl Counted {
    fn new(size: usize, value: u32) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                size,
                value,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl Generator for Counted {
    type Value = u32;

    fn size_bytes(&self) -> usize {
        self.size
    }

    fn generate(&self) -> MosaicResult<u32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value)
    }
}

#[test]
fn insert_is_lazy_and_access_caches() {
    let cache = GenerationCache::new(1024);
    let (generator, calls) = Counted::new(10, 7);
    let h = cache.insert(generator);
    assert!(!h.is_resident());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(*h.access().unwrap(), 7);
    assert!(h.is_resident());
    assert_eq!(*h.access().unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let stats = cache.stats();
    assert_eq!(stats.generations, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.resident_bytes, 10);
    assert_eq!(stats.resident_entries, 1);
}

#[test]
fn least_recently_used_entry_is_evicted() {
    let cache = GenerationCache::new(100);
    let (ga, _) = Counted::new(40, 1);
    let (gb, calls_b) = Counted::new(40, 2);
    let (gc, _) = Counted::new(40, 3);
    let (a, b, c) = (cache.insert(ga), cache.insert(gb), cache.insert(gc));

    a.access().unwrap();
    b.access().unwrap();
    a.access().unwrap();
    c.access().unwrap();

    assert!(a.is_resident());
    assert!(!b.is_resident());
    assert!(c.is_resident());
    assert_eq!(cache.stats().resident_bytes, 80);
    assert_eq!(cache.stats().evictions, 1);

    assert_eq!(*b.access().unwrap(), 2);
    assert_eq!(calls_b.load(Ordering::SeqCst), 2);
    assert!(cache.stats().resident_bytes <= 100);
}

#[test]
fn deprioritized_entry_goes_first() {
    let cache = GenerationCache::new(100);
    let (a, b, c) = (
        cache.insert(Counted::new(40, 1).0),
        cache.insert(Counted::new(40, 2).0),
        cache.insert(Counted::new(40, 3).0),
    );
    a.access().unwrap();
    b.access().unwrap();
    b.deprioritize();
    c.access().unwrap();

    assert!(a.is_resident());
    assert!(!b.is_resident());
    assert!(c.is_resident());
}

#[test]
fn oversized_entry_stays_until_next_admission() {
    let cache = GenerationCache::new(10);
    let big = cache.insert(Counted::new(40, 1).0);
    let small = cache.insert(Counted::new(5, 2).0);

    big.access().unwrap();
    assert!(big.is_resident());
    assert_eq!(cache.stats().resident_bytes, 40);

    small.access().unwrap();
    assert!(!big.is_resident());
    assert_eq!(cache.stats().resident_bytes, 5);
}

struct Flaky {
    calls: AtomicUsize,
}

impl Generator for Flaky {
    type Value = &'static str;

    fn size_bytes(&self) -> usize {
        1
    }

    fn generate(&self) -> MosaicResult<&'static str> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(MosaicError::generation("source unreadable"))
        } else {
            Ok("ok")
        }
    }
}

#[test]
fn failed_generation_leaves_entry_unbuilt() {
    let cache = GenerationCache::new(100);
    let h = cache.insert(Flaky {
        calls: AtomicUsize::new(0),
    });
    assert!(matches!(h.access(), Err(MosaicError::Generation(_))));
    assert!(!h.is_resident());
    assert_eq!(cache.stats().resident_bytes, 0);
    assert_eq!(*h.access().unwrap(), "ok");
}

struct Reentrant {
    me: Arc<OnceLock<CacheHandle<Reentrant>>>,
}

impl Generator for Reentrant {
    type Value = u32;

    fn size_bytes(&self) -> usize {
        1
    }

    fn generate(&self) -> MosaicResult<u32> {
        let h = self
            .me
            .get()
            .ok_or_else(|| MosaicError::generation("handle not set"))?;
        h.access().map(|v| *v)
    }
}

#[test]
fn reentrant_access_fails_instead_of_deadlocking() {
    let cache = GenerationCache::new(100);
    let me = Arc::new(OnceLock::new());
    let h = cache.insert(Reentrant {
        me: Arc::clone(&me),
    });
    me.set(h.clone()).unwrap();
    assert!(matches!(h.access(), Err(MosaicError::Cache(_))));
    assert!(!h.is_resident());
}

struct Slow {
    calls: AtomicUsize,
}

impl Generator for Slow {
    type Value = Vec<u8>;

    fn size_bytes(&self) -> usize {
        16
    }

    fn generate(&self) -> MosaicResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        Ok(vec![1; 16])
    }
}

#[test]
fn concurrent_access_generates_once() {
    let cache = GenerationCache::new(1024);
    let h = cache.insert(Slow {
        calls: AtomicUsize::new(0),
    });
    let values: Vec<_> = std::thread::scope(|s| {
        let joins: Vec<_> = (0..8).map(|_| s.spawn(|| h.access().unwrap())).collect();
        joins.into_iter().map(|j| j.join().unwrap()).collect()
    });
    assert_eq!(h.generator().calls.load(Ordering::SeqCst), 1);
    assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
}

struct PanicsOnce {
    calls: AtomicUsize,
}

impl Generator for PanicsOnce {
    type Value = u8;

    fn size_bytes(&self) -> usize {
        1
    }

    fn generate(&self) -> MosaicResult<u8> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("generator panicked");
        }
        Ok(9)
    }
}

#[test]
fn panicking_generator_does_not_wedge_the_entry() {
    let cache = GenerationCache::new(100);
    let h = cache.insert(PanicsOnce {
        calls: AtomicUsize::new(0),
    });
    let h2 = h.clone();
    assert!(std::thread::spawn(move || h2.access()).join().is_err());
    assert_eq!(*h.access().unwrap(), 9);
}

#[test]
fn dropping_last_handle_releases_accounting() {
    let cache = GenerationCache::new(100);
    let h = cache.insert(Counted::new(30, 1).0);
    h.access().unwrap();
    assert_eq!(cache.stats().resident_bytes, 30);
    drop(h);
    assert_eq!(cache.stats().resident_bytes, 0);
    assert_eq!(cache.stats().resident_entries, 0);
}

#[test]
fn clear_evicts_everything() {
    let cache = GenerationCache::new(100);
    let (g, calls) = Counted::new(30, 4);
    let h = cache.insert(g);
    h.access().unwrap();
    cache.clear();
    assert!(!h.is_resident());
    assert_eq!(cache.stats().resident_bytes, 0);
    assert_eq!(*h.access().unwrap(), 4);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
