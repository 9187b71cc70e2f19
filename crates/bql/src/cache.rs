//! Generic read-through cache with TTL and explicit invalidation.
//!
//! On a miss the caller's loader runs and the result is stored until its
//! TTL expires or `invalidate` is called. Concurrent misses for the same
//! key are deduplicated (single-flight): one caller runs its loader while
//! the others wait and share the result. Loader failures are not cached;
//! the first waiter to wake retries with its own loader.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    in_flight: HashSet<K>,
}

/// A read-through cache shared across threads.
pub struct QueryCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    flight_done: Condvar,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        QueryCache {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                in_flight: HashSet::new(),
            }),
            flight_done: Condvar::new(),
        }
    }

    /// Return the cached value for `key`, or run `loader` to compute,
    /// store, and return it. The loader runs outside the cache lock.
    pub fn get_with_refresh<E>(
        &self,
        key: K,
        ttl: Duration,
        loader: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        let mut inner = self.lock();
        loop {
            if let Some(entry) = inner.entries.get(&key) {
                if entry.expires_at > Instant::now() {
                    return Ok(entry.value.clone());
                }
            }
            if !inner.in_flight.contains(&key) {
                break;
            }
            inner = self
                .flight_done
                .wait(inner)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        inner.in_flight.insert(key.clone());
        drop(inner);

        let result = loader();

        let mut inner = self.lock();
        inner.in_flight.remove(&key);
        self.flight_done.notify_all();
        match result {
            Ok(value) => {
                let value = Arc::new(value);
                inner.entries.insert(
                    key,
                    Entry {
                        value: value.clone(),
                        expires_at: Instant::now() + ttl,
                    },
                );
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }

    /// Drop the entry for `key`, forcing the next lookup to reload.
    pub fn invalidate(&self, key: &K) {
        self.lock().entries.remove(key);
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.lock().entries.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<K, V>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K, V> Default for QueryCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_miss_then_hit() {
        let cache: QueryCache<String, i32> = QueryCache::new();
        let calls = AtomicUsize::new(0);

        let load = || -> Result<i32, ()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        };
        let first = cache.get_with_refresh("k".to_string(), TTL, load).unwrap();
        assert_eq!(*first, 42);

        let second = cache
            .get_with_refresh("k".to_string(), TTL, || -> Result<i32, ()> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(99)
            })
            .unwrap();
        assert_eq!(*second, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expired_entry_reloads() {
        let cache: QueryCache<String, i32> = QueryCache::new();
        cache
            .get_with_refresh("k".to_string(), Duration::ZERO, || -> Result<i32, ()> {
                Ok(1)
            })
            .unwrap();
        let value = cache
            .get_with_refresh("k".to_string(), TTL, || -> Result<i32, ()> { Ok(2) })
            .unwrap();
        assert_eq!(*value, 2);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let cache: QueryCache<String, i32> = QueryCache::new();
        cache
            .get_with_refresh("k".to_string(), TTL, || -> Result<i32, ()> { Ok(1) })
            .unwrap();
        cache.invalidate(&"k".to_string());
        let value = cache
            .get_with_refresh("k".to_string(), TTL, || -> Result<i32, ()> { Ok(2) })
            .unwrap();
        assert_eq!(*value, 2);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache: QueryCache<String, i32> = QueryCache::new();
        let result = cache.get_with_refresh("k".to_string(), TTL, || Err::<i32, &str>("boom"));
        assert_eq!(result.unwrap_err(), "boom");

        let value = cache
            .get_with_refresh("k".to_string(), TTL, || Ok::<i32, &str>(7))
            .unwrap();
        assert_eq!(*value, 7);
    }

    #[test]
    fn test_single_flight_runs_loader_once() {
        let cache: Arc<QueryCache<String, i32>> = Arc::new(QueryCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                thread::spawn(move || {
                    let value = cache
                        .get_with_refresh("k".to_string(), TTL, || -> Result<i32, ()> {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(50));
                            Ok(42)
                        })
                        .unwrap();
                    assert_eq!(*value, 42);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_keys_do_not_block_each_other() {
        let cache: QueryCache<String, String> = QueryCache::new();
        let a = cache
            .get_with_refresh("a".to_string(), TTL, || -> Result<String, ()> {
                Ok("va".to_string())
            })
            .unwrap();
        let b = cache
            .get_with_refresh("b".to_string(), TTL, || -> Result<String, ()> {
                Ok("vb".to_string())
            })
            .unwrap();
        assert_eq!(*a, "va");
        assert_eq!(*b, "vb");
    }
}
