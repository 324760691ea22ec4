//! Memoization with a TTL and at most one concurrent fetch per key.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::CacheConfig;

pub struct ResultCache<K, V> {
    config: CacheConfig,
    state: Mutex<State<K, V>>,
}

struct State<K, V> {
    entries: HashMap<K, Entry<V>>,
    key_locks: HashMap<K, Arc<Mutex<()>>>,
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                entries: HashMap::new(),
                key_locks: HashMap::new(),
            }),
        }
    }

    /// Return the cached value for `key`, or run `fetcher` and cache its
    /// result. `Ok(None)` and errors are returned as-is and never stored.
    pub async fn get_or_set<F, Fut, E>(&self, key: K, fetcher: F) -> Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        // Optimistic check, then pick up the per-key lock.
        let key_lock = {
            let mut s = self.state.lock().await;
            if let Some(v) = self.fresh(&mut s, &key) {
                return Ok(Some(v));
            }
            s.key_locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let _guard = key_lock.lock().await;

        // Another caller may have filled the entry while we waited.
        {
            let mut s = self.state.lock().await;
            if let Some(v) = self.fresh(&mut s, &key) {
                s.key_locks.remove(&key);
                return Ok(Some(v));
            }
        }

        let fetched = fetcher().await;
        let mut s = self.state.lock().await;
        match &fetched {
            Ok(Some(value)) => {
                s.entries.insert(
                    key.clone(),
                    Entry {
                        value: value.clone(),
                        stored_at: Instant::now(),
                    },
                );
            }
            Ok(None) => tracing::debug!("fetch returned no result; not caching"),
            Err(_) => tracing::debug!("fetch failed; not caching"),
        }
        // Released on every outcome, while the key guard is still held.
        s.key_locks.remove(&key);
        fetched
    }

    pub async fn invalidate(&self, key: &K) {
        self.state.lock().await.entries.remove(key);
    }

    /// Number of stored entries, expired ones included until next access.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn fresh(&self, s: &mut State<K, V>, key: &K) -> Option<V> {
        let entry = s.entries.get(key)?;
        if entry.stored_at.elapsed() < self.config.ttl {
            return Some(entry.value.clone());
        }
        s.entries.remove(key);
        None
    }
}
