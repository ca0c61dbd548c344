//! TTL cache: memoizes server responses across concurrent sessions.
//!
//! Entries expire against a monotonic clock, so wall-clock adjustments never
//! evict early or keep stale data alive. Expired entries are removed lazily
//! by the lookup that finds them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

struct Entry<V> {
    expires_at: Instant,
    value: Arc<V>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// String-keyed store with per-entry time-to-live.
///
/// Hits hand out an [`Arc`] handle rather than a lock-scoped borrow, so a
/// reader can keep using a value while other sessions insert or evict. A
/// discarded value is dropped exactly once, whichever path discards it.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up `key`, evicting it first if its TTL has elapsed.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(e) if !e.is_expired(now) => return Some(Arc::clone(&e.value)),
                Some(_) => {}
                None => return None,
            }
        }

        // Found but expired: upgrade to the write lock and re-check, since
        // another writer may have replaced the entry in the window.
        let mut entries = self.entries.write().unwrap();
        match entries.get(key) {
            Some(e) if e.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(e) => Some(Arc::clone(&e.value)),
            None => None,
        }
    }

    /// Insert `value` under `key` with the given lifetime, returning a
    /// handle to whichever value survives.
    ///
    /// A live entry already present under `key` wins; the new value is
    /// dropped. An expired entry is replaced.
    pub fn insert(&self, key: &str, ttl: Duration, value: V) -> Arc<V> {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap();
        match entries.get(key) {
            Some(e) if !e.is_expired(now) => Arc::clone(&e.value),
            _ => {
                let value = Arc::new(value);
                entries.insert(
                    key.to_owned(),
                    Entry {
                        expires_at: now + ttl,
                        value: Arc::clone(&value),
                    },
                );
                value
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
