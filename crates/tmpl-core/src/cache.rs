//! Bounded, time-expiring store of compiled templates.
//!
//! Expiry is checked lazily on read; `size()` may count entries that have
//! expired but not been touched since. `clean_expired()` forces a sweep.
//! Eviction removes the entry that was *set* longest ago; reads never
//! refresh an entry.

use crate::compiler::CompiledTemplate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_SIZE: usize = 100;
pub const DEFAULT_TTL: Duration = Duration::from_millis(300_000);

/// A cache that can be handed to several managers on purpose.
pub type SharedCache = Arc<Mutex<TemplateCache>>;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted: Instant,
    /// Insertion order; breaks ties between equal `Instant`s.
    seq: u64,
}

#[derive(Debug)]
pub struct TemplateCache<V = Arc<CompiledTemplate>> {
    entries: HashMap<String, Entry<V>>,
    max_size: usize,
    ttl: Duration,
    next_seq: u64,
}

impl<V: Clone> TemplateCache<V> {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }

    pub fn with_limits(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_size,
            ttl,
            next_seq: 0,
        }
    }

    pub fn shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    /// Return the value if present and not older than the TTL. An expired
    /// entry is removed here.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = self.entries.get(key)?.inserted.elapsed() > self.ttl;
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    /// Insert or overwrite. A new key at capacity evicts the oldest entry
    /// first; overwriting never evicts and restamps the entry.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        if self.max_size == 0 {
            return;
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            self.evict_oldest();
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key,
            Entry {
                value,
                inserted: Instant::now(),
                seq,
            },
        );
    }

    /// True when a non-expired `get` would succeed. May expire the entry.
    pub fn has(&mut self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Shrink (or grow) capacity, evicting oldest entries down to `max_size`.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        while self.entries.len() > max_size {
            self.evict_oldest();
        }
    }

    /// Applies to later expiry checks only; existing stamps are kept.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    /// Remove every expired entry and return how many were removed.
    pub fn clean_expired(&mut self) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, e| e.inserted.elapsed() <= ttl);
        before - self.entries.len()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| (e.inserted, e.seq))
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            tracing::debug!(key = %key, "evicting oldest cache entry");
            self.entries.remove(&key);
        }
    }
}

impl<V: Clone> Default for TemplateCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn cache(max: usize, ttl_ms: u64) -> TemplateCache<String> {
        TemplateCache::with_limits(max, Duration::from_millis(ttl_ms))
    }

    #[test]
    fn defaults() {
        let c: TemplateCache<String> = TemplateCache::new();
        assert_eq!(c.max_size(), 100);
        assert_eq!(c.ttl(), Duration::from_millis(300_000));
        assert!(c.is_empty());
    }

    #[test]
    fn get_after_set_returns_value() {
        let mut c = cache(10, 60_000);
        c.set("prd", "v1".to_string());
        assert_eq!(c.get("prd").as_deref(), Some("v1"));
        assert!(c.has("prd"));
        assert_eq!(c.get("other"), None);
    }

    #[test]
    fn expired_entries_miss_and_are_removed_lazily() {
        let mut c = cache(10, 30);
        c.set("prd", "v1".to_string());
        sleep(Duration::from_millis(60));
        assert_eq!(c.size(), 1, "expiry is lazy");
        assert_eq!(c.get("prd"), None);
        assert!(!c.has("prd"));
        assert_eq!(c.size(), 0);
    }

    #[test]
    fn capacity_evicts_oldest_insert() {
        let mut c = cache(3, 60_000);
        c.set("a", "1".to_string());
        c.set("b", "2".to_string());
        c.set("c", "3".to_string());
        c.set("d", "4".to_string());
        assert_eq!(c.size(), 3);
        assert_eq!(c.keys(), ["b", "c", "d"]);
    }

    #[test]
    fn overwrite_refreshes_stamp_without_eviction() {
        let mut c = cache(2, 60_000);
        c.set("a", "1".to_string());
        c.set("b", "2".to_string());
        c.set("a", "1b".to_string());
        assert_eq!(c.size(), 2);
        c.set("c", "3".to_string());
        assert_eq!(c.keys(), ["a", "c"]);
        assert_eq!(c.get("a").as_deref(), Some("1b"));
    }

    #[test]
    fn reads_do_not_promote() {
        let mut c = cache(2, 60_000);
        c.set("a", "1".to_string());
        c.set("b", "2".to_string());
        assert!(c.has("a"));
        c.set("c", "3".to_string());
        assert_eq!(c.keys(), ["b", "c"]);
    }

    #[test]
    fn set_max_size_evicts_immediately() {
        let mut c = cache(5, 60_000);
        for k in ["a", "b", "c", "d"] {
            c.set(k, k.to_string());
        }
        c.set_max_size(2);
        assert_eq!(c.keys(), ["c", "d"]);
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut c = cache(0, 60_000);
        c.set("a", "1".to_string());
        assert!(c.is_empty());
    }

    #[test]
    fn clean_expired_counts_removed() {
        let mut c = cache(10, 30);
        c.set("old1", "1".to_string());
        c.set("old2", "2".to_string());
        sleep(Duration::from_millis(60));
        c.set("fresh", "3".to_string());
        assert_eq!(c.clean_expired(), 2);
        assert_eq!(c.keys(), ["fresh"]);
    }

    #[test]
    fn set_ttl_is_not_retroactive_on_stamps() {
        let mut c = cache(10, 30);
        c.set("a", "1".to_string());
        c.set_ttl(Duration::from_secs(60));
        sleep(Duration::from_millis(60));
        assert!(c.has("a"), "longer ttl now applies to the old stamp");
        c.set_ttl(Duration::from_millis(10));
        assert!(!c.has("a"));
    }

    #[test]
    fn delete_and_clear() {
        let mut c = cache(10, 60_000);
        c.set("a", "1".to_string());
        c.set("b", "2".to_string());
        assert!(c.delete("a"));
        assert!(!c.delete("a"));
        c.clear();
        assert!(c.is_empty());
    }
}
