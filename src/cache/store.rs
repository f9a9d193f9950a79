//! TTL response store for range reads.

use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use metrics::counter;
use sheets_proxy_types::{CacheCounters, Rows};

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
const METRIC_CACHE_HIT: &str = "sheets_proxy_cache_hit_total";
const METRIC_CACHE_MISS: &str = "sheets_proxy_cache_miss_total";
const METRIC_CACHE_EXPIRED: &str = "sheets_proxy_cache_expired_total";

#[derive(Debug, Clone)]
struct Entry {
    values: Arc<Rows>,
    inserted_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

/// Read cache with lazy expiry and hit/miss accounting.
///
/// An empty `Rows` is a valid cached value; only an absent or expired entry
/// counts as a miss.
pub struct ResponseCache {
    config: CacheConfig,
    entries: RwLock<HashMap<CacheKey, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Rows>> {
        let now = Instant::now();
        let lookup = rw_read(&self.entries, SOURCE, "get")
            .get(key)
            .map(|entry| (entry.is_expired(now), Arc::clone(&entry.values)));

        match lookup {
            Some((false, values)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                counter!(METRIC_CACHE_HIT).increment(1);
                Some(values)
            }
            Some((true, _)) => {
                self.remove_if_expired(key, now);
                self.record_miss();
                None
            }
            None => {
                self.record_miss();
                None
            }
        }
    }

    /// Store `values` under `key` with the configured TTL.
    pub fn set(&self, key: CacheKey, values: Arc<Rows>) {
        self.set_with_ttl(key, values, self.config.ttl);
    }

    pub fn set_with_ttl(&self, key: CacheKey, values: Arc<Rows>, ttl: Duration) {
        let entry = Entry {
            values,
            inserted_at: Instant::now(),
            ttl,
        };
        rw_write(&self.entries, SOURCE, "set").insert(key, entry);
    }

    /// Drop exactly `key`. Returns whether an entry was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        rw_write(&self.entries, SOURCE, "invalidate")
            .remove(key)
            .is_some()
    }

    /// Drop every entry and return how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        let cleared = entries.len();
        entries.clear();
        cleared
    }

    /// Drop every entry whose rendered key contains `pattern`.
    pub fn clear_matching(&self, pattern: &str) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "clear_matching");
        let before = entries.len();
        entries.retain(|key, _| !key.to_string().contains(pattern));
        before - entries.len()
    }

    /// Remove expired entries and return how many were purged.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "purge_expired");
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - entries.len();
        if purged > 0 {
            counter!(METRIC_CACHE_EXPIRED).increment(purged as u64);
        }
        purged
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheCounters {
        CacheCounters {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.len(),
        }
    }

    /// Up to `limit` rendered keys of live entries, sorted for stable output.
    pub fn keys(&self, limit: usize) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = rw_read(&self.entries, SOURCE, "keys")
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.to_string())
            .collect();
        keys.sort_unstable();
        keys.truncate(limit);
        keys
    }

    fn remove_if_expired(&self, key: &CacheKey, now: Instant) {
        let mut entries = rw_write(&self.entries, SOURCE, "get.expire");
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            counter!(METRIC_CACHE_EXPIRED).increment(1);
        }
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_MISS).increment(1);
    }
}
