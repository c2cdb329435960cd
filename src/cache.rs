use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::KvStore;

const CACHE_PREFIX: &str = "cache_";

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    timestamp: i64,
    expiry: i64,
}

/// Time-bounded cache layered on a [`KvStore`].
///
/// Entries live under `cache_`-prefixed keys so that [`TtlCache::clear`]
/// never touches unrelated store content (session keys, per-game progress).
/// Expiry is checked at read time; there is no background eviction, and
/// every read path re-validates, so a stale entry can never be observed.
#[derive(Clone)]
pub struct TtlCache {
    store: Arc<dyn KvStore>,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn storage_key(key: &str) -> String {
        format!("{CACHE_PREFIX}{key}")
    }

    /// Writes `data` with the given lifetime. Failure is non-fatal: it is
    /// logged and reported as `false`, and callers continue without cache.
    pub fn set_item<T: Serialize>(&self, key: &str, data: &T, duration: Duration) -> bool {
        let timestamp = now_ms();
        let entry = CacheEntry {
            data,
            timestamp,
            expiry: timestamp + duration.as_millis() as i64,
        };

        match serde_json::to_string(&entry) {
            Ok(serialized) => {
                self.store.set(&Self::storage_key(key), &serialized);
                true
            }
            Err(e) => {
                warn!(key, error = %e, "cache write failed");
                false
            }
        }
    }

    /// Returns the cached value, or `None` on miss, expiry, or corruption.
    /// Expired and undecodable entries are deleted on the spot so they can
    /// never be resurrected by a later read.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let storage_key = Self::storage_key(key);
        let raw = self.store.get(&storage_key)?;

        let entry = match serde_json::from_str::<CacheEntry<T>>(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key, error = %e, "dropping undecodable cache entry");
                self.store.remove(&storage_key);
                return None;
            }
        };

        if now_ms() > entry.expiry {
            self.store.remove(&storage_key);
            return None;
        }

        Some(entry.data)
    }

    pub fn remove_item(&self, key: &str) {
        self.store.remove(&Self::storage_key(key));
    }

    /// Removes every cache entry, leaving non-`cache_` store content alone.
    pub fn clear(&self) {
        for key in self.store.keys() {
            if key.starts_with(CACHE_PREFIX) {
                self.store.remove(&key);
            }
        }
    }
}
