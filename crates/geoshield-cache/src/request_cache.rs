//! Cache keys and freshness policy on top of a [`CacheStore`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::error::{CacheError, CacheResult};
use crate::store::{now_naive, CacheStore};

/// Derive the cache key for an endpoint and its public parameters.
///
/// Parameters are sorted by name and rendered as a JSON object with `", "`
/// and `": "` separators, so the key does not depend on the order the
/// parameters were supplied in and matches keys already written to a shared
/// `api_cache` table. Credentials must never be passed here.
pub fn cache_key<'a, I, K>(base_url: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, &'a Value)>,
    K: AsRef<str>,
{
    let sorted: BTreeMap<String, &Value> = params
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v))
        .collect();

    let body = sorted
        .iter()
        .map(|(k, v)| format!("{}: {}", Value::String(k.clone()), v))
        .collect::<Vec<_>>()
        .join(", ");

    format!("{}_{{{}}}", base_url, body)
}

/// Time-to-live cache of upstream responses.
#[derive(Clone)]
pub struct RequestCache {
    store: Arc<dyn CacheStore>,
}

impl RequestCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Return the cached value for `key` if it is no older than `max_age`.
    ///
    /// A stale entry is deleted and reported as a miss. `None` for `max_age`
    /// means entries never expire. Entries that can't be decoded are flushed
    /// and treated as misses.
    pub fn read(&self, key: &str, max_age: Option<Duration>) -> CacheResult<Option<Value>> {
        let entry = match self.store.get(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::debug!("Cache miss: {}", key);
                return Ok(None);
            }
            Err(CacheError::Corrupt { reason, .. }) => {
                tracing::warn!("Flushing unreadable cache entry {}: {}", key, reason);
                self.store.delete(key)?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if let Some(max_age) = max_age {
            // A timestamp in the future (clock skew) counts as fresh.
            let age = (now_naive() - entry.stored_at).to_std().unwrap_or(Duration::ZERO);
            if age > max_age {
                tracing::debug!("Cache entry expired after {:?}: {}", age, key);
                self.store.delete(key)?;
                return Ok(None);
            }
        }

        tracing::debug!("Cache hit: {}", key);
        Ok(Some(entry.value))
    }

    /// Store `value` under `key` with the current time.
    pub fn write(&self, key: &str, value: &Value) -> CacheResult<()> {
        self.store.put(key, value)
    }

    /// Remove one entry.
    pub fn flush(&self, key: &str) -> CacheResult<()> {
        self.store.delete(key)
    }

    /// Remove entries whose key matches `pattern` at its start and whose age exceeds `max_age`.
    ///
    /// Returns the number of entries removed.
    pub fn purge(&self, pattern: &str, max_age: Duration) -> CacheResult<usize> {
        let regex = Regex::new(&format!("^(?:{})", pattern))?;
        let now = now_naive();
        let mut removed = 0;

        for (key, stored_at) in self.store.entries()? {
            if !regex.is_match(&key) {
                continue;
            }
            let age = (now - stored_at).to_std().unwrap_or(Duration::ZERO);
            if age > max_age {
                self.store.delete(&key)?;
                removed += 1;
            }
        }

        tracing::info!("Purged {} cache entries matching {:?}", removed, pattern);
        Ok(removed)
    }
}
