//! SQLite-backed storage for cached API responses.

use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::{CacheError, CacheResult};

/// ISO-8601 without offset; timestamps are UTC-naive.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// One stored response.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub stored_at: NaiveDateTime,
}

/// Current time as stored in the cache.
pub fn now_naive() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Durable key → (value, timestamp) storage.
///
/// Every operation is atomic on its own; nothing here spans several
/// statements in one transaction. Freshness policy lives in `RequestCache`.
pub trait CacheStore: Send + Sync {
    /// Create the cache table. Safe to call repeatedly.
    fn init_schema(&self) -> CacheResult<()>;

    /// Look up an entry by key.
    ///
    /// Returns `CacheError::Corrupt` if the row exists but can't be decoded.
    fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Store `value` under `key` with an explicit timestamp, replacing any previous entry.
    fn put_at(&self, key: &str, value: &Value, stored_at: NaiveDateTime) -> CacheResult<()>;

    /// Store `value` under `key` stamped with the current time.
    fn put(&self, key: &str, value: &Value) -> CacheResult<()> {
        self.put_at(key, value, now_naive())
    }

    /// Remove an entry. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> CacheResult<()>;

    /// All keys with their timestamps.
    fn entries(&self) -> CacheResult<Vec<(String, NaiveDateTime)>>;

    /// Remove every entry.
    fn clear(&self) -> CacheResult<()>;
}

/// SQLite implementation of [`CacheStore`] using the `api_cache` table.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> CacheResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        tracing::debug!("Opened response cache at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory store (tests and throwaway runs).
    pub fn in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn parse_timestamp(key: &str, raw: &str) -> CacheResult<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
            .map_err(|e| CacheError::corrupt(key, format!("timestamp {:?}: {}", raw, e)))
    }
}

impl CacheStore for SqliteCacheStore {
    fn init_schema(&self) -> CacheResult<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS api_cache (
                cache_key TEXT PRIMARY KEY,
                response TEXT,
                timestamp TEXT
            );
            "#,
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let row: Option<(Option<String>, Option<String>)> = self
            .conn
            .lock()
            .query_row(
                "SELECT response, timestamp FROM api_cache WHERE cache_key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((response, timestamp)) = row else {
            return Ok(None);
        };

        let response = response.ok_or_else(|| CacheError::corrupt(key, "missing response"))?;
        let timestamp = timestamp.ok_or_else(|| CacheError::corrupt(key, "missing timestamp"))?;

        let value: Value =
            serde_json::from_str(&response).map_err(|e| CacheError::corrupt(key, e))?;
        let stored_at = Self::parse_timestamp(key, &timestamp)?;

        Ok(Some(CacheEntry {
            key: key.to_string(),
            value,
            stored_at,
        }))
    }

    fn put_at(&self, key: &str, value: &Value, stored_at: NaiveDateTime) -> CacheResult<()> {
        let response = serde_json::to_string(value)?;
        let timestamp = stored_at.format(TIMESTAMP_FORMAT).to_string();

        self.conn.lock().execute(
            "INSERT OR REPLACE INTO api_cache (cache_key, response, timestamp) VALUES (?1, ?2, ?3)",
            params![key, response, timestamp],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        self.conn
            .lock()
            .execute("DELETE FROM api_cache WHERE cache_key = ?1", params![key])?;
        Ok(())
    }

    fn entries(&self) -> CacheResult<Vec<(String, NaiveDateTime)>> {
        let rows: Vec<(String, Option<String>)> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare("SELECT cache_key, timestamp FROM api_cache")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            let collected = rows.collect::<Result<Vec<_>, _>>()?;
            collected
        };

        let mut entries = Vec::with_capacity(rows.len());
        for (key, timestamp) in rows {
            match timestamp.as_deref().map(|raw| Self::parse_timestamp(&key, raw)) {
                Some(Ok(stored_at)) => entries.push((key, stored_at)),
                Some(Err(e)) => tracing::warn!("Skipping cache entry: {}", e),
                None => tracing::warn!("Skipping cache entry {} without timestamp", key),
            }
        }
        Ok(entries)
    }

    fn clear(&self) -> CacheResult<()> {
        self.conn.lock().execute_batch("DELETE FROM api_cache;")?;
        Ok(())
    }
}
