//! Persistent response cache for upstream geodata APIs.
//!
//! `CacheStore` is plain key/value storage with timestamps; `RequestCache`
//! layers key derivation and time-to-live policy on top of it.

pub mod error;
pub mod request_cache;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use request_cache::{cache_key, RequestCache};
pub use store::{CacheEntry, CacheStore, SqliteCacheStore};
