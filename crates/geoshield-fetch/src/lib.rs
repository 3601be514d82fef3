//! Outbound reads through the response cache, with retry and backoff.
//!
//! Credentials travel as secret parameters: they are merged into the query
//! string at send time and never reach the cache key, the cache, or the logs.

pub mod error;
pub mod fetcher;
pub mod request;
pub mod retry;

pub use error::FetchError;
pub use fetcher::ResilientFetcher;
pub use request::FetchRequest;
pub use retry::{
    is_transient_status, ExponentialBackoff, FixedDelay, RetryDecision, RetryPolicy,
    TransientOnly,
};
