//! Description of one cached, retried upstream read.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use geoshield_cache::cache_key;
use serde_json::Value;

use crate::error::FetchError;
use crate::retry::{ExponentialBackoff, RetryPolicy};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// An outbound GET with its caching and retry settings.
///
/// Public parameters identify the response and form the cache key. Secret
/// parameters (API keys) are only merged into the query string when the
/// request is sent.
#[derive(Clone)]
pub struct FetchRequest {
    pub base_url: String,
    pub public_params: BTreeMap<String, Value>,
    secret_params: BTreeMap<String, Option<String>>,
    pub use_cache: bool,
    /// `None` accepts cached entries of any age
    pub max_age: Option<Duration>,
    /// Total attempts, including the first. Zero is treated as one.
    pub max_retries: u32,
    pub retry_policy: Arc<dyn RetryPolicy>,
}

impl FetchRequest {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            public_params: BTreeMap::new(),
            secret_params: BTreeMap::new(),
            use_cache: true,
            max_age: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_policy: Arc::new(ExponentialBackoff::default()),
        }
    }

    /// Add a cache-relevant query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.public_params.insert(name.into(), value.into());
        self
    }

    /// Add a credential. `None` marks it as required but missing, which fails
    /// the fetch with a configuration error before any network attempt.
    pub fn secret(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.secret_params.insert(name.into(), value);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }

    pub fn shared_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Cache key from the base URL and public parameters only.
    pub fn cache_key(&self) -> String {
        cache_key(&self.base_url, &self.public_params)
    }

    /// Attempt budget with the zero case folded to a single attempt.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Name of the first secret parameter that has no value.
    pub fn missing_secret(&self) -> Option<&str> {
        self.secret_params
            .iter()
            .find(|(_, v)| v.as_deref().map_or(true, |s| s.trim().is_empty()))
            .map(|(k, _)| k.as_str())
    }

    /// Public and secret parameters merged into query pairs. Secrets win on a
    /// name clash.
    pub(crate) fn query_pairs(&self) -> Result<Vec<(String, String)>, FetchError> {
        if let Some(name) = self.missing_secret() {
            return Err(FetchError::missing_credential(name));
        }

        let mut merged: BTreeMap<&str, String> = self
            .public_params
            .iter()
            .map(|(k, v)| (k.as_str(), query_value(v)))
            .collect();
        for (k, v) in &self.secret_params {
            if let Some(v) = v {
                merged.insert(k.as_str(), v.clone());
            }
        }

        Ok(merged
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect())
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secrets: Vec<&str> = self.secret_params.keys().map(String::as_str).collect();
        f.debug_struct("FetchRequest")
            .field("base_url", &self.base_url)
            .field("public_params", &self.public_params)
            .field("secret_params", &secrets)
            .field("use_cache", &self.use_cache)
            .field("max_age", &self.max_age)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
