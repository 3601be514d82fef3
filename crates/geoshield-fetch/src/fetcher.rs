use std::time::Duration;

use geoshield_cache::RequestCache;
use reqwest::Client;
use serde_json::Value;

use crate::error::FetchError;
use crate::request::FetchRequest;
use crate::retry::RetryDecision;

const USER_AGENT: &str = concat!("geoshield/", env!("CARGO_PKG_VERSION"));

/// Performs upstream GETs through the response cache.
#[derive(Clone)]
pub struct ResilientFetcher {
    client: Client,
    cache: RequestCache,
}

impl ResilientFetcher {
    /// Build a fetcher with its own HTTP client.
    pub fn new(cache: RequestCache, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::transport)?;

        Ok(Self::with_client(client, cache))
    }

    pub fn with_client(client: Client, cache: RequestCache) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    /// Fetch JSON for `req`, serving from cache when fresh.
    ///
    /// Missing credentials fail immediately. Transport, status and decode
    /// failures are retried as the request's policy decides; once the
    /// attempt budget is spent the last error is returned unchanged.
    pub async fn fetch(&self, req: &FetchRequest) -> Result<Value, FetchError> {
        let query = req.query_pairs()?;
        let key = req.cache_key();

        if req.use_cache {
            if let Some(value) = self.cache_read(&key, req.max_age).await? {
                return Ok(value);
            }
        }

        let attempts = req.attempts();
        let mut attempt = 0;

        loop {
            match self.send_once(&req.base_url, &query).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            "Request to {} succeeded after {} retries",
                            req.base_url,
                            attempt
                        );
                    }
                    if req.use_cache {
                        return self.cache_write(key, value).await;
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if attempt + 1 >= attempts {
                        tracing::error!(
                            "All {} attempts to {} exhausted: {}",
                            attempts,
                            req.base_url,
                            err
                        );
                        return Err(err);
                    }

                    match req.retry_policy.decide(&err, attempt, attempts) {
                        RetryDecision::RetryAfter(delay) => {
                            tracing::warn!(
                                "Attempt {} of {} to {} failed: {}. Retrying in {:?}",
                                attempt + 1,
                                attempts,
                                req.base_url,
                                err,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::GiveUp => {
                            tracing::warn!(
                                "Attempt {} of {} to {} failed, not retrying: {}",
                                attempt + 1,
                                attempts,
                                req.base_url,
                                err
                            );
                            return Err(err);
                        }
                    }
                }
            }
            attempt += 1;
        }
    }

    async fn cache_read(
        &self,
        key: &str,
        max_age: Option<Duration>,
    ) -> Result<Option<Value>, FetchError> {
        let cache = self.cache.clone();
        let key = key.to_string();
        Ok(tokio::task::spawn_blocking(move || cache.read(&key, max_age)).await??)
    }

    async fn cache_write(&self, key: String, value: Value) -> Result<Value, FetchError> {
        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || {
            cache.write(&key, &value)?;
            Ok(value)
        })
        .await?
    }

    async fn send_once(&self, url: &str, query: &[(String, String)]) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(FetchError::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await.map_err(FetchError::transport)?;
        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
