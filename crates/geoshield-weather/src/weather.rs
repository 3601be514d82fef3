//! OpenWeather current conditions through the response cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use geoshield_core::{CoordinateResolver, RetryConfig, WeatherConfig};
use geoshield_fetch::{ExponentialBackoff, FetchRequest, ResilientFetcher, RetryPolicy};
use serde_json::Value;

use crate::types::{CurrentConditions, WeatherError};

/// Round a coordinate to two decimals (about 1 km) so nearby requests share
/// a cache entry.
pub fn round_coordinate(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone)]
pub struct WeatherClient {
    fetcher: ResilientFetcher,
    base_url: String,
    units: String,
    api_key: Option<String>,
    max_age: Duration,
    prefetch_max_age: Duration,
    max_retries: u32,
    policy: Arc<dyn RetryPolicy>,
}

impl WeatherClient {
    pub fn new(fetcher: ResilientFetcher, config: &WeatherConfig, retry: &RetryConfig) -> Self {
        let policy = ExponentialBackoff::new(
            Duration::from_millis(retry.initial_delay_ms),
            Duration::from_millis(retry.max_delay_ms),
        );

        Self {
            fetcher,
            base_url: config.base_url.clone(),
            units: config.units.clone(),
            api_key: config.api_key.clone(),
            max_age: Duration::from_secs(config.max_age_secs),
            prefetch_max_age: Duration::from_secs(config.prefetch_max_age_secs),
            max_retries: retry.max_retries,
            policy: Arc::new(policy),
        }
    }

    /// Replace the retry policy, mainly so tests don't sleep.
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Build the request for a coordinate. The API key is a secret parameter.
    pub fn request(&self, latitude: f64, longitude: f64, max_age: Duration) -> FetchRequest {
        FetchRequest::new(&self.base_url)
            .param("lat", round_coordinate(latitude))
            .param("lon", round_coordinate(longitude))
            .param("units", self.units.as_str())
            .secret("appid", self.api_key.clone())
            .max_age(max_age)
            .max_retries(self.max_retries)
            .shared_retry_policy(Arc::clone(&self.policy))
    }

    /// Raw payload for a coordinate, accepting cached data up to the
    /// foreground max age.
    pub async fn current(&self, latitude: f64, longitude: f64) -> Result<Value, WeatherError> {
        let req = self.request(latitude, longitude, self.max_age);
        Ok(self.fetcher.fetch(&req).await?)
    }

    pub async fn current_conditions(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<CurrentConditions, WeatherError> {
        let payload = self.current(latitude, longitude).await?;
        CurrentConditions::from_payload(&payload)
    }
}

/// Prefetching warms the cache with a slightly shorter max age than
/// foreground reads, so prefetched entries are refreshed before they would
/// expire for a user.
#[async_trait]
impl CoordinateResolver for WeatherClient {
    async fn resolve_coordinates(&self, latitude: f64, longitude: f64) -> anyhow::Result<Value> {
        let req = self.request(latitude, longitude, self.prefetch_max_age);
        Ok(self.fetcher.fetch(&req).await?)
    }
}
