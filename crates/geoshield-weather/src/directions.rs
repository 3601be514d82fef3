//! Google Directions through the response cache.

use std::sync::Arc;
use std::time::Duration;

use geoshield_core::{DirectionsConfig, RetryConfig};
use geoshield_fetch::{FetchRequest, FixedDelay, ResilientFetcher, RetryPolicy};
use serde_json::Value;

use crate::types::{DirectionsError, Route, TravelMode};

const POLYLINE_PRECISION: f64 = 1e5;

#[derive(Clone)]
pub struct DirectionsClient {
    fetcher: ResilientFetcher,
    base_url: String,
    api_key: Option<String>,
    max_age: Option<Duration>,
    max_retries: u32,
    policy: Arc<dyn RetryPolicy>,
}

impl DirectionsClient {
    pub fn new(fetcher: ResilientFetcher, config: &DirectionsConfig, retry: &RetryConfig) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            max_age: config.max_age_secs.map(Duration::from_secs),
            max_retries: retry.max_retries,
            policy: Arc::new(FixedDelay::new(Duration::from_millis(retry.fixed_delay_ms))),
        }
    }

    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn request(
        &self,
        origin: (f64, f64),
        destination: (f64, f64),
        mode: TravelMode,
    ) -> FetchRequest {
        let mut req = FetchRequest::new(&self.base_url)
            .param("origin", format!("{},{}", origin.0, origin.1))
            .param("destination", format!("{},{}", destination.0, destination.1))
            .param("mode", mode.as_str())
            .param("alternatives", "false")
            .secret("key", self.api_key.clone())
            .max_retries(self.max_retries)
            .shared_retry_policy(Arc::clone(&self.policy));

        if let Some(max_age) = self.max_age {
            req = req.max_age(max_age);
        }
        req
    }

    /// Route between two points. `activity` is free text; see
    /// [`TravelMode::from_activity`].
    pub async fn route(
        &self,
        origin: (f64, f64),
        destination: (f64, f64),
        activity: &str,
    ) -> Result<Route, DirectionsError> {
        let mode = TravelMode::from_activity(activity);
        let payload = self.fetcher.fetch(&self.request(origin, destination, mode)).await?;
        parse_route(&payload, mode)
    }
}

/// Extract and decode the first route's overview polyline.
pub fn parse_route(payload: &Value, mode: TravelMode) -> Result<Route, DirectionsError> {
    let status = payload["status"].as_str().unwrap_or_default();
    if status != "OK" {
        return Err(DirectionsError::Api {
            status: if status.is_empty() { "UNKNOWN".to_string() } else { status.to_string() },
            message: payload["error_message"].as_str().unwrap_or_default().to_string(),
        });
    }

    let points = payload["routes"][0]["overview_polyline"]["points"]
        .as_str()
        .ok_or_else(|| DirectionsError::Parse("missing overview polyline".to_string()))?;

    Ok(Route {
        mode,
        waypoints: decode_polyline(points)?,
    })
}

/// Decode an encoded polyline (precision 5) into (latitude, longitude) pairs.
pub fn decode_polyline(encoded: &str) -> Result<Vec<(f64, f64)>, DirectionsError> {
    let bytes = encoded.as_bytes();
    let mut pos = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut points = Vec::new();

    while pos < bytes.len() {
        lat += next_value(bytes, &mut pos)?;
        lng += next_value(bytes, &mut pos)?;
        points.push((lat as f64 / POLYLINE_PRECISION, lng as f64 / POLYLINE_PRECISION));
    }

    Ok(points)
}

fn next_value(bytes: &[u8], pos: &mut usize) -> Result<i64, DirectionsError> {
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let byte = *bytes.get(*pos).ok_or(DirectionsError::Polyline(*pos))?;
        if !(63..=126).contains(&byte) || shift > 30 {
            return Err(DirectionsError::Polyline(*pos));
        }
        *pos += 1;

        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}
