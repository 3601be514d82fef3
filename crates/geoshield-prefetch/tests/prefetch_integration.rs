//! End-to-end prefetch against a mock weather API.

use std::sync::Arc;
use std::time::Duration;

use geoshield_cache::{RequestCache, SqliteCacheStore};
use geoshield_core::{LocationGroup, RetryConfig, WeatherConfig};
use geoshield_fetch::{FixedDelay, ResilientFetcher};
use geoshield_prefetch::{JobState, PrefetchScheduler};
use geoshield_weather::WeatherClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn suburbs() -> Vec<LocationGroup> {
    vec![
        LocationGroup::new("carlton", -37.80, 144.97),
        LocationGroup::new("fitzroy", -37.80, 144.98),
        LocationGroup::new("richmond", -37.82, 145.00),
    ]
}

fn weather_client(server: &MockServer) -> (WeatherClient, RequestCache) {
    let cache = RequestCache::new(Arc::new(SqliteCacheStore::in_memory().unwrap()));
    let fetcher = ResilientFetcher::new(cache.clone(), Duration::from_secs(5)).unwrap();
    let config = WeatherConfig {
        base_url: format!("{}/data/2.5/weather", server.uri()),
        api_key: Some("test-key".to_string()),
        ..WeatherConfig::default()
    };
    let client = WeatherClient::new(fetcher, &config, &RetryConfig::default())
        .with_retry_policy(FixedDelay::new(Duration::ZERO));
    (client, cache)
}

#[tokio::test]
async fn test_prefetched_group_is_served_from_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "main": {"temp": 19.0}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, cache) = weather_client(&mock_server);
    let client = Arc::new(client);
    let scheduler = PrefetchScheduler::new(Arc::new(suburbs()), client.clone());

    let ack = scheduler.start(34.0).await.unwrap();
    assert_eq!(ack.sample_size, 1);

    let report = scheduler.wait().await.unwrap();
    assert_eq!(report.state, JobState::Completed);
    assert_eq!(report.failed, 0);

    let warmed: Vec<LocationGroup> = suburbs()
        .into_iter()
        .filter(|g| {
            let key = client
                .request(g.latitude, g.longitude, Duration::from_secs(900))
                .cache_key();
            cache.read(&key, None).unwrap().is_some()
        })
        .collect();
    assert_eq!(warmed.len(), 1);

    // Foreground read of the warmed group makes no new request
    let payload = client
        .current(warmed[0].latitude, warmed[0].longitude)
        .await
        .unwrap();
    assert_eq!(payload["main"]["temp"], 19.0);
}

#[tokio::test]
async fn test_upstream_failures_are_counted_not_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let (client, cache) = weather_client(&mock_server);
    let scheduler = PrefetchScheduler::new(Arc::new(suburbs()), Arc::new(client));

    scheduler.start(100.0).await.unwrap();
    let report = scheduler.wait().await.unwrap();

    assert_eq!(report.state, JobState::Completed);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.failed, 3);
    assert!(cache.store().entries().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_api_key_fails_each_item_without_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let cache = RequestCache::new(Arc::new(SqliteCacheStore::in_memory().unwrap()));
    let fetcher = ResilientFetcher::new(cache, Duration::from_secs(5)).unwrap();
    let config = WeatherConfig {
        base_url: mock_server.uri(),
        ..WeatherConfig::default()
    };
    let client = WeatherClient::new(fetcher, &config, &RetryConfig::default());
    let scheduler = PrefetchScheduler::new(Arc::new(suburbs()), Arc::new(client));

    scheduler.start(100.0).await.unwrap();
    let report = scheduler.wait().await.unwrap();

    assert_eq!(report.failed, 3);
}
