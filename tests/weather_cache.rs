//! End-to-end tests for the weather cache over a real HTTP client and disk store

use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wxcache::cache::{CacheKey, CacheStore};
use wxcache::{ApiClient, FetchError, FileStore, Source, Units, WeatherCache};

fn new_york() -> serde_json::Value {
    serde_json::json!({
        "coord": {"lon": -74.006, "lat": 40.7128},
        "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
        "main": {"temp": 20.5, "feels_like": 19.8, "temp_min": 18.0, "temp_max": 22.1,
                 "pressure": 1015, "humidity": 55},
        "wind": {"speed": 3.6, "deg": 240},
        "dt": 1720000000,
        "sys": {"country": "US", "sunrise": 1719998000, "sunset": 1720051000},
        "name": "New York"
    })
}

fn cache_over(
    server: &MockServer,
    dir: &TempDir,
) -> WeatherCache<FileStore, ApiClient> {
    let client = ApiClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    WeatherCache::new(FileStore::with_dir(dir.path().to_path_buf()), client)
}

#[tokio::test]
async fn test_second_lookup_is_served_from_disk() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/weather/current"))
        .and(query_param("lat", "40.7128"))
        .and(query_param("lon", "-74.006"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(new_york()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = cache_over(&mock_server, &temp_dir);
    let first = cache.lookup(40.7128, -74.0060, Units::Metric).await.unwrap();
    let second = cache.lookup(40.7128, -74.0060, Units::Metric).await.unwrap();

    assert_eq!(first.source, Source::Fetched);
    assert_eq!(second.source, Source::Fresh);
    assert_eq!(first.snapshot, second.snapshot);
    assert!(temp_dir.path().join("40.7128_-74.006.json").exists());
}

#[tokio::test]
async fn test_entries_survive_a_new_cache_instance() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/weather/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(new_york()))
        .expect(1)
        .mount(&mock_server)
        .await;

    cache_over(&mock_server, &temp_dir)
        .get_current_weather(40.7128, -74.006, Units::Metric)
        .await
        .unwrap();

    let reopened = cache_over(&mock_server, &temp_dir);
    let snapshot = reopened
        .get_current_weather(40.7128, -74.006, Units::Metric)
        .await
        .unwrap();
    assert_eq!(snapshot.name, "New York");
}

#[tokio::test]
async fn test_backend_outage_serves_expired_entry() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/weather/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(new_york()))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/weather/current"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let cache = cache_over(&mock_server, &temp_dir).with_ttl(chrono::Duration::milliseconds(1));
    cache
        .get_current_weather(40.7128, -74.006, Units::Metric)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let found = cache.lookup(40.7128, -74.006, Units::Metric).await.unwrap();
    assert_eq!(found.source, Source::Stale);
    assert_eq!(found.snapshot.name, "New York");
}

#[tokio::test]
async fn test_backend_outage_without_entry_is_an_error() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/weather/current"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "upstream down"})),
        )
        .mount(&mock_server)
        .await;

    let err = cache_over(&mock_server, &temp_dir)
        .get_current_weather(1.0, 2.0, Units::Metric)
        .await
        .unwrap_err();

    match err {
        FetchError::Status { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream down");
        }
        other => panic!("Expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_corrupt_file_on_disk_is_refetched() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("40.7128_-74.006.json"), "{ truncated").unwrap();

    Mock::given(method("GET"))
        .and(path("/weather/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(new_york()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = cache_over(&mock_server, &temp_dir);
    let found = cache.lookup(40.7128, -74.006, Units::Metric).await.unwrap();

    assert_eq!(found.source, Source::Fetched);
    let entry = cache
        .store()
        .get(&CacheKey::from_coords(40.7128, -74.006))
        .expect("entry should be rewritten");
    assert_eq!(entry.location_name, "New York");
}

#[tokio::test]
async fn test_evict_and_clear_on_disk() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/weather/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(new_york()))
        .mount(&mock_server)
        .await;

    let cache = cache_over(&mock_server, &temp_dir);
    cache.get_current_weather(1.0, 1.0, Units::Metric).await.unwrap();
    cache.get_current_weather(2.0, 2.0, Units::Imperial).await.unwrap();

    assert_eq!(cache.evict_expired().unwrap(), 0);
    assert_eq!(cache.clear_all().unwrap(), 2);
    assert!(cache.store().get(&CacheKey::from_coords(1.0, 1.0)).is_none());
}

#[tokio::test]
async fn test_tiny_coordinates_are_written_through() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/weather/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(new_york()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = cache_over(&mock_server, &temp_dir);
    let first = cache.lookup(1e-300, 0.0, Units::Metric).await.unwrap();
    let second = cache.lookup(1e-300, 0.0, Units::Metric).await.unwrap();

    assert_eq!(first.source, Source::Fetched);
    assert_eq!(second.source, Source::Fresh);
}
