//! HTTP client for the weather backend proxy
//!
//! The backend fronts OpenWeatherMap and stores saved locations. Every call
//! returns a typed model or a [`FetchError`] describing what went wrong.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use super::{Forecast, GeoLocation, SavedLocation, Units, WeatherSnapshot};

/// Backend base URL used when none is configured
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Request timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Number of geocoding matches requested by default
pub const DEFAULT_GEOCODE_LIMIT: u32 = 5;

/// Shortest query worth sending to the geocoder
pub const MIN_SEARCH_LEN: usize = 2;

/// Errors that can occur when calling the backend
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport failure, including timeouts
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Backend answered with a non-2xx status
    #[error("API error: {status} {message}")]
    Status { status: u16, message: String },

    /// Body did not match the expected model
    #[error("Failed to parse JSON response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Response from the backend health endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Error body the backend sends alongside 4xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Source of current-weather snapshots
///
/// The weather cache calls this on a miss. It makes a single attempt; any
/// timeout is the implementation's concern.
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    async fn fetch_current(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError>;
}

#[async_trait]
impl<F: WeatherFetcher + ?Sized> WeatherFetcher for Arc<F> {
    async fn fetch_current(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        (**self).fetch_current(lat, lon, units).await
    }
}

/// Client for the weather backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    /// Base URL without a trailing slash (e.g. `http://localhost:5000/api`)
    base_url: String,
}

impl ApiClient {
    /// Creates a client for `base_url` whose requests time out after `timeout`
    ///
    /// # Arguments
    /// * `base_url` - Backend root such as `http://localhost:5000/api`; a
    ///   trailing slash is dropped
    /// * `timeout` - Whole-request timeout applied to every call
    ///
    /// # Returns
    /// `FetchError::Request` if the HTTP client cannot be built (e.g., no TLS backend).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a client with a preconfigured HTTP client
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Fetches current conditions for a coordinate pair
    ///
    /// Issues `GET {base}/weather/current?lat=..&lon=..&units=..` with no
    /// caching or retries; [`WeatherCache`](crate::cache::WeatherCache) layers
    /// those semantics on top.
    ///
    /// # Returns
    /// * `Ok(WeatherSnapshot)` - Decoded body of a 2xx response
    /// * `Err(FetchError::Status)` - Non-2xx response, with the backend's message
    /// * `Err(FetchError::Request)` - Connection failure or timeout
    /// * `Err(FetchError::Decode)` - Body was not a weather snapshot
    #[instrument(skip(self), level = "debug")]
    pub async fn current_weather(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        let response = self
            .client
            .get(self.url("weather/current"))
            .query(&coord_query(lat, lon, Some(units)))
            .send()
            .await?;

        decode(response).await
    }

    /// Fetches the five-day forecast for a coordinate pair
    #[instrument(skip(self), level = "debug")]
    pub async fn forecast(&self, lat: f64, lon: f64, units: Units) -> Result<Forecast, FetchError> {
        let response = self
            .client
            .get(self.url("weather/forecast"))
            .query(&coord_query(lat, lon, Some(units)))
            .send()
            .await?;

        decode(response).await
    }

    /// Resolves a place name to candidate coordinates
    #[instrument(skip(self), level = "debug")]
    pub async fn geocode(&self, query: &str, limit: u32) -> Result<Vec<GeoLocation>, FetchError> {
        let response = self
            .client
            .get(self.url("weather/geocode"))
            .query(&[("q", query.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;

        decode(response).await
    }

    /// Searches for a city by name
    ///
    /// Queries shorter than two characters return no matches without
    /// contacting the backend.
    ///
    /// # Arguments
    /// * `query` - City name; surrounding whitespace is ignored
    /// * `limit` - Maximum number of matches to request
    pub async fn search_city(&self, query: &str, limit: u32) -> Result<Vec<GeoLocation>, FetchError> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }
        self.geocode(query, limit).await
    }

    /// Resolves coordinates to named places
    #[instrument(skip(self), level = "debug")]
    pub async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Vec<GeoLocation>, FetchError> {
        let response = self
            .client
            .get(self.url("weather/reverse-geocode"))
            .query(&coord_query(lat, lon, None))
            .send()
            .await?;

        decode(response).await
    }

    /// Lists locations saved on the backend, default first
    #[instrument(skip(self), level = "debug")]
    pub async fn saved_locations(&self) -> Result<Vec<SavedLocation>, FetchError> {
        let response = self.client.get(self.url("locations/")).send().await?;
        decode(response).await
    }

    /// Saves a new location on the backend and returns it with its id
    #[instrument(skip(self, location), fields(name = %location.name), level = "debug")]
    pub async fn add_saved_location(
        &self,
        location: &SavedLocation,
    ) -> Result<SavedLocation, FetchError> {
        let response = self
            .client
            .post(self.url("locations/"))
            .json(location)
            .send()
            .await?;

        decode(response).await
    }

    /// Replaces the stored fields of a saved location
    #[instrument(skip(self, location), level = "debug")]
    pub async fn update_saved_location(
        &self,
        id: i64,
        location: &SavedLocation,
    ) -> Result<SavedLocation, FetchError> {
        let response = self
            .client
            .put(self.url(&format!("locations/{}", id)))
            .json(location)
            .send()
            .await?;

        decode(response).await
    }

    /// Deletes a saved location
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_saved_location(&self, id: i64) -> Result<(), FetchError> {
        let response = self
            .client
            .delete(self.url(&format!("locations/{}", id)))
            .send()
            .await?;

        check_status(response).await.map(|_| ())
    }

    /// Checks that the backend is up
    #[instrument(skip(self), level = "debug")]
    pub async fn health(&self) -> Result<HealthStatus, FetchError> {
        let response = self.client.get(self.url("health")).send().await?;
        decode(response).await
    }
}

#[async_trait]
impl WeatherFetcher for ApiClient {
    async fn fetch_current(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        self.current_weather(lat, lon, units).await
    }
}

fn coord_query(lat: f64, lon: f64, units: Option<Units>) -> Vec<(&'static str, String)> {
    let mut query = vec![("lat", lat.to_string()), ("lon", lon.to_string())];
    if let Some(units) = units {
        query.push(("units", units.as_str().to_string()));
    }
    query
}

/// Returns the body text of a 2xx response, or a `Status` error
async fn check_status(response: Response) -> Result<String, FetchError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            message: error_message(status, &text),
        });
    }
    Ok(text)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let text = check_status(response).await?;
    Ok(serde_json::from_str(&text)?)
}

/// Prefers the backend's `{"error": ...}` message over the reason phrase
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|body| body.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("Unknown error").to_string())
}
