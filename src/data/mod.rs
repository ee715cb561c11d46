//! Wire models for the weather backend
//!
//! These mirror the JSON returned by the backend proxy, which passes through
//! OpenWeatherMap's current-weather, forecast and geocoding shapes.

pub mod client;

pub use client::{ApiClient, FetchError, HealthStatus, WeatherFetcher};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unit system requested from the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    /// Query-string value understood by the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn temp_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn speed_unit(&self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            other => Err(format!("unknown unit system '{}'", other)),
        }
    }
}

/// Current weather at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub coord: Coord,
    #[serde(default)]
    pub weather: Vec<Condition>,
    pub main: MainReadings,
    #[serde(default)]
    pub visibility: Option<i64>,
    pub wind: Wind,
    #[serde(default)]
    pub clouds: Option<Clouds>,
    /// Observation time (unix seconds)
    pub dt: i64,
    #[serde(default)]
    pub sys: Option<Sys>,
    /// Offset from UTC in seconds
    #[serde(default)]
    pub timezone: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub cod: Option<i64>,
}

impl WeatherSnapshot {
    /// The first reported condition, which the backend orders as primary
    pub fn primary_condition(&self) -> Option<&Condition> {
        self.weather.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

/// A weather condition entry (e.g. "Rain", "light rain")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// OpenWeatherMap condition code; absent from demo-mode payloads
    #[serde(default)]
    pub id: i64,
    pub main: String,
    pub description: String,
    pub icon: String,
}

/// Temperature, pressure and humidity readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// hPa
    pub pressure: i64,
    /// Percent
    pub humidity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sea_level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grnd_level: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    #[serde(default)]
    pub deg: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gust: Option<f64>,
}

/// Cloud cover percentage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clouds {
    pub all: i64,
}

/// Sunrise/sunset (unix seconds) and country code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sys {
    #[serde(default)]
    pub sunrise: Option<i64>,
    #[serde(default)]
    pub sunset: Option<i64>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Five-day forecast in three-hour steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub list: Vec<ForecastItem>,
    #[serde(default)]
    pub city: Option<ForecastCity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastItem {
    pub dt: i64,
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<Condition>,
    pub wind: Wind,
    pub dt_txt: String,
    /// Probability of precipitation (0-1)
    #[serde(default)]
    pub pop: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCity {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub coord: Option<Coord>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub timezone: Option<i64>,
}

/// A geocoding match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl GeoLocation {
    /// "Name, State, Country" with absent parts skipped
    pub fn display_name(&self) -> String {
        [Some(self.name.as_str()), self.state.as_deref(), self.country.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A location saved on the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}
