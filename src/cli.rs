//! Command-line interface parsing for wxcache
//!
//! Global flags select the backend and local directories; subcommands map
//! onto the weather cache, the backend client and the favorites store.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use thiserror::Error;

use crate::data::client::{DEFAULT_API_URL, DEFAULT_GEOCODE_LIMIT};
use crate::data::Units;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// Not a number
    #[error("Invalid coordinate: '{0}' is not a number")]
    NotANumber(String),

    /// Latitude outside [-90, 90]
    #[error("Invalid latitude: {0}. Latitude must be between -90 and 90")]
    LatitudeOutOfRange(f64),

    /// Longitude outside [-180, 180]
    #[error("Invalid longitude: {0}. Longitude must be between -180 and 180")]
    LongitudeOutOfRange(f64),
}

/// wxcache - Weather lookups with an offline-tolerant local cache
#[derive(Parser, Debug)]
#[command(name = "wxcache")]
#[command(about = "Weather lookups through a local cache with stale fallback")]
#[command(version)]
pub struct Cli {
    /// Base URL of the weather backend
    #[arg(long, env = "WXCACHE_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Directory for cached weather entries
    #[arg(long, env = "WXCACHE_CACHE_DIR", value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Directory for local favorites
    #[arg(long, env = "WXCACHE_DATA_DIR", value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Request timeout in seconds (at least 1)
    #[arg(
        long,
        env = "WXCACHE_TIMEOUT",
        value_name = "SECS",
        default_value_t = 15,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub timeout: u64,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// A coordinate pair
#[derive(Args, Debug, Clone, Copy)]
pub struct Coords {
    /// Latitude in decimal degrees
    #[arg(long, value_parser = parse_latitude, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, value_parser = parse_longitude, allow_negative_numbers = true)]
    pub lon: f64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Current weather, served from the local cache when fresh
    Current {
        #[command(flatten)]
        coords: Coords,

        #[arg(long, value_enum, default_value_t = Units::Metric)]
        units: Units,
    },

    /// Five-day forecast
    Forecast {
        #[command(flatten)]
        coords: Coords,

        #[arg(long, value_enum, default_value_t = Units::Metric)]
        units: Units,
    },

    /// Search for a city by name
    Search {
        query: String,

        /// Maximum number of matches
        #[arg(long, default_value_t = DEFAULT_GEOCODE_LIMIT)]
        limit: u32,
    },

    /// Name the place at a coordinate pair
    Reverse {
        #[command(flatten)]
        coords: Coords,
    },

    /// Locations saved on the backend
    #[command(subcommand)]
    Saved(SavedCommand),

    /// Local favorite locations
    #[command(subcommand)]
    Favorites(FavoritesCommand),

    /// Manage the local weather cache
    #[command(subcommand)]
    Cache(CacheCommand),

    /// Check that the backend is reachable
    Health,
}

/// Fields describing a location to save
#[derive(Args, Debug, Clone)]
pub struct LocationArgs {
    /// Display name
    #[arg(long)]
    pub name: String,

    #[command(flatten)]
    pub coords: Coords,

    #[arg(long)]
    pub country: Option<String>,

    #[arg(long)]
    pub state: Option<String>,

    /// Make this the default location
    #[arg(long)]
    pub default: bool,
}

#[derive(Subcommand, Debug)]
pub enum SavedCommand {
    /// List saved locations
    List,
    /// Save a location
    Add(LocationArgs),
    /// Replace a saved location
    Update {
        id: i64,

        #[command(flatten)]
        location: LocationArgs,
    },
    /// Delete a saved location
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum FavoritesCommand {
    /// List favorites, default first
    List,
    /// Add a favorite
    Add(LocationArgs),
    /// Remove a favorite
    Remove { id: u32 },
    /// Make a favorite the default
    Default { id: u32 },
    /// Current weather for every favorite
    Weather {
        #[arg(long, value_enum, default_value_t = Units::Metric)]
        units: Units,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Delete expired entries
    Evict,
    /// Delete every entry
    Clear,
}

fn parse_number(s: &str) -> Result<f64, CliError> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CliError::NotANumber(s.to_string()))
}

/// Parses a latitude argument, rejecting values outside [-90, 90]
pub fn parse_latitude(s: &str) -> Result<f64, CliError> {
    let lat = parse_number(s)?;
    if (-90.0..=90.0).contains(&lat) {
        Ok(lat)
    } else {
        Err(CliError::LatitudeOutOfRange(lat))
    }
}

/// Parses a longitude argument, rejecting values outside [-180, 180]
pub fn parse_longitude(s: &str) -> Result<f64, CliError> {
    let lon = parse_number(s)?;
    if (-180.0..=180.0).contains(&lon) {
        Ok(lon)
    } else {
        Err(CliError::LongitudeOutOfRange(lon))
    }
}
