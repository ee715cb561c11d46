//! Executes parsed CLI commands
//!
//! Output goes to the supplied writer as plain text, or as JSON when the
//! configuration asks for it.

use std::error::Error;
use std::io::Write;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;

use crate::cache::{CacheLookup, CacheStore, FileStore, Source, WeatherCache};
use crate::cli::{CacheCommand, Command, FavoritesCommand, LocationArgs, SavedCommand};
use crate::config::Config;
use crate::data::{
    ApiClient, FetchError, Forecast, GeoLocation, SavedLocation, Units, WeatherSnapshot,
};
use crate::favorites::{Favorite, FavoritesStore, NewFavorite};

type CommandResult = Result<(), Box<dyn Error>>;

/// Runs one command against the configured backend and local stores
///
/// Only commands that talk to the backend build an HTTP client; favorites
/// management and cache maintenance work offline.
///
/// # Arguments
/// * `command` - Parsed subcommand
/// * `config` - Resolved backend URL, timeout and directories
/// * `out` - Destination for text or JSON output
pub async fn run<W: Write>(command: Command, config: &Config, out: &mut W) -> CommandResult {
    match command {
        Command::Current { coords, units } => {
            let cache = weather_cache(config, api_client(config)?);
            let found = cache.lookup(coords.lat, coords.lon, units).await?;
            if config.json {
                write_json(out, &CurrentView::from(&found))
            } else {
                write_snapshot(out, &found.snapshot, units)?;
                write_source(out, found.source, found.cached_at)
            }
        }
        Command::Forecast { coords, units } => {
            let forecast = api_client(config)?
                .forecast(coords.lat, coords.lon, units)
                .await?;
            if config.json {
                write_json(out, &forecast)
            } else {
                write_forecast(out, &forecast, units)
            }
        }
        Command::Search { query, limit } => {
            let results = api_client(config)?.search_city(&query, limit).await?;
            write_places(out, config, &results)
        }
        Command::Reverse { coords } => {
            let results = api_client(config)?
                .reverse_geocode(coords.lat, coords.lon)
                .await?;
            write_places(out, config, &results)
        }
        Command::Saved(saved) => run_saved(saved, &api_client(config)?, config, out).await,
        Command::Favorites(favorites) => run_favorites(favorites, config, out).await,
        Command::Cache(cache_command) => {
            let store = FileStore::with_dir(config.cache_dir.clone());
            let (action, removed) = match cache_command {
                CacheCommand::Evict => ("evicted", store.delete_expired(Utc::now())?),
                CacheCommand::Clear => ("cleared", store.delete_all()?),
            };
            if config.json {
                write_json(out, &serde_json::json!({ "action": action, "removed": removed }))
            } else {
                writeln!(out, "{} {} cache entries", capitalize(action), removed)?;
                Ok(())
            }
        }
        Command::Health => {
            let client = api_client(config)?;
            let health = client.health().await?;
            if config.json {
                write_json(out, &health)
            } else {
                writeln!(out, "{} at {}", health.status, client.base_url())?;
                Ok(())
            }
        }
    }
}

fn api_client(config: &Config) -> Result<ApiClient, FetchError> {
    ApiClient::new(&config.api_url, config.timeout)
}

fn weather_cache(config: &Config, client: ApiClient) -> WeatherCache<FileStore, ApiClient> {
    WeatherCache::new(FileStore::with_dir(config.cache_dir.clone()), client)
}

async fn run_saved<W: Write>(
    command: SavedCommand,
    client: &ApiClient,
    config: &Config,
    out: &mut W,
) -> CommandResult {
    match command {
        SavedCommand::List => {
            let locations = client.saved_locations().await?;
            if config.json {
                return write_json(out, &locations);
            }
            if locations.is_empty() {
                writeln!(out, "No saved locations")?;
            }
            for location in &locations {
                write_saved(out, location)?;
            }
            Ok(())
        }
        SavedCommand::Add(args) => {
            let saved = client.add_saved_location(&saved_from_args(None, args)).await?;
            write_saved_result(out, config, &saved)
        }
        SavedCommand::Update { id, location } => {
            let updated = client
                .update_saved_location(id, &saved_from_args(Some(id), location))
                .await?;
            write_saved_result(out, config, &updated)
        }
        SavedCommand::Delete { id } => {
            client.delete_saved_location(id).await?;
            if config.json {
                write_json(out, &serde_json::json!({ "deleted": id }))
            } else {
                writeln!(out, "Deleted saved location {}", id)?;
                Ok(())
            }
        }
    }
}

async fn run_favorites<W: Write>(
    command: FavoritesCommand,
    config: &Config,
    out: &mut W,
) -> CommandResult {
    let store = FavoritesStore::in_dir(&config.data_dir);

    match command {
        FavoritesCommand::List => {
            let favorites = store.list();
            if config.json {
                return write_json(out, &favorites);
            }
            if favorites.is_empty() {
                writeln!(out, "No favorites")?;
            }
            for favorite in &favorites {
                write_favorite(out, favorite)?;
            }
            Ok(())
        }
        FavoritesCommand::Add(args) => {
            let favorite = store.add(NewFavorite {
                name: args.name,
                latitude: args.coords.lat,
                longitude: args.coords.lon,
                country: args.country,
                state: args.state,
                is_default: args.default,
            })?;
            if config.json {
                write_json(out, &favorite)
            } else {
                write!(out, "Added ")?;
                write_favorite(out, &favorite)
            }
        }
        FavoritesCommand::Remove { id } => {
            let removed = store.remove(id)?;
            if config.json {
                return write_json(out, &serde_json::json!({ "removed": removed }));
            }
            if removed {
                writeln!(out, "Removed favorite {}", id)?;
            } else {
                writeln!(out, "No favorite with id {}", id)?;
            }
            Ok(())
        }
        FavoritesCommand::Default { id } => {
            store.set_default(id)?;
            if config.json {
                write_json(out, &serde_json::json!({ "default": id }))
            } else {
                writeln!(out, "Favorite {} is now the default", id)?;
                Ok(())
            }
        }
        FavoritesCommand::Weather { units } => {
            let favorites = store.list();
            let cache = weather_cache(config, api_client(config)?);
            let lookups = favorites
                .iter()
                .map(|favorite| cache.lookup(favorite.latitude, favorite.longitude, units));
            let results = join_all(lookups).await;

            if config.json {
                let views: Vec<_> = favorites
                    .iter()
                    .zip(&results)
                    .map(|(favorite, result)| FavoriteWeatherView {
                        favorite,
                        current: result.as_ref().ok().map(CurrentView::from),
                        error: result.as_ref().err().map(|e| e.to_string()),
                    })
                    .collect();
                return write_json(out, &views);
            }

            if favorites.is_empty() {
                writeln!(out, "No favorites")?;
            }
            for (favorite, result) in favorites.iter().zip(results) {
                writeln!(out, "== {}", favorite.name)?;
                match result {
                    Ok(found) => {
                        write_snapshot(out, &found.snapshot, units)?;
                        write_source(out, found.source, found.cached_at)?;
                    }
                    Err(e) => writeln!(out, "  unavailable: {}", e)?,
                }
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct CurrentView<'a> {
    source: Source,
    cached_at: DateTime<Utc>,
    weather: &'a WeatherSnapshot,
}

impl<'a> From<&'a CacheLookup> for CurrentView<'a> {
    fn from(found: &'a CacheLookup) -> Self {
        Self {
            source: found.source,
            cached_at: found.cached_at,
            weather: &found.snapshot,
        }
    }
}

#[derive(Serialize)]
struct FavoriteWeatherView<'a> {
    favorite: &'a Favorite,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<CurrentView<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn saved_from_args(id: Option<i64>, args: LocationArgs) -> SavedLocation {
    SavedLocation {
        id,
        name: args.name,
        latitude: args.coords.lat,
        longitude: args.coords.lon,
        country: args.country,
        state: args.state,
        is_default: args.default,
        created_at: None,
    }
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> CommandResult {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn write_snapshot<W: Write>(out: &mut W, snapshot: &WeatherSnapshot, units: Units) -> CommandResult {
    let symbol = units.temp_symbol();
    writeln!(
        out,
        "{} ({}, {})",
        snapshot.name, snapshot.coord.lat, snapshot.coord.lon
    )?;
    if let Some(condition) = snapshot.primary_condition() {
        writeln!(out, "  {}: {}", condition.main, condition.description)?;
    }
    writeln!(
        out,
        "  Temperature: {:.1}{} (feels like {:.1}{})",
        snapshot.main.temp, symbol, snapshot.main.feels_like, symbol
    )?;
    writeln!(
        out,
        "  Humidity: {}%  Pressure: {} hPa",
        snapshot.main.humidity, snapshot.main.pressure
    )?;
    writeln!(out, "  Wind: {:.1} {}", snapshot.wind.speed, units.speed_unit())?;
    Ok(())
}

fn write_source<W: Write>(out: &mut W, source: Source, cached_at: DateTime<Utc>) -> CommandResult {
    let stamp = cached_at.format("%Y-%m-%d %H:%M UTC");
    match source {
        Source::Fetched => {}
        Source::Fresh => writeln!(out, "  (cached {})", stamp)?,
        Source::Stale => writeln!(out, "  (stale: backend unavailable, cached {})", stamp)?,
    }
    Ok(())
}

fn write_forecast<W: Write>(out: &mut W, forecast: &Forecast, units: Units) -> CommandResult {
    if let Some(name) = forecast.city.as_ref().and_then(|c| c.name.as_deref()) {
        writeln!(out, "{}", name)?;
    }
    for item in &forecast.list {
        let condition = item.weather.first().map(|c| c.main.as_str()).unwrap_or("-");
        write!(
            out,
            "  {}  {:>6.1}{}  {}",
            item.dt_txt,
            item.main.temp,
            units.temp_symbol(),
            condition
        )?;
        if let Some(pop) = item.pop {
            write!(out, "  {:.0}% precip", pop * 100.0)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_places<W: Write>(out: &mut W, config: &Config, places: &[GeoLocation]) -> CommandResult {
    if config.json {
        return write_json(out, places);
    }
    if places.is_empty() {
        writeln!(out, "No matches")?;
    }
    for place in places {
        writeln!(out, "{}  ({}, {})", place.display_name(), place.lat, place.lon)?;
    }
    Ok(())
}

fn write_saved<W: Write>(out: &mut W, location: &SavedLocation) -> CommandResult {
    let id = location.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
    let marker = if location.is_default { " [default]" } else { "" };
    writeln!(
        out,
        "{:>4}  {}{}  ({}, {})",
        id, location.name, marker, location.latitude, location.longitude
    )?;
    Ok(())
}

fn write_saved_result<W: Write>(out: &mut W, config: &Config, location: &SavedLocation) -> CommandResult {
    if config.json {
        write_json(out, location)
    } else {
        write_saved(out, location)
    }
}

fn write_favorite<W: Write>(out: &mut W, favorite: &Favorite) -> CommandResult {
    let marker = if favorite.is_default { " [default]" } else { "" };
    writeln!(
        out,
        "{:>4}  {}{}  ({}, {})",
        favorite.id, favorite.name, marker, favorite.latitude, favorite.longitude
    )?;
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
