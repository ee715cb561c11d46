//! Read-through cache for current-weather lookups
//!
//! Lookups prefer a fresh local entry, otherwise make one remote fetch and
//! write the result through to the store. When that fetch fails, whatever
//! entry was already stored for the key is returned, however old it is.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::store::{default_ttl, CacheEntry, CacheKey, CacheStore, StoreError};
use crate::clock::{Clock, SystemClock};
use crate::data::{FetchError, Units, WeatherFetcher, WeatherSnapshot};

/// Where a looked-up snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Unexpired cache entry, no remote call made
    Fresh,
    /// Fetched from the backend just now
    Fetched,
    /// Cache entry returned because the fetch failed
    Stale,
}

/// Result of [`WeatherCache::lookup`]
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub snapshot: WeatherSnapshot,
    pub source: Source,
    /// When the returned data was cached (the fetch time for `Fetched`)
    pub cached_at: DateTime<Utc>,
}

/// Cache-then-fetch-then-fallback policy over a [`CacheStore`]
///
/// Nothing is shared between instances; the store, fetcher and clock are all
/// supplied by the owner. Concurrent lookups for the same key are not
/// de-duplicated: each may fetch, and the last upsert wins.
pub struct WeatherCache<S, F, C = SystemClock> {
    store: S,
    fetcher: F,
    clock: C,
    ttl: Duration,
}

impl<S: CacheStore, F: WeatherFetcher> WeatherCache<S, F, SystemClock> {
    /// Creates a cache that reads wall-clock time
    pub fn new(store: S, fetcher: F) -> Self {
        Self::with_clock(store, fetcher, SystemClock)
    }
}

impl<S: CacheStore, F: WeatherFetcher, C: Clock> WeatherCache<S, F, C> {
    /// Creates a cache with an explicit time source
    pub fn with_clock(store: S, fetcher: F, clock: C) -> Self {
        Self {
            store,
            fetcher,
            clock,
            ttl: default_ttl(),
        }
    }

    /// Overrides the 30 minute freshness window
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns current weather for a coordinate pair
    ///
    /// Fresh and stale results are indistinguishable here; use [`lookup`]
    /// to learn which one was served.
    ///
    /// # Errors
    /// Returns the fetch error only when the fetch failed and no readable
    /// entry exists for the key.
    ///
    /// [`lookup`]: WeatherCache::lookup
    pub async fn get_current_weather(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        self.lookup(lat, lon, units).await.map(|found| found.snapshot)
    }

    /// Returns current weather along with where it came from
    ///
    /// # Errors
    /// Same as [`get_current_weather`](WeatherCache::get_current_weather).
    pub async fn lookup(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<CacheLookup, FetchError> {
        let key = CacheKey::from_coords(lat, lon);
        let cached = self.store.get(&key);

        if let Some(entry) = &cached {
            if entry.is_fresh_at(self.clock.now()) {
                if let Some(snapshot) = decode_payload(entry) {
                    debug!(%key, "weather cache hit");
                    return Ok(CacheLookup {
                        snapshot,
                        source: Source::Fresh,
                        cached_at: entry.cached_at,
                    });
                }
            }
        }

        match self.fetcher.fetch_current(lat, lon, units).await {
            Ok(snapshot) => {
                let cached_at = self.clock.now();
                self.write_through(key, &snapshot, (lat, lon), cached_at);
                Ok(CacheLookup {
                    snapshot,
                    source: Source::Fetched,
                    cached_at,
                })
            }
            Err(err) => {
                let fallback = cached.and_then(|entry| {
                    decode_payload(&entry).map(|snapshot| (entry.cached_at, snapshot))
                });
                match fallback {
                    Some((cached_at, snapshot)) => {
                        warn!(%key, error = %err, "fetch failed, serving cached weather");
                        Ok(CacheLookup {
                            snapshot,
                            source: Source::Stale,
                            cached_at,
                        })
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Removes entries that expired before the current time
    ///
    /// # Errors
    /// Returns the store's error if entries could not be deleted.
    pub fn evict_expired(&self) -> Result<usize, StoreError> {
        self.evict_expired_at(self.clock.now())
    }

    /// Removes entries whose expiry is strictly before `now`
    ///
    /// # Errors
    /// Returns the store's error if entries could not be deleted.
    pub fn evict_expired_at(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let removed = self.store.delete_expired(now)?;
        debug!(removed, "evicted expired weather entries");
        Ok(removed)
    }

    /// Removes every entry
    ///
    /// # Errors
    /// Returns the store's error if entries could not be deleted.
    pub fn clear_all(&self) -> Result<usize, StoreError> {
        self.store.delete_all()
    }

    /// Stores a fetched snapshot; failures are logged, never returned
    fn write_through(
        &self,
        key: CacheKey,
        snapshot: &WeatherSnapshot,
        coords: (f64, f64),
        cached_at: DateTime<Utc>,
    ) {
        let payload = match serde_json::to_string(snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%key, error = %err, "could not serialize weather for cache");
                return;
            }
        };

        let entry = CacheEntry::new(key, payload, &snapshot.name, coords, cached_at, self.ttl);
        if let Err(err) = self.store.upsert(entry) {
            warn!(error = %err, "could not write weather cache entry");
        }
    }
}

/// Parses an entry's payload; a corrupt payload is treated as absent
fn decode_payload(entry: &CacheEntry) -> Option<WeatherSnapshot> {
    match serde_json::from_str(&entry.payload) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            debug!(key = %entry.key, error = %err, "ignoring unreadable cache payload");
            None
        }
    }
}
