//! Cache module for current-weather lookups
//!
//! [`WeatherCache`] implements the read-through policy on top of any
//! [`CacheStore`]. Two stores are provided: [`MemoryStore`] and the
//! disk-backed [`FileStore`], which persists entries as JSON files so that
//! stale data survives restarts and can stand in when the backend is down.

mod file_store;
mod store;
mod weather_cache;

pub use file_store::FileStore;
pub use store::{
    default_ttl, CacheEntry, CacheKey, CacheStore, MemoryStore, StoreError, CACHE_TTL_MINUTES,
};
pub use weather_cache::{CacheLookup, Source, WeatherCache};
