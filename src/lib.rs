//! wxcache library
//!
//! Current-weather lookups through a read-through cache that falls back to
//! stale data when the backend is unreachable, plus the backend client,
//! local favorites and CLI plumbing used by the `wxcache` binary.

pub mod cache;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod data;
pub mod favorites;

pub use cache::{CacheLookup, FileStore, MemoryStore, Source, WeatherCache};
pub use data::{ApiClient, FetchError, Units, WeatherFetcher, WeatherSnapshot};
