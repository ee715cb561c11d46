//! Cache entry types and the storage seam behind the weather cache

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long a cache entry is considered fresh
pub const CACHE_TTL_MINUTES: i64 = 30;

/// Default TTL as a chrono duration
pub fn default_ttl() -> Duration {
    Duration::minutes(CACHE_TTL_MINUTES)
}

/// Identity of a cache entry, derived from a coordinate pair
///
/// The raw `f64` values are joined by an underscore with no rounding, so two
/// lookups share an entry only when their coordinates are bit-identical.
/// `f64`'s `Display` is the shortest round-tripping form and does not depend
/// on locale. Units are not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds the key for a latitude/longitude pair
    pub fn from_coords(lat: f64, lon: f64) -> Self {
        Self(format!("{}_{}", lat, lon))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single cached weather snapshot
///
/// Entries are replaced wholesale on every successful fetch and never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unique key for this entry
    pub key: CacheKey,
    /// Serialized weather snapshot (JSON)
    pub payload: String,
    /// Location name reported by the backend
    pub location_name: String,
    /// Latitude the entry was fetched for
    pub latitude: f64,
    /// Longitude the entry was fetched for
    pub longitude: f64,
    /// When the data was cached
    pub cached_at: DateTime<Utc>,
    /// When the cache entry expires
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry cached at `cached_at` that expires `ttl` later
    ///
    /// A non-positive `ttl` is raised to one millisecond so that
    /// `expires_at > cached_at` always holds.
    pub fn new(
        key: CacheKey,
        payload: String,
        location_name: impl Into<String>,
        (latitude, longitude): (f64, f64),
        cached_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let ttl = ttl.max(Duration::milliseconds(1));
        Self {
            key,
            payload,
            location_name: location_name.into(),
            latitude,
            longitude,
            cached_at,
            expires_at: cached_at + ttl,
        }
    }

    /// Whether the entry is still fresh at `now` (the expiry instant itself counts as fresh)
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// Errors raised by a store while writing or deleting
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be serialized
    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-value storage for cache entries
///
/// Implementations serialize conflicting reads and writes for a key. Reads
/// never fail: an entry that cannot be read is reported as absent.
pub trait CacheStore: Send + Sync {
    /// Returns the entry for `key`, if one exists and is readable
    fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Inserts `entry`, replacing any prior entry with the same key
    fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError>;

    /// Deletes every entry whose `expires_at` is strictly before `now`
    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Deletes every entry
    fn delete_all(&self) -> Result<usize, StoreError>;
}

impl<S: CacheStore + ?Sized> CacheStore for &S {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        (**self).get(key)
    }

    fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError> {
        (**self).upsert(entry)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        (**self).delete_expired(now)
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        (**self).delete_all()
    }
}

impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        (**self).get(key)
    }

    fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError> {
        (**self).upsert(entry)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        (**self).delete_expired(now)
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        (**self).delete_all()
    }
}

/// In-memory store backed by a hash map
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError> {
        self.entries.write().insert(entry.key.clone(), entry);
        Ok(())
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at >= now);
        Ok(before - entries.len())
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let mut entries = self.entries.write();
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}
