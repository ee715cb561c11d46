//! Disk-backed cache store
//!
//! Persists each cache entry as its own JSON file in an XDG-compliant cache
//! directory. Files are named after the entry's key, or after a SHA-256 digest
//! of it when the key is too long to be a file name.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::store::{CacheEntry, CacheKey, CacheStore, StoreError};

/// Longest key used verbatim as a file stem; most filesystems cap names at 255 bytes
const MAX_STEM_LEN: usize = 128;

/// Stores cache entries as JSON files on disk
///
/// The store uses `~/.cache/wxcache/` on Linux by default. Writes go through a
/// temporary file and a rename, so a concurrent reader sees either the old
/// entry or the new one.
#[derive(Debug)]
pub struct FileStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
    /// Serializes writers
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Creates a FileStore in the platform cache directory
    ///
    /// Uses `directories::ProjectDirs` to find the appropriate cache location:
    /// - Linux: `~/.cache/wxcache/`
    /// - macOS: `~/Library/Caches/wxcache/`
    /// - Windows: `C:\Users\<user>\AppData\Local\wxcache\cache\`
    ///
    /// # Returns
    /// `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "wxcache")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    /// Creates a FileStore rooted at a custom directory
    ///
    /// The directory is created on the first write, not here.
    ///
    /// # Arguments
    /// * `cache_dir` - Directory that will hold one JSON file per entry
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the cache file for the given key
    ///
    /// Keys longer than [`MAX_STEM_LEN`] (tiny coordinates print every
    /// decimal digit) are stored under the hex digest of the key instead.
    fn cache_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(format!("{}.json", file_stem(key)))
    }

    /// Reads and parses a single entry file
    fn read_entry(path: &Path) -> Option<CacheEntry> {
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Lists the entry files in the cache directory
    ///
    /// A missing directory yields no files.
    fn entry_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let dir = match fs::read_dir(&self.cache_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for item in dir {
            let path = item?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }
}

fn file_stem(key: &CacheKey) -> String {
    let key = key.as_str();
    if key.len() <= MAX_STEM_LEN {
        return key.to_string();
    }
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

impl CacheStore for FileStore {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = Self::read_entry(&self.cache_path(key))?;
        // A file renamed or edited by hand must not answer for another key
        (entry.key == *key).then_some(entry)
    }

    fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&entry)?;
        let path = self.cache_path(&entry.key);
        let tmp = path.with_extension("json.tmp");

        let _guard = self.write_lock.lock();
        fs::create_dir_all(&self.cache_dir)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        debug!(key = %entry.key, path = %path.display(), "wrote cache entry");
        Ok(())
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock();
        let mut removed = 0;
        for path in self.entry_files()? {
            // Unreadable files are left alone; they read as absent anyway
            let Some(entry) = Self::read_entry(&path) else {
                continue;
            };
            if entry.expires_at < now {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock();
        let files = self.entry_files()?;
        for path in &files {
            fs::remove_file(path)?;
        }
        Ok(files.len())
    }
}
