//! Local favorite locations
//!
//! Favorites live in a single JSON file in the platform data directory
//! (`~/.local/share/wxcache/favorites.json` on Linux). At most one favorite is
//! the default location.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// File name of the favorites list inside the data directory
pub const FAVORITES_FILE: &str = "favorites.json";

/// A saved favorite location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: u32,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    pub added_at: DateTime<Utc>,
}

/// Fields supplied when adding a favorite
#[derive(Debug, Clone, PartialEq)]
pub struct NewFavorite {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country: Option<String>,
    pub state: Option<String>,
    pub is_default: bool,
}

/// Errors that can occur when changing favorites
#[derive(Debug, Error)]
pub enum FavoritesError {
    /// Reading or writing the favorites file failed
    #[error("Favorites I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The favorites file is not valid JSON
    #[error("Favorites file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// No favorite has the given id
    #[error("No favorite with id {0}")]
    NotFound(u32),
}

/// Persistent list of favorite locations
#[derive(Debug)]
pub struct FavoritesStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FavoritesStore {
    /// Creates a store in the platform data directory
    ///
    /// Uses `directories::ProjectDirs`, so the file lands in
    /// `~/.local/share/wxcache/` on Linux and the platform equivalent elsewhere.
    ///
    /// # Returns
    /// `None` if the data directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "wxcache")?;
        Some(Self::in_dir(project_dirs.data_dir()))
    }

    /// Creates a store whose file lives in `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::with_path(dir.join(FAVORITES_FILE))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file; a missing file is an empty list
    fn load(&self) -> Result<Vec<Favorite>, FavoritesError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the file through a temporary sibling and a rename
    fn save(&self, favorites: &[Favorite]) -> Result<(), FavoritesError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(favorites)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Returns favorites with the default first, then by name
    ///
    /// An unreadable file is reported and treated as empty.
    pub fn list(&self) -> Vec<Favorite> {
        let mut favorites = match self.load() {
            Ok(favorites) => favorites,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable favorites");
                Vec::new()
            }
        };
        favorites.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then_with(|| a.name.cmp(&b.name))
        });
        favorites
    }

    /// Returns the default favorite, if one is set
    pub fn default_location(&self) -> Option<Favorite> {
        self.list().into_iter().find(|f| f.is_default)
    }

    /// Adds a favorite and returns it with its assigned id
    ///
    /// Ids are one more than the largest id in use. Adding a default favorite
    /// clears the previous default.
    ///
    /// # Arguments
    /// * `new` - Name, coordinates and default flag of the location
    ///
    /// # Returns
    /// The stored favorite, or an error if the file could not be read or written.
    /// A corrupt file is never overwritten.
    pub fn add(&self, new: NewFavorite) -> Result<Favorite, FavoritesError> {
        let _guard = self.lock.lock();
        let mut favorites = self.load()?;

        if new.is_default {
            for favorite in &mut favorites {
                favorite.is_default = false;
            }
        }

        let id = favorites.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        let favorite = Favorite {
            id,
            name: new.name,
            latitude: new.latitude,
            longitude: new.longitude,
            country: new.country,
            state: new.state,
            is_default: new.is_default,
            added_at: Utc::now(),
        };
        favorites.push(favorite.clone());
        self.save(&favorites)?;
        Ok(favorite)
    }

    /// Removes a favorite; returns whether one was removed
    pub fn remove(&self, id: u32) -> Result<bool, FavoritesError> {
        let _guard = self.lock.lock();
        let mut favorites = self.load()?;
        let before = favorites.len();
        favorites.retain(|f| f.id != id);
        if favorites.len() == before {
            return Ok(false);
        }
        self.save(&favorites)?;
        Ok(true)
    }

    /// Makes `id` the only default favorite
    pub fn set_default(&self, id: u32) -> Result<(), FavoritesError> {
        let _guard = self.lock.lock();
        let mut favorites = self.load()?;
        if !favorites.iter().any(|f| f.id == id) {
            return Err(FavoritesError::NotFound(id));
        }
        for favorite in &mut favorites {
            favorite.is_default = favorite.id == id;
        }
        self.save(&favorites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FavoritesStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FavoritesStore::in_dir(temp_dir.path());
        (store, temp_dir)
    }

    fn new_favorite(name: &str, is_default: bool) -> NewFavorite {
        NewFavorite {
            name: name.to_string(),
            latitude: 10.0,
            longitude: 20.0,
            country: None,
            state: None,
            is_default,
        }
    }

    #[test]
    fn test_list_is_empty_without_file() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.list().is_empty());
        assert!(store.default_location().is_none());
    }

    #[test]
    fn test_add_assigns_increasing_ids() {
        let (store, _temp_dir) = create_test_store();

        let a = store.add(new_favorite("Oslo", false)).unwrap();
        let b = store.add(new_favorite("Bergen", false)).unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(store.path().exists());
    }

    #[test]
    fn test_list_orders_default_first_then_by_name() {
        let (store, _temp_dir) = create_test_store();
        store.add(new_favorite("Zurich", false)).unwrap();
        store.add(new_favorite("Madrid", true)).unwrap();
        store.add(new_favorite("Athens", false)).unwrap();

        let names: Vec<_> = store.list().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["Madrid", "Athens", "Zurich"]);
    }

    #[test]
    fn test_adding_default_clears_previous_default() {
        let (store, _temp_dir) = create_test_store();
        store.add(new_favorite("Home", true)).unwrap();
        store.add(new_favorite("Work", true)).unwrap();

        let defaults: Vec<_> = store.list().into_iter().filter(|f| f.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].name, "Work");
    }

    #[test]
    fn test_set_default_moves_flag() {
        let (store, _temp_dir) = create_test_store();
        let home = store.add(new_favorite("Home", true)).unwrap();
        let work = store.add(new_favorite("Work", false)).unwrap();

        store.set_default(work.id).unwrap();

        assert_eq!(store.default_location().unwrap().id, work.id);
        let home_now = store.list().into_iter().find(|f| f.id == home.id).unwrap();
        assert!(!home_now.is_default);
    }

    #[test]
    fn test_set_default_unknown_id_fails() {
        let (store, _temp_dir) = create_test_store();
        store.add(new_favorite("Home", false)).unwrap();

        let err = store.set_default(42).unwrap_err();
        assert!(matches!(err, FavoritesError::NotFound(42)));
    }

    #[test]
    fn test_remove() {
        let (store, _temp_dir) = create_test_store();
        let home = store.add(new_favorite("Home", false)).unwrap();

        assert!(store.remove(home.id).unwrap());
        assert!(!store.remove(home.id).unwrap());
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_corrupt_file_lists_empty_but_refuses_writes() {
        let (store, _temp_dir) = create_test_store();
        fs::write(store.path(), "[{broken").unwrap();

        assert!(store.list().is_empty());
        let err = store.add(new_favorite("Home", false)).unwrap_err();
        assert!(matches!(err, FavoritesError::Corrupt(_)));
    }

    #[test]
    fn test_save_replaces_file_without_leaving_temp_behind() {
        let (store, temp_dir) = create_test_store();
        // Leftover from an interrupted write
        fs::write(temp_dir.path().join("favorites.json.tmp"), "[{half").unwrap();

        store.add(new_favorite("Home", true)).unwrap();
        store.add(new_favorite("Work", false)).unwrap();

        let files: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec![FAVORITES_FILE.to_string()]);
        assert_eq!(store.list().len(), 2);
    }
}
