//! Persistence of installed-feature flags.
//!
//! The installer never owns global settings. It loads the flags through a
//! [`FeatureStore`] before a run and saves them once at the end.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Installed flag per feature id.
pub type InstalledFlags = BTreeMap<String, bool>;

/// Errors raised by a [`FeatureStore`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("Cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid feature store {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load/save port for installed-feature flags.
pub trait FeatureStore: Send + Sync {
    fn load(&self) -> Result<InstalledFlags, StoreError>;

    fn save(&self, flags: &InstalledFlags) -> Result<(), StoreError>;
}

/// [`FeatureStore`] backed by a JSON object on disk.
///
/// A missing file loads as an empty map.
///
/// # Example
///
/// ```rust,no_run
/// use feature_installer::{FeatureStore, JsonFeatureStore};
///
/// let store = JsonFeatureStore::new("/home/me/.app/features.json");
/// let mut flags = store.load().unwrap_or_default();
/// flags.insert("julius".to_string(), true);
/// store.save(&flags).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct JsonFeatureStore {
    path: PathBuf,
}

impl JsonFeatureStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl FeatureStore for JsonFeatureStore {
    fn load(&self) -> Result<InstalledFlags, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(InstalledFlags::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, flags: &InstalledFlags) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let text = serde_json::to_string_pretty(flags).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, text).map_err(|e| self.io_error(e))
    }
}

/// In-memory [`FeatureStore`], mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryFeatureStore {
    flags: Mutex<InstalledFlags>,
}

impl MemoryFeatureStore {
    pub fn new(flags: InstalledFlags) -> Self {
        Self {
            flags: Mutex::new(flags),
        }
    }

    /// Copy of the stored flags.
    pub fn flags(&self) -> InstalledFlags {
        self.flags.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

impl FeatureStore for MemoryFeatureStore {
    fn load(&self) -> Result<InstalledFlags, StoreError> {
        Ok(self.flags())
    }

    fn save(&self, flags: &InstalledFlags) -> Result<(), StoreError> {
        if let Ok(mut stored) = self.flags.lock() {
            *stored = flags.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFeatureStore::new(dir.path().join("features.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_json_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFeatureStore::new(dir.path().join("nested").join("features.json"));

        let mut flags = InstalledFlags::new();
        flags.insert("julius".to_string(), true);
        flags.insert("video".to_string(), false);
        store.save(&flags).unwrap();

        assert_eq!(store.load().unwrap(), flags);
    }

    #[test]
    fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.json");
        std::fs::write(&path, "not json").unwrap();
        let store = JsonFeatureStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Format { .. })));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryFeatureStore::default();
        let mut flags = InstalledFlags::new();
        flags.insert("sox".to_string(), true);
        store.save(&flags).unwrap();
        assert_eq!(store.load().unwrap(), flags);
    }
}
