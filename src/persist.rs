//! Key-value persistence collaborator.
//!
//! Components persist JSON-serializable values under string keys through the
//! [`KvStore`] trait. The file-backed implementation keeps one JSON document
//! per key and writes atomically (temp file → fsync → rename) so a crash
//! mid-write never leaves a torn value behind.
//!
//! Loading is tolerant by policy: absent or malformed values are replaced by
//! defaults and never propagate a parse failure to the caller.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::PersistenceError;

/// String-keyed store of JSON values.
pub trait KvStore: Send + Sync {
    /// Read the value at `key`; `Ok(None)` if absent.
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, PersistenceError>;

    /// Write the value at `key`, replacing any previous value.
    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), PersistenceError>;
}

/// Load a typed value from the store, substituting the default on absent or
/// malformed data. Read and parse failures are logged, never returned.
pub fn load_or_default<T>(store: &dyn KvStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match store.get(key) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(key, error = %e, "discarding malformed persisted value");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            warn!(key, error = %e, "failed to load persisted value, using default");
            T::default()
        }
    }
}

/// Serialize and write a typed value, logging and swallowing any failure.
///
/// Write failures must not fail the triggering operation; the in-memory
/// state stays authoritative for the rest of the process lifetime.
pub fn save_logged<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) {
    let json = match serde_json::to_value(value) {
        Ok(json) => json,
        Err(e) => {
            warn!(key, error = %e, "failed to serialize value for persistence");
            return;
        }
    };
    if let Err(e) = store.set(key, &json) {
        warn!(key, error = %e, "failed to persist value");
    }
}

/// File-backed store: one `<key>.json` document per key under a state
/// directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: Utf8PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Utf8PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, PersistenceError> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PersistenceError::Read {
                    key: key.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| PersistenceError::Read {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), PersistenceError> {
        let path = self.path_for(key);
        let content =
            serde_json::to_string_pretty(value).map_err(|e| PersistenceError::Serialize {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        write_file_atomic(&path, &content).map_err(|e| PersistenceError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Atomically write content to a file using temp file + fsync + rename.
///
/// The temp file is created in the target's directory so the final rename
/// stays on one filesystem.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut temp_file = NamedTempFile::new_in(temp_dir)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path.as_std_path()).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap());
        (dir, store)
    }

    #[test]
    fn get_absent_key_is_none() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn set_then_get_round_trips() {
        let (_dir, store) = temp_store();
        let value = json!({"theme": "dark"});
        store.set("theme", &value).unwrap();
        assert_eq!(store.get("theme").unwrap(), Some(value));
    }

    #[test]
    fn set_replaces_previous_value() {
        let (_dir, store) = temp_store();
        store.set("k", &json!(1)).unwrap();
        store.set("k", &json!(2)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!(2)));
    }

    #[test]
    fn malformed_file_reports_read_error() {
        let (dir, store) = temp_store();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        assert!(matches!(
            store.get("broken"),
            Err(PersistenceError::Read { .. })
        ));
    }

    #[test]
    fn load_or_default_swallows_malformed_data() {
        let (dir, store) = temp_store();
        fs::write(dir.path().join("runs.json"), "][").unwrap();
        let loaded: Vec<String> = load_or_default(&store, "runs");
        assert!(loaded.is_empty());
    }

    #[test]
    fn load_or_default_swallows_wrong_shape() {
        let (_dir, store) = temp_store();
        store.set("runs", &json!({"not": "a list"})).unwrap();
        let loaded: Vec<String> = load_or_default(&store, "runs");
        assert!(loaded.is_empty());
    }
}
