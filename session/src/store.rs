//! Local key-value preferences.
//!
//! The session keeps one value here: the JSON of the card the user last
//! issued or registered. `MemoryStore` lives as long as the process;
//! `FileStore` keeps a JSON object on disk.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("preference file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("preference encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removing a key that is not present succeeds.
    fn clear(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

/// Preferences kept as a flat JSON object in a single file.
///
/// The file and its parent directories are created on first write. Writes go
/// to a sibling temp file which is then renamed into place, so a crash
/// mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(&self.path);
        fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// `prefs.json` -> `prefs.json.tmp`, so stores on sibling files never collide.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_set_get_clear() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        store.clear("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        store.clear("k").unwrap();
    }

    #[test]
    fn file_store_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("prefs.json"));
        assert_eq!(store.get("selectedCard").unwrap(), None);
        store.clear("selectedCard").unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn file_store_creates_parents_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        FileStore::new(&path).set("selectedCard", "{\"id\":1}").unwrap();
        FileStore::new(&path).set("theme", "dark").unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get("selectedCard").unwrap().as_deref(),
            Some("{\"id\":1}")
        );
        assert_eq!(reopened.get("theme").unwrap().as_deref(), Some("dark"));

        reopened.clear("selectedCard").unwrap();
        assert_eq!(FileStore::new(&path).get("selectedCard").unwrap(), None);
        assert_eq!(FileStore::new(&path).get("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn temp_file_keeps_the_full_name() {
        assert_eq!(
            temp_path(Path::new("/tmp/prefs.json")),
            PathBuf::from("/tmp/prefs.json.tmp")
        );
        assert_ne!(
            temp_path(Path::new("prefs.json")),
            temp_path(Path::new("prefs.yaml"))
        );
    }

    #[test]
    fn sibling_stores_do_not_clobber_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let json = FileStore::new(dir.path().join("prefs.json"));
        let yaml = FileStore::new(dir.path().join("prefs.yaml"));

        json.set("k", "from-json").unwrap();
        yaml.set("k", "from-yaml").unwrap();

        assert_eq!(json.get("k").unwrap().as_deref(), Some("from-json"));
        assert_eq!(yaml.get("k").unwrap().as_deref(), Some("from-yaml"));
        assert!(!dir.path().join("prefs.tmp").exists());
        assert!(!dir.path().join("prefs.json.tmp").exists());
    }

    #[test]
    fn file_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.get("k"), Err(StoreError::Json(_))));
    }
}
