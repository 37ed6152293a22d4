//! JSON-file-backed state store for local persistence scope

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use parking_lot::RwLock;
use tracing::{debug, warn};
use pager_core::error::Result as PagerResult;
use pager_core::persistence::StateStore;

use crate::DataError;

/// Keys and their JSON documents, kept in one file.
///
/// The whole file is rewritten on every change through a temporary sibling
/// file, so a crash leaves either the old or the new contents.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`; a missing or unreadable file starts empty
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring malformed state file {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened state file {} with {} keys", path.display(), entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), DataError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> PagerResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> PagerResult<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value);
        self.flush(&entries)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> PagerResult<()> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use pager_core::persistence::{PersistedState, StatePersistence, StorageKey, StorageScope};

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("lists.json");

        let store = FileStore::open(&path).unwrap();
        store.set("local:list:a", "{}".to_string()).unwrap();
        store.set("local:list:b", "[]".to_string()).unwrap();
        store.remove("local:list:a").unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.keys(), vec!["local:list:b".to_string()]);
        assert_eq!(reopened.get("local:list:b").unwrap(), Some("[]".to_string()));
    }

    #[test]
    fn test_malformed_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lists.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.keys().is_empty());
        store.set("k", "v".to_string()).unwrap();
        assert_eq!(FileStore::open(&path).unwrap().keys(), vec!["k".to_string()]);
    }

    #[test]
    fn test_backs_state_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lists.json");
        let key = StorageKey::new("orders", "table", StorageScope::Local);

        let persistence = StatePersistence::new(key.clone(), Arc::new(FileStore::open(&path).unwrap()));
        persistence
            .save(&PersistedState { pagination: 4, ..PersistedState::default() })
            .unwrap();

        let restored = StatePersistence::new(key, Arc::new(FileStore::open(&path).unwrap())).restore();
        assert_eq!(restored.map(|s| s.pagination), Some(4));
    }
}
