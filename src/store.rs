//! Durable storage for the last selected conversation.
//!
//! This module provides:
//! - A small key/value seam with file-backed and in-memory implementations
//! - `SelectionSlot`, the single fixed key the controller reads and writes

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const LAST_CONVERSATION_KEY: &str = "llm-council:last-conversation";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode stored value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// ============================================
// File Backend (native platforms)
// ============================================

/// One JSON file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted in the platform's local data directory.
    pub fn in_data_dir() -> Self {
        Self::new(default_state_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

pub fn default_state_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("council").join("state");
    }

    PathBuf::from("cache").join("state")
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let raw = fs::read_to_string(self.path_for(key)).ok()?;
        match serde_json::from_str::<String>(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, %err, "ignoring unreadable stored value");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        let encoded = serde_json::to_string(value)?;
        fs::write(&path, encoded).map_err(|source| StoreError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

// ============================================
// In-memory Backend
// ============================================

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// The durable "last active conversation" slot.
#[derive(Clone)]
pub struct SelectionSlot {
    store: Arc<dyn KeyValueStore>,
}

impl SelectionSlot {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Option<String> {
        self.store
            .get(LAST_CONVERSATION_KEY)
            .filter(|id| !id.is_empty())
    }

    /// Writes the selection back; `None` clears the slot.
    pub fn save(&self, selected: Option<&str>) -> Result<(), StoreError> {
        match selected {
            Some(id) => self.store.set(LAST_CONVERSATION_KEY, id),
            None => self.store.remove(LAST_CONVERSATION_KEY),
        }
    }
}

/// Sanitize storage key for filesystem use
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("todos"), "todos");
        assert_eq!(
            sanitize_key(LAST_CONVERSATION_KEY),
            "llm-council_last-conversation"
        );
        assert_eq!(sanitize_key(&"k".repeat(100)).len(), 64);
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a"), None);
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a"), Some("1".to_string()));
        store.remove("a").unwrap();
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn file_store_writes_one_file_per_key() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path().join("state"));
        store.set(LAST_CONVERSATION_KEY, "c1").unwrap();

        let file = store.dir().join("llm-council_last-conversation.json");
        assert_eq!(fs::read_to_string(&file).unwrap(), "\"c1\"");
        assert_eq!(store.get(LAST_CONVERSATION_KEY).as_deref(), Some("c1"));

        store.remove(LAST_CONVERSATION_KEY).unwrap();
        store.remove(LAST_CONVERSATION_KEY).unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn slot_clears_on_empty_selection() {
        let slot = SelectionSlot::new(Arc::new(MemoryStore::new()));
        slot.save(Some("c1")).unwrap();
        assert_eq!(slot.load(), Some("c1".to_string()));
        slot.save(None).unwrap();
        assert_eq!(slot.load(), None);
    }
}
