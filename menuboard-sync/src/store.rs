//! Local persistent store
//!
//! Wraps a [`KeyValueStorage`] behind safe get/set/remove. The first
//! backend failure permanently downgrades the store to memory-only for the
//! rest of the session and logs a single warning; callers never see the
//! error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use menuboard_common::defaults::default_collection;
use menuboard_common::{normalize, RestaurantCollection};
use tracing::{debug, warn};

use crate::storage::{KeyValueStorage, StorageError, StorageEvents};

pub struct LocalStore {
    backend: Arc<dyn KeyValueStorage>,
    key: String,
    enabled: AtomicBool,
    /// Last serialization written while memory-only
    memory: Mutex<Option<String>>,
}

impl LocalStore {
    pub fn new(backend: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            enabled: AtomicBool::new(true),
            memory: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// False once the backend has failed and the store is memory-only
    pub fn is_persistent(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Load the document, falling back to defaults when absent or corrupt
    pub fn load(&self) -> RestaurantCollection {
        let Some(raw) = self.safe_get().or_else(|| self.memory_copy()) else {
            debug!(key = %self.key, "No stored document, starting from defaults");
            return default_collection();
        };

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => normalize(&value),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Unable to parse stored menu data, falling back to defaults");
                self.safe_remove();
                self.set_memory(None);
                default_collection()
            }
        }
    }

    /// Persist a document; `false` when only the in-memory copy was kept
    pub fn save(&self, doc: &RestaurantCollection) -> bool {
        match serde_json::to_string(doc) {
            Ok(serialized) => self.save_serialized(&serialized),
            Err(e) => {
                warn!(error = %e, "Unable to serialize document for storage");
                false
            }
        }
    }

    /// Persist an already serialized document
    pub fn save_serialized(&self, serialized: &str) -> bool {
        if self.safe_set(serialized) {
            true
        } else {
            self.set_memory(Some(serialized.to_string()));
            false
        }
    }

    /// Drop the stored record
    pub fn clear(&self) {
        self.safe_remove();
        self.set_memory(None);
    }

    /// Change notifications from other contexts sharing the backend
    pub fn watch(&self) -> Option<StorageEvents> {
        self.backend.watch()
    }

    fn disable(&self, error: &StorageError) {
        // swap so only the first failure logs
        if self.enabled.swap(false, Ordering::SeqCst) {
            warn!(error = %error, "Local storage is unavailable; using in-memory data instead");
        }
    }

    fn safe_get(&self) -> Option<String> {
        if !self.is_persistent() {
            return None;
        }
        match self.backend.get(&self.key) {
            Ok(value) => value,
            Err(e) => {
                self.disable(&e);
                None
            }
        }
    }

    fn safe_set(&self, value: &str) -> bool {
        if !self.is_persistent() {
            return false;
        }
        match self.backend.set(&self.key, value) {
            Ok(()) => true,
            Err(e) => {
                self.disable(&e);
                false
            }
        }
    }

    fn safe_remove(&self) {
        if !self.is_persistent() {
            return;
        }
        if let Err(e) = self.backend.remove(&self.key) {
            self.disable(&e);
        }
    }

    fn memory_copy(&self) -> Option<String> {
        self.memory
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_memory(&self, value: Option<String>) {
        *self
            .memory
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::atomic::AtomicUsize;

    /// Backend that fails every call and counts attempts
    #[derive(Default)]
    struct BrokenStorage {
        calls: AtomicUsize,
    }

    impl KeyValueStorage for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Unavailable("sandboxed".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::QuotaExceeded)
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Unavailable("sandboxed".to_string()))
        }
    }

    #[test]
    fn test_load_empty_storage_gives_defaults() {
        let store = LocalStore::new(Arc::new(MemoryStorage::new()), "k");
        let doc = store.load();
        assert_eq!(doc.restaurants.len(), 1);
        assert!(store.is_persistent());
    }

    #[test]
    fn test_save_then_load() {
        let backend = Arc::new(MemoryStorage::new());
        let store = LocalStore::new(backend.clone(), "k");
        let mut doc = store.load();
        doc.restaurants[0].name = "Harbor".to_string();

        assert!(store.save(&doc));
        assert_eq!(store.load(), doc);
        assert!(backend.get("k").unwrap().is_some());
    }

    #[test]
    fn test_corrupt_record_is_discarded() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set("k", "{not json").unwrap();
        let store = LocalStore::new(backend.clone(), "k");

        let doc = store.load();
        assert_eq!(doc.restaurants.len(), 1);
        assert_eq!(backend.get("k").unwrap(), None, "corrupt entry removed");
    }

    #[test]
    fn test_legacy_record_is_normalized() {
        let backend = Arc::new(MemoryStorage::new());
        backend
            .set("k", r#"{"title":"Old Menu","sections":[{"name":"Pies"}]}"#)
            .unwrap();
        let store = LocalStore::new(backend, "k");

        let doc = store.load();
        let menu = &doc.restaurants[0].boards[0].menu;
        assert_eq!(menu.title, "Old Menu");
        assert_eq!(menu.sections[0].name, "Pies");
    }

    #[test]
    fn test_failure_downgrades_to_memory_once() {
        let backend = Arc::new(BrokenStorage::default());
        let store = LocalStore::new(backend.clone(), "k");

        let mut doc = store.load();
        assert!(!store.is_persistent());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        doc.restaurants[0].name = "Kept".to_string();
        assert!(!store.save(&doc), "memory-only save reports false");
        assert!(!store.save(&doc));
        assert_eq!(
            backend.calls.load(Ordering::SeqCst),
            1,
            "backend is never touched again"
        );

        // The session still sees its own writes
        assert_eq!(store.load().restaurants[0].name, "Kept");
    }
}
