//! Storage wrappers that observe or break persistence

use std::sync::atomic::{AtomicUsize, Ordering};

use menuboard_sync::{KeyValueStorage, MemoryStorage, StorageError, StorageEvents};

/// Memory storage that counts writes
pub struct CountingStorage {
    inner: MemoryStorage,
    sets: AtomicUsize,
}

impl CountingStorage {
    pub fn new() -> Self {
        Self::wrap(MemoryStorage::new())
    }

    /// Count writes made through `inner`
    pub fn wrap(inner: MemoryStorage) -> Self {
        Self {
            inner,
            sets: AtomicUsize::new(0),
        }
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.get(key).ok().flatten()
    }
}

impl KeyValueStorage for CountingStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }

    fn watch(&self) -> Option<StorageEvents> {
        self.inner.watch()
    }
}

/// Storage whose every call fails, like a sandboxed page
pub struct BrokenStorage;

impl KeyValueStorage for BrokenStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("storage disabled".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::QuotaExceeded)
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage disabled".to_string()))
    }
}
