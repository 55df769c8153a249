//! Key/value persistence backends
//!
//! [`KeyValueStorage`] is the page-scoped storage primitive the local store
//! sits on. Backends may fail at any call (quota, permissions, sandboxing);
//! the local store owns the policy for what happens next.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Storage backend errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A write made through another handle onto the same storage area
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEvent {
    pub key: String,
    /// `None` when the key was removed
    pub new_value: Option<String>,
}

/// Page-scoped key/value storage
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Change notifications for writes made by *other* handles
    ///
    /// Backends without cross-context notification return `None`.
    fn watch(&self) -> Option<StorageEvents> {
        None
    }
}

#[derive(Debug, Clone)]
struct OriginEvent {
    origin: Uuid,
    event: StorageEvent,
}

/// Stream of [`StorageEvent`]s, excluding the subscriber's own writes
pub struct StorageEvents {
    origin: Uuid,
    rx: broadcast::Receiver<OriginEvent>,
}

impl StorageEvents {
    /// Next event from another handle; `None` once the storage is gone
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(message) if message.origin == self.origin => continue,
                Ok(message) => return Some(message.event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Storage watcher lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// ========================================
// In-memory storage shared between tabs
// ========================================

struct SharedArea {
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<OriginEvent>,
}

/// In-process storage area
///
/// Each handle behaves like one browser tab's view of the same origin's
/// storage: all handles see the same entries, and each write is announced
/// to every other handle.
#[derive(Clone)]
pub struct MemoryStorage {
    origin: Uuid,
    area: Arc<SharedArea>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            origin: Uuid::new_v4(),
            area: Arc::new(SharedArea {
                entries: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Another handle onto the same storage area
    pub fn handle(&self) -> Self {
        Self {
            origin: Uuid::new_v4(),
            area: Arc::clone(&self.area),
        }
    }

    fn announce(&self, key: &str, new_value: Option<String>) {
        let _ = self.area.events.send(OriginEvent {
            origin: self.origin,
            event: StorageEvent {
                key: key.to_string(),
                new_value,
            },
        });
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.area
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries().insert(key.to_string(), value.to_string());
        self.announce(key, Some(value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let removed = self.entries().remove(key);
        if removed.is_some() {
            self.announce(key, None);
        }
        Ok(())
    }

    fn watch(&self) -> Option<StorageEvents> {
        Some(StorageEvents {
            origin: self.origin,
            rx: self.area.events.subscribe(),
        })
    }
}

// ========================================
// File storage
// ========================================

/// One JSON file per key under a directory
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-write never leaves a truncated record behind.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (creating if needed) a storage directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("File storage at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
