//! Durable record storage.
//!
//! Each concern (progress, UI preferences) is stored as one JSON record
//! under a namespaced key such as `academy-progress`. Records are wrapped in
//! a versioned envelope so the payload can evolve.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AcademyError, Result};

/// Envelope version written by this crate.
pub const RECORD_VERSION: u32 = 0;

/// Builds the storage key for a concern, e.g. `academy-progress`.
#[must_use]
pub fn record_key(namespace: &str, concern: &str) -> String {
    format!("{namespace}-{concern}")
}

/// Versioned wrapper around a persisted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<T> {
    /// The persisted payload.
    pub state: T,
    /// Envelope version.
    #[serde(default)]
    pub version: u32,
}

impl<T> Record<T> {
    /// Wraps a payload at the current version.
    pub const fn new(state: T) -> Self {
        Self {
            state,
            version: RECORD_VERSION,
        }
    }
}

/// A key-value store for serialized records.
pub trait DurableStore: Send + Sync {
    /// Reads a record, returning `None` when it was never written.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replaces a record.
    fn write(&self, key: &str, contents: &str) -> Result<()>;
}

/// Loads and decodes a record.
///
/// Missing, unreadable and malformed records all yield `None`; the last two
/// are logged at warn level.
pub fn load_record<T: DeserializeOwned>(store: &dyn DurableStore, key: &str) -> Option<T> {
    let contents = match store.read(key) {
        Ok(Some(contents)) => contents,
        Ok(None) => {
            debug!(key, "No stored record, using defaults");
            return None;
        }
        Err(e) => {
            warn!(key, error = %e, "Failed to read stored record, using defaults");
            return None;
        }
    };

    match serde_json::from_str::<Record<T>>(&contents) {
        Ok(record) => Some(record.state),
        Err(e) => {
            warn!(key, error = %e, "Stored record is malformed, using defaults");
            None
        }
    }
}

/// Encodes and writes a record.
pub fn save_record<T: Serialize>(store: &dyn DurableStore, key: &str, state: &T) -> Result<()> {
    let contents = serde_json::to_string(&Record::new(state))?;
    store.write(key, &contents)
}

// ============================================================================
// File Store
// ============================================================================

/// Stores each record as `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash never leaves a half-written record.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl DurableStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AcademyError::Io(e)),
        }
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| AcademyError::storage_write(key, e.to_string()))?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        std::fs::write(&tmp, contents)
            .map_err(|e| AcademyError::storage_write(key, e.to_string()))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| AcademyError::storage_write(key, e.to_string()))?;

        debug!(key, path = %path.display(), "Record written");
        Ok(())
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// Keeps records in memory. Useful for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
    fail_writes: bool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose writes always fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            records: Mutex::default(),
            fail_writes: true,
        }
    }

    /// Creates a store pre-populated with one raw record.
    #[must_use]
    pub fn with_record(key: impl Into<String>, contents: impl Into<String>) -> Self {
        let store = Self::new();
        if let Ok(mut records) = store.records.lock() {
            records.insert(key.into(), contents.into());
        }
        store
    }

    /// Returns the raw contents of a record.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.records.lock().ok()?.get(key).cloned()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map_or(0, |r| r.len())
    }

    /// Whether no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DurableStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.raw(key))
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        if self.fail_writes {
            return Err(AcademyError::storage_write(key, "store is read-only"));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| AcademyError::storage_write(key, "store lock poisoned"))?;
        records.insert(key.to_string(), contents.to_string());
        Ok(())
    }
}
