//! Persistence of the session state
//!
//! The tracker stores its whole [`SessionState`] as one JSON blob under a
//! single key of a [`KeyValueStore`]. Persistence never breaks the tracker:
//! a missing, unreadable or unparsable blob loads as an empty state, and a
//! failed write is logged and skipped.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{ReadyError, Result};
use crate::session::SessionState;

pub mod file;
pub mod sqlite;
pub mod writer;

pub use file::FileStore;
pub use sqlite::SqliteStore;
pub use writer::{WriteBehind, WriteStats};

/// Key the session blob is stored under unless configured otherwise
pub const DEFAULT_STATE_KEY: &str = "readyrs_user_data";

/// Storage backend errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable for {key}: {reason}")]
    Unavailable { key: String, reason: String },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Opaque key/value persistence
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value for `key`, `None` if nothing is stored
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value in one step
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`; removing a missing key is not an error
    fn delete(&self, key: &str) -> StorageResult<()>;
}

/// In-process store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned(key: &str) -> StorageError {
        StorageError::Unavailable {
            key: key.to_string(),
            reason: "memory store lock poisoned".to_string(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self.data.read().map_err(|_| Self::poisoned(key))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self.data.write().map_err(|_| Self::poisoned(key))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let mut guard = self.data.write().map_err(|_| Self::poisoned(key))?;
        guard.remove(key);
        Ok(())
    }
}

/// Serialize a state snapshot to the persisted JSON schema
pub fn encode_state(state: &SessionState) -> Result<String> {
    serde_json::to_string(state)
        .map_err(|e| ReadyError::Internal(format!("failed to serialize session state: {}", e)))
}

/// Parse a persisted blob
pub fn decode_state(blob: &str) -> Result<SessionState> {
    serde_json::from_str(blob).map_err(|e| ReadyError::MalformedPersistedState {
        reason: e.to_string(),
    })
}

/// Loads, saves and purges the session blob through a [`KeyValueStore`]
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        SessionStore {
            backend,
            key: key.into(),
        }
    }

    /// Session store on a fresh [`MemoryStore`] under the default key
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_STATE_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.backend)
    }

    /// Load the stored state, surfacing persistence and parse errors
    pub fn try_load(&self) -> Result<Option<SessionState>> {
        match self.backend.get(&self.key)? {
            Some(blob) => decode_state(&blob).map(Some),
            None => Ok(None),
        }
    }

    /// Load the stored state, falling back to an empty one on any failure
    pub fn load(&self) -> SessionState {
        match self.try_load() {
            Ok(Some(state)) => {
                debug!(
                    key = %self.key,
                    readings = state.history.len(),
                    entries = state.compliance.len(),
                    "Session loaded"
                );
                state
            }
            Ok(None) => {
                debug!(key = %self.key, "No saved session, starting fresh");
                SessionState::default()
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Could not load session, starting fresh");
                SessionState::default()
            }
        }
    }

    /// Write the full state, surfacing failures
    pub fn try_save(&self, state: &SessionState) -> Result<()> {
        let blob = encode_state(state)?;
        self.backend.set(&self.key, &blob)?;
        info!(key = %self.key, bytes = blob.len(), "Session saved");
        Ok(())
    }

    /// Write the full state; failures are logged and the write skipped.
    ///
    /// Returns whether the write succeeded.
    pub fn save(&self, state: &SessionState) -> bool {
        match self.try_save(state) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to save session");
                false
            }
        }
    }

    /// Purge the stored state and start over
    pub fn reset(&self) -> SessionState {
        match self.backend.delete(&self.key) {
            Ok(()) => info!(key = %self.key, "Session reset"),
            Err(e) => warn!(key = %self.key, error = %e, "Failed to delete saved session"),
        }
        SessionState::default()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").field("key", &self.key).finish()
    }
}
