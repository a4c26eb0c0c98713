//! Persistent state management
//!
//! The state store holds one [`StateRecord`] per applied resource: the
//! effective attribute mapping it was last applied with, the output it
//! produced, and the dependencies it had at the time. Idempotent re-apply
//! depends on this surviving across runs.

use crate::error::StateError;
use crate::provider::ResolvedOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Current on-disk state format version
pub const STATE_VERSION: u32 = 1;

/// Snapshot of everything the engine has applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub version: u32,
    /// Monotonic counter bumped on every record mutation
    pub serial: u64,
    pub records: BTreeMap<String, StateRecord>,
}

impl State {
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            records: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&StateRecord> {
        self.records.get(id)
    }

    /// Add or overwrite a record
    pub fn set(&mut self, id: impl Into<String>, record: StateRecord) {
        self.records.insert(id.into(), record);
        self.serial += 1;
    }

    pub fn remove(&mut self, id: &str) -> Option<StateRecord> {
        let removed = self.records.remove(id);
        if removed.is_some() {
            self.serial += 1;
        }
        removed
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// Last-applied snapshot of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub kind: String,
    /// Effective attributes at apply time (references already substituted)
    pub attributes: BTreeMap<String, Value>,
    /// Output produced by the provider
    pub output: ResolvedOutput,
    /// Identities this resource depended on at apply time. Orphan teardown is
    /// ordered from these once the declaration no longer contains the node.
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Durable backend for [`State`] snapshots.
///
/// Single-writer model: concurrent runs against the same store must be
/// serialized externally (the local store offers a lock file for this).
pub trait StateStore {
    fn load(&self) -> Result<State, StateError>;
    fn save(&self, state: &State) -> Result<(), StateError>;
}

/// Run-scoped lock on a local state file
#[derive(Debug, Serialize, Deserialize)]
pub struct StateLock {
    pub id: uuid::Uuid,
    pub acquired_at: DateTime<Utc>,
}

/// JSON-file state store
pub struct LocalStateStore {
    path: PathBuf,
}

impl LocalStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Acquire the cross-run lock. Fails if another run holds it.
    pub fn lock(&self) -> Result<StateLock, StateError> {
        let lock_path = self.lock_path();
        if lock_path.exists() {
            return Err(StateError::Locked { path: lock_path });
        }

        let lock = StateLock {
            id: uuid::Uuid::new_v4(),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_string(&lock).map_err(|source| StateError::Corrupt {
            path: lock_path.clone(),
            source,
        })?;
        std::fs::write(&lock_path, content).map_err(|source| StateError::Write {
            path: lock_path,
            source,
        })?;
        Ok(lock)
    }

    pub fn unlock(&self, _lock: StateLock) -> Result<(), StateError> {
        let lock_path = self.lock_path();
        if lock_path.exists() {
            std::fs::remove_file(&lock_path).map_err(|source| StateError::Write {
                path: lock_path,
                source,
            })?;
        }
        Ok(())
    }
}

impl StateStore for LocalStateStore {
    fn load(&self) -> Result<State, StateError> {
        if !self.path.exists() {
            return Ok(State::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|source| StateError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, state: &State) -> Result<(), StateError> {
        let content = serde_json::to_string_pretty(state).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, content).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// In-memory state store for tests and embedding
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<State>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<State, StateError> {
        let state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(state.clone())
    }

    fn save(&self, state: &State) -> Result<(), StateError> {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = state.clone();
        Ok(())
    }
}
