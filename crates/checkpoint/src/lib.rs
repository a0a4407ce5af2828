//! Durable resume checkpoints for interrupted downloads.
//!
//! The store is one JSON file mapping filename to a record of how many bytes
//! the peer has already received. Every mutation is a whole-map rewrite, and
//! one mutex serializes the read-modify-write cycle so concurrent sessions
//! cannot silently overwrite each other's records. Records are removed on
//! verified completion and kept on every other outcome, which is what makes
//! a later `RESUME` possible.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Errors produced by the checkpoint store.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint file corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// One persisted resume marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Identity of the receiving peer (address, or a client's server label).
    pub peer: String,
    /// Bytes received so far.
    pub offset: u64,
    pub updated_at: DateTime<Utc>,
}

/// Durable filename → [`CheckpointRecord`] mapping, shared across sessions.
pub struct CheckpointStore {
    path: PathBuf,
    inner: Mutex<HashMap<String, CheckpointRecord>>,
}

impl CheckpointStore {
    /// Opens the store, loading an existing checkpoint file if present.
    ///
    /// A missing file is an empty store; a corrupt file is an error rather
    /// than silent data loss.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let records = if path.exists() {
            serde_json::from_str(&std::fs::read_to_string(&path)?)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            inner: Mutex::new(records),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates or updates the record for `name` and persists the store.
    pub async fn record(
        &self,
        name: &str,
        peer: &str,
        offset: u64,
    ) -> Result<(), CheckpointError> {
        let mut map = self.inner.lock().await;
        map.insert(
            name.to_string(),
            CheckpointRecord {
                peer: peer.to_string(),
                offset,
                updated_at: Utc::now(),
            },
        );
        self.persist(&map).await?;
        tracing::debug!(%name, %peer, offset, "checkpoint recorded");
        Ok(())
    }

    /// Returns the record for `name`, if any.
    pub async fn get(&self, name: &str) -> Option<CheckpointRecord> {
        let map = self.inner.lock().await;
        map.get(name).cloned()
    }

    /// Removes the record for `name` and persists the store.
    ///
    /// Returns `true` if a record was present.
    pub async fn remove(&self, name: &str) -> Result<bool, CheckpointError> {
        let mut map = self.inner.lock().await;
        let removed = map.remove(name).is_some();
        if removed {
            self.persist(&map).await?;
            tracing::debug!(%name, "checkpoint removed");
        }
        Ok(removed)
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Writes the whole map to a temp file, then renames it over the real
    /// one so readers never observe a half-written store.
    async fn persist(&self, map: &HashMap<String, CheckpointRecord>) -> Result<(), CheckpointError> {
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(map)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
