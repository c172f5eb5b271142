//! Persisted sync state
//!
//! Three fields travel across runs: the incremental cursor, the running
//! record count, and the last pagination offset. The host round-trips the
//! blob verbatim; only this loop writes it. Checkpoints must be durable
//! before the next fetch starts, so the file store writes through a temp
//! file, fsyncs, and renames into place.

use async_trait::async_trait;
use openfda_common::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Sync progress carried between runs
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncState {
    /// Cursor: lower bound for the next incremental fetch (RFC-3339)
    pub last_sync_date: Option<String>,

    /// Records processed across checkpoints, non-decreasing
    #[serde(default)]
    pub total_processed: u64,

    /// Last pagination offset, informational only
    pub last_cursor: Option<u64>,
}

/// Durable storage for [`SyncState`]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted state, `None` on a first run
    async fn load(&self) -> Result<Option<SyncState>>;

    /// Durably persist a checkpoint
    async fn save(&self, state: &SyncState) -> Result<()>;
}

/// State store backed by a single JSON file
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Create a store persisting to the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The file this store persists to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self) -> Result<Option<SyncState>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state = serde_json::from_str(&raw)
            .map_err(|e| SyncError::state(format!("corrupt state file {}: {e}", self.path.display())))?;
        Ok(Some(state))
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(serde_json::to_string_pretty(state)?.as_bytes())
            .await?;
        // Checkpoint durability: flush to disk before the rename makes
        // the new state visible.
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// In-memory state store for tests and dry runs
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<Option<SyncState>>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with state from a prior run
    pub fn with_state(state: SyncState) -> Self {
        Self {
            inner: Mutex::new(Some(state)),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<Option<SyncState>> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        *self.inner.lock().await = Some(state.clone());
        Ok(())
    }
}
