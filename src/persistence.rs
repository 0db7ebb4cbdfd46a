//! Optional persistence collaborator: a versioned JSON snapshot of the item
//! store. The workflow core stays in-memory; hosts that want items to
//! survive between runs (the CLI does) save and reload a snapshot around
//! their work. This is a convenience, not a durability guarantee.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

use crate::store::ApprovalStore;

pub const SNAPSHOT_VERSION: &str = "1";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Snapshot version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: String,
    pub saved_at: DateTime<Utc>,
    pub store: ApprovalStore,
}

/// Boundary trait so hosts can swap in their own backing store.
#[async_trait]
pub trait StorePersistence {
    async fn save_store(&self, store: &ApprovalStore) -> Result<(), PersistenceError>;

    /// `Ok(None)` when no snapshot exists yet.
    async fn load_store(&self) -> Result<Option<ApprovalStore>, PersistenceError>;
}

/// JSON-file snapshot persistence.
#[derive(Debug, Clone)]
pub struct JsonSnapshotPersistence {
    path: PathBuf,
}

impl JsonSnapshotPersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StorePersistence for JsonSnapshotPersistence {
    async fn save_store(&self, store: &ApprovalStore) -> Result<(), PersistenceError> {
        let snapshot = StoreSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            saved_at: Utc::now(),
            store: store.clone(),
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&self.path, json).await?;
        tracing::debug!(path = %self.path.display(), items = store.len(), "store snapshot saved");
        Ok(())
    }

    async fn load_store(&self) -> Result<Option<ApprovalStore>, PersistenceError> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let snapshot: StoreSnapshot = serde_json::from_str(&contents)?;
                if snapshot.version != SNAPSHOT_VERSION {
                    return Err(PersistenceError::VersionMismatch {
                        expected: SNAPSHOT_VERSION.to_string(),
                        found: snapshot.version,
                    });
                }
                tracing::debug!(
                    path = %self.path.display(),
                    items = snapshot.store.len(),
                    "store snapshot loaded"
                );
                Ok(Some(snapshot.store))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
