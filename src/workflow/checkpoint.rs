use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use super::context::{WorkflowContext, WorkflowStep};
use crate::ledger::Network;

pub const CHECKPOINT_VERSION: &str = "1";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no checkpoint found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("checkpoint version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("checkpoint corrupted: {reason}")]
    Corrupted { reason: String },

    #[error("checkpoint was written for network {found}, configured network is {expected}")]
    NetworkMismatch { expected: Network, found: Network },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub checkpoint_id: String,
    pub correlation_id: String,
    pub network: Network,
    pub saved_at: DateTime<Utc>,
    pub hostname: String,
    pub last_step: Option<WorkflowStep>,
    pub integrity_hash: String,
}

/// Progress of one run, as written to disk after every completed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: String,
    pub metadata: CheckpointMetadata,
    pub context: WorkflowContext,
}

impl Checkpoint {
    pub fn new(context: WorkflowContext, network: Network, correlation_id: &str) -> Result<Self, CheckpointError> {
        let integrity_hash = integrity_hash(&context)?;
        Ok(Self {
            version: CHECKPOINT_VERSION.to_string(),
            metadata: CheckpointMetadata {
                checkpoint_id: format!("{}_{}", Utc::now().timestamp(), rand::rng().random::<u32>()),
                correlation_id: correlation_id.to_string(),
                network,
                saved_at: Utc::now(),
                hostname: hostname::get()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string(),
                last_step: context.last_completed(),
                integrity_hash,
            },
            context,
        })
    }

    /// Checks the format version and that the context was not edited since
    /// it was saved.
    pub fn verify(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: CHECKPOINT_VERSION.to_string(),
                found: self.version.clone(),
            });
        }

        let actual = integrity_hash(&self.context)?;
        if actual != self.metadata.integrity_hash {
            warn!(
                checkpoint_id = %self.metadata.checkpoint_id,
                expected = %self.metadata.integrity_hash,
                actual = %actual,
                "Checkpoint integrity check failed"
            );
            return Err(CheckpointError::Corrupted {
                reason: "integrity hash does not match the saved context".to_string(),
            });
        }
        Ok(())
    }

    pub fn ensure_network(&self, expected: Network) -> Result<(), CheckpointError> {
        if self.metadata.network != expected {
            return Err(CheckpointError::NetworkMismatch {
                expected,
                found: self.metadata.network,
            });
        }
        Ok(())
    }
}

fn integrity_hash(context: &WorkflowContext) -> Result<String, CheckpointError> {
    let serialized = serde_json::to_vec(context)?;
    Ok(hex::encode(Sha256::digest(&serialized)))
}

/// A single checkpoint file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> Result<bool, CheckpointError> {
        Ok(fs::try_exists(&self.path).await?)
    }

    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let serialized = serde_json::to_string_pretty(checkpoint)?;
        // Write to temporary file first, then rename
        let temp_file = format!("{}.tmp", self.path.display());
        fs::write(&temp_file, serialized).await?;
        fs::rename(&temp_file, &self.path).await?;

        info!(
            checkpoint_id = %checkpoint.metadata.checkpoint_id,
            last_step = ?checkpoint.metadata.last_step,
            file = ?self.path,
            "Checkpoint saved"
        );
        Ok(())
    }

    pub async fn load(&self) -> Result<Checkpoint, CheckpointError> {
        if !self.exists().await? {
            return Err(CheckpointError::NotFound(self.path.clone()));
        }

        let contents = fs::read_to_string(&self.path).await?;
        let checkpoint: Checkpoint = serde_json::from_str(&contents)?;
        checkpoint.verify()?;

        debug!(
            checkpoint_id = %checkpoint.metadata.checkpoint_id,
            saved_at = %checkpoint.metadata.saved_at,
            completed = checkpoint.context.completed.len(),
            "Checkpoint loaded"
        );
        Ok(checkpoint)
    }
}
