use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use crate::error::RepositoryError;
use crate::models::TargetDefinition;

/// Storage for the list of target definitions
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Load every stored target, in display order
    async fn load_targets(&self) -> Result<Vec<TargetDefinition>, RepositoryError>;

    /// Replace the stored list
    async fn save_targets(&self, targets: &[TargetDefinition]) -> Result<(), RepositoryError>;
}

/// Targets stored as a JSON array in a single file.
///
/// A missing file reads as an empty list. Saves go through a temporary
/// file and a rename so a crash never leaves a truncated list behind.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> RepositoryError {
        RepositoryError::Io { path: self.path.clone(), source }
    }
}

#[async_trait]
impl TargetRepository for JsonFileRepository {
    async fn load_targets(&self) -> Result<Vec<TargetDefinition>, RepositoryError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No target file yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let targets: Vec<TargetDefinition> = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), count = targets.len(), "Targets loaded");
        Ok(targets)
    }

    async fn save_targets(&self, targets: &[TargetDefinition]) -> Result<(), RepositoryError> {
        let json = serde_json::to_vec_pretty(targets)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), count = targets.len(), "Targets saved");
        Ok(())
    }
}

/// In-process target list, for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryRepository {
    targets: Mutex<Vec<TargetDefinition>>,
    fail_saves: AtomicBool,
}

impl MemoryRepository {
    pub fn new(targets: Vec<TargetDefinition>) -> Self {
        Self { targets: Mutex::new(targets), fail_saves: AtomicBool::new(false) }
    }

    /// Make every following save fail (or succeed again)
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Vec<TargetDefinition> {
        self.targets.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl TargetRepository for MemoryRepository {
    async fn load_targets(&self) -> Result<Vec<TargetDefinition>, RepositoryError> {
        Ok(self.stored())
    }

    async fn save_targets(&self, targets: &[TargetDefinition]) -> Result<(), RepositoryError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("saves disabled".to_string()));
        }
        *self.targets.lock().unwrap_or_else(PoisonError::into_inner) = targets.to_vec();
        Ok(())
    }
}
