use std::io::Error as IoError;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::TargetId;

/// Rejected target input. Raised before anything reaches the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("URL cannot be empty")]
    EmptyUrl,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Interval must be greater than 0 seconds")]
    NonPositiveInterval,
    #[error("Interval too long (max {max_seconds} seconds)")]
    IntervalTooLong { max_seconds: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("Unknown target: {0}")]
    UnknownTarget(TargetId),
    #[error("Scheduler is not running")]
    Stopped,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("Malformed target list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Target storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error("Failed to persist targets: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Target not found: {0}")]
    NotFound(TargetId),
}
