use std::path::PathBuf;

use runsim_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("seed queue is closed")]
    QueueClosed,
    #[error("seed queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },
    #[error("upload {key}: {reason}")]
    Upload { key: String, reason: String },
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("fleet queue: {0}")]
    Fleet(String),
    #[error("notification sink {sink}: {reason}")]
    Notify { sink: String, reason: String },
    #[error("integration state: {0}")]
    State(String),
    #[error("io error: {0}")]
    Io(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}
