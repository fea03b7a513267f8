use std::path::PathBuf;

use omstorage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LineageError {
    #[error("manifest not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid manifest: {0}")]
    InvalidFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metadata repository error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, LineageError>;
