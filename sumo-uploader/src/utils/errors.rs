//! Custom error types for the uploader.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploaderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Export manifest file not found at {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("Invalid metadata for {}: {reason}", path.display())]
    InvalidMetadata { path: PathBuf, reason: String },

    #[error("Metadata is missing {0}")]
    MissingField(String),

    #[error("Sumo responded {status}: {text}")]
    Remote { status: u16, text: String },

    #[error("File upload result returned with no status for {0}")]
    MissingStatus(String),

    #[error("Upload task error: {0}")]
    Task(String),
}

impl UploaderError {
    pub fn invalid_metadata(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        UploaderError::InvalidMetadata {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UploaderError>;
