use crate::models::types::StorageKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageConfigError {
    #[error("Missing `{0}` configuration block")]
    MissingSection(StorageKind),

    #[error("Missing required field `{field}` for {kind} storage")]
    MissingField {
        kind: StorageKind,
        field: &'static str,
    },

    #[error("Invalid base URL `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Base URL `{0}` cannot carry a path")]
    OpaqueBaseUrl(String),

    #[error("Failed to initialize {kind} client: {message}")]
    ClientInit { kind: StorageKind, message: String },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Storage configuration error: {0}")]
    Config(#[from] StorageConfigError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Source file not found: {0:?}")]
    SourceMissing(PathBuf),

    #[error("Transient I/O error: {0}")]
    Transient(String),

    #[error("Remote storage error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl UploadError {
    /// Retryable failures only; config, auth, and missing-source errors are
    /// permanent for the invocation.
    pub fn is_transient(&self) -> bool {
        matches!(self, UploadError::Transient(_))
    }
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote listing failed: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Unknown system `{0}`")]
    UnknownSystem(String),

    #[error("Invalid call metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
