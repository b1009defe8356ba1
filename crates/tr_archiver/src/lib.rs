//! Trunk-recorder call archiver
//!
//! Durable persistence of recorded call artifacts to local or remote storage,
//! with stable public URLs and age-based retention sweeps.

// Core modules
pub mod config;
pub mod models;

// Services
pub mod services;

// Storage
pub mod stores;

// Utilities
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use models::error::{ProcessError, StorageConfigError, SweepError, UploadError};
pub use models::types::{CallUrls, RetentionPolicy, StorageKind, StorageLocation, UploadRequest};
