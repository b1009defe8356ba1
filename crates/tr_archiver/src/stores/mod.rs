//! Storage backend implementations

pub mod gcs_storage;
pub mod local_storage;
pub mod s3_storage;
pub mod scp_storage;
pub mod storage_trait;

use crate::config::ArchiveConfig;
use crate::models::error::{StorageConfigError, UploadError};
use crate::models::types::StorageKind;
use std::path::Path;
use std::sync::Arc;

pub use storage_trait::RemoteStorage;

/// Builds the backend selected by `storage_type`, validating its credential
/// block up front so a misconfigured store never reaches an upload attempt.
pub fn build_storage(config: &ArchiveConfig) -> Result<Arc<dyn RemoteStorage>, StorageConfigError> {
    let storage: Arc<dyn RemoteStorage> = match config.storage_type {
        StorageKind::Local => Arc::new(local_storage::LocalStorage::new(config)?),
        StorageKind::Scp => Arc::new(scp_storage::ScpStorage::new(config)?),
        StorageKind::AwsS3 => Arc::new(s3_storage::S3Storage::new(config)?),
        StorageKind::GoogleCloud => Arc::new(gcs_storage::GcsStorage::new(config)?),
    };
    Ok(storage)
}

/// Treats absent and empty-string fields the same way, so a templated config
/// with blank placeholders reads as "not configured".
pub(crate) fn require_str<'a>(
    value: &'a Option<String>,
    kind: StorageKind,
    field: &'static str,
) -> Result<&'a str, StorageConfigError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(StorageConfigError::MissingField { kind, field }),
    }
}

/// Stats the upload source, mapping a missing file to its own error variant
/// so callers can distinguish it from backend trouble.
pub(crate) async fn source_metadata(source: &Path) -> Result<std::fs::Metadata, UploadError> {
    match tokio::fs::metadata(source).await {
        Ok(metadata) => Ok(metadata),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(UploadError::SourceMissing(source.to_path_buf()))
        }
        Err(e) => Err(UploadError::IoError(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocalConfig;

    fn local_config(base_url: &str) -> ArchiveConfig {
        ArchiveConfig {
            enabled: true,
            storage_type: StorageKind::Local,
            archive_path: "/tmp/archive".to_string(),
            archive_days: 0,
            archive_extensions: vec![".wav".to_string()],
            local: Some(LocalConfig {
                base_url: Some(base_url.to_string()),
            }),
            scp: None,
            aws_s3: None,
            google_cloud: None,
        }
    }

    #[test]
    fn factory_selects_the_configured_backend() {
        let storage = build_storage(&local_config("https://cdn.example.com")).unwrap();
        assert_eq!(storage.kind(), StorageKind::Local);
    }

    #[test]
    fn factory_surfaces_backend_config_errors() {
        let mut config = local_config("https://cdn.example.com");
        config.local = None;
        assert!(matches!(
            build_storage(&config),
            Err(StorageConfigError::MissingSection(StorageKind::Local))
        ));

        let mut config = local_config("https://cdn.example.com");
        config.storage_type = StorageKind::AwsS3;
        assert!(matches!(
            build_storage(&config),
            Err(StorageConfigError::MissingSection(StorageKind::AwsS3))
        ));
    }

    #[test]
    fn blank_fields_read_as_missing() {
        let some = Some("value".to_string());
        assert_eq!(
            require_str(&some, StorageKind::Local, "base_url").unwrap(),
            "value"
        );

        for value in [None, Some(String::new())] {
            assert!(matches!(
                require_str(&value, StorageKind::Scp, "host"),
                Err(StorageConfigError::MissingField { field: "host", .. })
            ));
        }
    }

    #[tokio::test]
    async fn missing_source_maps_to_its_own_variant() {
        let err = source_metadata(Path::new("/nonexistent/call.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::SourceMissing(_)));
    }
}
