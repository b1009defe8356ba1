//! GCS-compatible object store backend
//!
//! Public readability is a bucket-level IAM concern; uploads themselves do
//! not carry per-object ACLs.

use crate::config::ArchiveConfig;
use crate::models::error::{StorageConfigError, SweepError, UploadError};
use crate::models::types::{ArchivePath, StorageKind};
use crate::stores::storage_trait::RemoteStorage;
use crate::stores::{require_str, source_metadata};
use crate::utils::{paths, retention};
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

const PUBLIC_HOST: &str = "https://storage.googleapis.com";

pub struct GcsStorage {
    store: GoogleCloudStorage,
    bucket: String,
    public_base: Url,
    make_public: bool,
}

fn public_base_for(bucket: &str) -> Result<Url, StorageConfigError> {
    paths::parse_base_url(&format!("{PUBLIC_HOST}/{bucket}"))
}

fn classify_store_error(action: &str, err: object_store::Error) -> UploadError {
    let detail = format!("{action}: {err}");
    match err {
        object_store::Error::Unauthenticated { .. }
        | object_store::Error::PermissionDenied { .. } => UploadError::Auth(detail),
        object_store::Error::Generic { .. } | object_store::Error::JoinError { .. } => {
            UploadError::Transient(detail)
        }
        _ => UploadError::Backend(detail),
    }
}

impl GcsStorage {
    pub fn new(config: &ArchiveConfig) -> Result<Self, StorageConfigError> {
        let gcs = config
            .google_cloud
            .as_ref()
            .ok_or(StorageConfigError::MissingSection(StorageKind::GoogleCloud))?;

        let credentials_file = match gcs.credentials_file.as_ref() {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => {
                return Err(StorageConfigError::MissingField {
                    kind: StorageKind::GoogleCloud,
                    field: "credentials_file",
                });
            }
        };
        let bucket =
            require_str(&gcs.bucket_name, StorageKind::GoogleCloud, "bucket_name")?.to_string();

        let store = GoogleCloudStorageBuilder::new()
            .with_bucket_name(bucket.clone())
            .with_service_account_path(credentials_file.to_string_lossy())
            .build()
            .map_err(|e| StorageConfigError::ClientInit {
                kind: StorageKind::GoogleCloud,
                message: e.to_string(),
            })?;

        let public_base = public_base_for(&bucket)?;
        debug!(
            bucket = %bucket,
            project = gcs.project_id.as_deref().unwrap_or("from credentials file"),
            "GCS client initialized"
        );

        Ok(Self {
            store,
            bucket,
            public_base,
            make_public: gcs.make_public,
        })
    }
}

#[async_trait::async_trait]
impl RemoteStorage for GcsStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::GoogleCloud
    }

    async fn upload_file(
        &self,
        source: &Path,
        dest: &ArchivePath,
    ) -> Result<Option<String>, UploadError> {
        let metadata = source_metadata(source).await?;
        let size = metadata.len();
        let key = dest.key();

        let data = tokio::fs::read(source).await.map_err(UploadError::IoError)?;
        let location = ObjectPath::from(key.as_str());
        self.store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|e| classify_store_error("GCS upload failed", e))?;

        if !self.make_public {
            info!(bucket = %self.bucket, key = %key, size, "Artifact archived to GCS without public URL");
            return Ok(None);
        }

        let url = paths::join_url(&self.public_base, &key);
        info!(bucket = %self.bucket, key = %key, size, url = %url, "Artifact archived to GCS");
        Ok(Some(url))
    }

    async fn clean_files(&self, scope_root: &str, max_age_days: u32) -> Result<u64, SweepError> {
        let prefix = ObjectPath::from(scope_root.trim_matches('/'));
        let now = Utc::now();
        let mut deleted = 0u64;

        let mut entries = self.store.list(Some(&prefix));
        while let Some(entry) = entries.next().await {
            let meta = entry
                .map_err(|e| SweepError::Backend(format!("GCS listing failed: {e}")))?;

            if retention::is_expired(now, meta.last_modified, max_age_days) {
                match self.store.delete(&meta.location).await {
                    Ok(()) => deleted += 1,
                    Err(e) => {
                        warn!(key = %meta.location, error = %e, "Failed to delete aged object")
                    }
                }
            }
        }

        if deleted > 0 {
            info!(bucket = %self.bucket, prefix = %prefix, deleted, "Removed aged objects from GCS");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcsConfig;
    use std::path::PathBuf;

    fn gcs_config() -> ArchiveConfig {
        ArchiveConfig {
            enabled: true,
            storage_type: StorageKind::GoogleCloud,
            archive_path: String::new(),
            archive_days: 0,
            archive_extensions: vec![".wav".to_string()],
            local: None,
            scp: None,
            aws_s3: None,
            google_cloud: Some(GcsConfig {
                credentials_file: Some(PathBuf::from("/etc/tr-archiver/sa.json")),
                project_id: Some("radio-project".to_string()),
                bucket_name: Some("radio-archive".to_string()),
                make_public: true,
            }),
        }
    }

    #[test]
    fn missing_credentials_file_is_a_config_error() {
        let mut config = gcs_config();
        config.google_cloud.as_mut().unwrap().credentials_file = None;
        assert!(matches!(
            GcsStorage::new(&config),
            Err(StorageConfigError::MissingField { field: "credentials_file", .. })
        ));

        let mut config = gcs_config();
        config.google_cloud.as_mut().unwrap().credentials_file = Some(PathBuf::new());
        assert!(matches!(
            GcsStorage::new(&config),
            Err(StorageConfigError::MissingField { field: "credentials_file", .. })
        ));
    }

    #[test]
    fn missing_bucket_is_a_config_error() {
        let mut config = gcs_config();
        config.google_cloud.as_mut().unwrap().bucket_name = Some(String::new());
        assert!(matches!(
            GcsStorage::new(&config),
            Err(StorageConfigError::MissingField { field: "bucket_name", .. })
        ));
    }

    #[test]
    fn public_urls_use_the_storage_host() {
        let base = public_base_for("radio-archive").unwrap();
        assert_eq!(
            paths::join_url(&base, "countyA/2024/3/5/call123.wav"),
            "https://storage.googleapis.com/radio-archive/countyA/2024/3/5/call123.wav"
        );
    }

    // Emulator-style service account: `disable_oauth` lets the client build
    // without a signing key, so no credentials or network are ever touched.
    fn write_fake_service_account(dir: &Path) -> PathBuf {
        let path = dir.join("sa.json");
        std::fs::write(
            &path,
            r#"{
              "type": "service_account",
              "project_id": "radio-project",
              "private_key_id": "",
              "private_key": "",
              "client_email": "archiver@radio-project.iam.gserviceaccount.com",
              "disable_oauth": true
            }"#,
        )
        .unwrap();
        path
    }

    // The source check runs before the object is put, so a missing file must
    // fail fast without any request going out.
    #[tokio::test]
    async fn missing_source_fails_without_an_api_call() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = gcs_config();
        config.google_cloud.as_mut().unwrap().credentials_file =
            Some(write_fake_service_account(dir.path()));

        let store = GcsStorage::new(&config).unwrap();
        let dest = ArchivePath {
            archive_root: String::new(),
            partition: "countyA/2024/3/5".to_string(),
            file_name: "call123.wav".to_string(),
        };

        let result = store
            .upload_file(Path::new("/nonexistent/call123.wav"), &dest)
            .await;

        assert!(matches!(result, Err(UploadError::SourceMissing(_))));
    }
}
