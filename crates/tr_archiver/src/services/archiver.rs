//! Archive coordination: upload with retry, then retention sweep

use crate::config::ArchiveConfig;
use crate::models::error::StorageConfigError;
use crate::models::types::{ArchivePath, RetentionPolicy, StorageLocation, UploadRequest};
use crate::services::retry::RetryExecutor;
use crate::stores::{build_storage, RemoteStorage};
use crate::utils::paths;
use std::sync::Arc;
use tracing::{error, warn};

/// Drives a single backend selected from config. Archiving never fails the
/// caller: any error ends up logged and reported as "no URL".
pub struct Archiver {
    storage: Arc<dyn RemoteStorage>,
    retry: RetryExecutor,
    archive_root: String,
}

impl Archiver {
    pub fn new(config: &ArchiveConfig) -> Result<Self, StorageConfigError> {
        let storage = build_storage(config)?;
        Ok(Self {
            storage,
            retry: RetryExecutor::default(),
            archive_root: config.archive_path.clone(),
        })
    }

    /// Uploads one artifact to its date-partitioned destination and, when the
    /// policy is enabled, sweeps aged files from the same archive scope.
    /// Sweep failures are logged but never mask a successful upload.
    pub async fn archive(
        &self,
        request: &UploadRequest,
        policy: &RetentionPolicy,
    ) -> Option<StorageLocation> {
        let dest = ArchivePath {
            archive_root: self.archive_root.clone(),
            partition: paths::date_partition(&request.category, request.timestamp),
            file_name: request.file_name(),
        };
        let kind = self.storage.kind();
        let target = dest.key();

        let uploaded = self
            .retry
            .execute(kind, &target, || {
                self.storage.upload_file(&request.source_path, &dest)
            })
            .await;

        match uploaded {
            Ok(public_url) => {
                if policy.is_enabled() {
                    if let Err(e) = self
                        .storage
                        .clean_files(&policy.scope_root, policy.max_age_days)
                        .await
                    {
                        warn!(
                            backend = %kind,
                            scope = %policy.scope_root,
                            error = %e,
                            "Retention sweep failed"
                        );
                    }
                }
                Some(StorageLocation {
                    kind,
                    relative_path: target,
                    public_url,
                })
            }
            Err(e) => {
                error!(
                    backend = %kind,
                    target = %target,
                    error = %e,
                    "Failed to archive artifact"
                );
                None
            }
        }
    }
}
