//! Local filesystem archive backend

use crate::config::ArchiveConfig;
use crate::models::error::{StorageConfigError, SweepError, UploadError};
use crate::models::types::{ArchivePath, StorageKind};
use crate::stores::{require_str, source_metadata};
use crate::stores::storage_trait::RemoteStorage;
use crate::utils::{paths, retention};
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};
use url::Url;

pub struct LocalStorage {
    base_url: Url,
}

impl LocalStorage {
    pub fn new(config: &ArchiveConfig) -> Result<Self, StorageConfigError> {
        let local = config
            .local
            .as_ref()
            .ok_or(StorageConfigError::MissingSection(StorageKind::Local))?;

        if config.archive_path.is_empty() {
            return Err(StorageConfigError::MissingField {
                kind: StorageKind::Local,
                field: "archive_path",
            });
        }

        let base_raw = require_str(&local.base_url, StorageKind::Local, "base_url")?;
        let base_url = paths::parse_base_url(base_raw)?;

        Ok(Self { base_url })
    }

    async fn sweep_dir(
        &self,
        dir: &Path,
        now: DateTime<Utc>,
        max_age_days: u32,
        deleted: &mut u64,
    ) -> Result<(), SweepError> {
        let mut entries = fs::read_dir(dir).await.map_err(SweepError::IoError)?;

        while let Some(entry) = entries.next_entry().await.map_err(SweepError::IoError)? {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if metadata.is_dir() {
                Box::pin(self.sweep_dir(&path, now, max_age_days, deleted)).await?;

                // Prune the subdirectory if the sweep emptied it. The scope
                // root is never an entry here, so it is never pruned.
                let is_empty = match fs::read_dir(&path).await {
                    Ok(mut rest) => rest
                        .next_entry()
                        .await
                        .map_err(SweepError::IoError)?
                        .is_none(),
                    Err(_) => false,
                };
                if is_empty {
                    if let Err(e) = fs::remove_dir(&path).await {
                        warn!(path = %path.display(), error = %e, "Failed to prune empty directory");
                    }
                }
            } else if metadata.is_file() {
                if let Ok(modified) = metadata.modified() {
                    let modified_dt: DateTime<Utc> = modified.into();
                    if retention::is_expired(now, modified_dt, max_age_days) {
                        if let Err(e) = fs::remove_file(&path).await {
                            warn!(path = %path.display(), error = %e, "Failed to remove aged file");
                        } else {
                            *deleted += 1;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteStorage for LocalStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }

    async fn upload_file(
        &self,
        source: &Path,
        dest: &ArchivePath,
    ) -> Result<Option<String>, UploadError> {
        let metadata = source_metadata(source).await?;
        let size = metadata.len();

        let dest_path = dest.full_path();
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(UploadError::IoError)?;
        }

        fs::copy(source, &dest_path)
            .await
            .map_err(UploadError::IoError)?;

        let url = paths::join_url(&self.base_url, &dest.key());
        info!(dest = %dest_path.display(), size, url = %url, "Artifact archived locally");
        Ok(Some(url))
    }

    async fn clean_files(&self, scope_root: &str, max_age_days: u32) -> Result<u64, SweepError> {
        let root = Path::new(scope_root);
        if !root.exists() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut deleted = 0u64;
        self.sweep_dir(root, now, max_age_days, &mut deleted).await?;

        if deleted > 0 {
            info!(root = %root.display(), deleted, "Removed aged archive files");
        }
        Ok(deleted)
    }
}
