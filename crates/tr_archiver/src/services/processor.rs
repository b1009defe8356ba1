//! Per-call pipeline: metadata lookup, upload of each artifact, URL collection

use crate::config::Config;
use crate::models::error::ProcessError;
use crate::models::types::{CallMetadata, CallUrls, RetentionPolicy, StorageKind, UploadRequest};
use crate::services::archiver::Archiver;
use std::path::Path;
use tracing::{debug, error, info, warn};

pub struct CallProcessor {
    config: Config,
}

impl CallProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Archives every configured artifact of one recorded call, keyed off the
    /// audio path. The `.json` metadata sibling supplies the call start time
    /// used for date partitioning. Upload failures surface as absent URLs,
    /// never as errors.
    pub async fn process(&self, short_name: &str, audio_path: &Path) -> Result<CallUrls, ProcessError> {
        let system = self
            .config
            .system(short_name)
            .ok_or_else(|| ProcessError::UnknownSystem(short_name.to_string()))?;
        let archive = &system.archive;

        if !archive.enabled {
            debug!(system = short_name, "Archiving disabled for system");
            return Ok(CallUrls::default());
        }

        let metadata_path = audio_path.with_extension("json");
        let raw = tokio::fs::read_to_string(&metadata_path).await?;
        let metadata: CallMetadata = serde_json::from_str(&raw)?;

        if archive.archive_days == -1 {
            self.delete_call_files(short_name, audio_path, &archive.archive_extensions)
                .await;
            return Ok(CallUrls::default());
        }

        let archiver = match Archiver::new(archive) {
            Ok(archiver) => archiver,
            Err(e) => {
                error!(
                    system = short_name,
                    error = %e,
                    "Archive storage misconfigured, skipping upload"
                );
                return Ok(CallUrls::default());
            }
        };

        // Hierarchical backends sweep under `archive_path/<system>`; object
        // stores key everything by system prefix alone.
        let scope_root = match archive.storage_type {
            StorageKind::Local | StorageKind::Scp => format!(
                "{}/{}",
                archive.archive_path.trim_end_matches('/'),
                short_name
            ),
            StorageKind::AwsS3 | StorageKind::GoogleCloud => short_name.to_string(),
        };
        // Saturate rather than truncate so an oversized horizon can never
        // wrap into a short one and sweep calls it was meant to keep.
        let policy = RetentionPolicy {
            scope_root,
            max_age_days: u32::try_from(archive.archive_days.max(0)).unwrap_or(u32::MAX),
        };

        let mut urls = CallUrls::default();
        for extension in &archive.archive_extensions {
            let extension = extension.trim_start_matches('.');
            if extension.is_empty() {
                continue;
            }

            let artifact = audio_path.with_extension(extension);
            if !artifact.exists() {
                debug!(system = short_name, path = %artifact.display(), "Artifact not present, skipping");
                continue;
            }

            let request = UploadRequest::new(artifact, short_name, metadata.start_time);
            let location = archiver.archive(&request, &policy).await;
            if !urls.set(extension, location.and_then(|l| l.public_url)) {
                warn!(system = short_name, extension, "Unknown archive extension, URL not reported");
            }
        }

        Ok(urls)
    }

    /// `archive_days == -1`: the operator wants call artifacts discarded
    /// right away instead of archived.
    async fn delete_call_files(&self, short_name: &str, audio_path: &Path, extensions: &[String]) {
        let mut deleted = 0u32;
        for extension in extensions {
            let artifact = audio_path.with_extension(extension.trim_start_matches('.'));
            if !artifact.exists() {
                continue;
            }
            match tokio::fs::remove_file(&artifact).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(path = %artifact.display(), error = %e, "Failed to delete call artifact")
                }
            }
        }
        info!(system = short_name, deleted, "Deleted call artifacts without archiving");
    }
}
