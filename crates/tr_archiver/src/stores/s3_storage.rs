//! S3-compatible object store backend

use crate::config::ArchiveConfig;
use crate::models::error::{StorageConfigError, SweepError, UploadError};
use crate::models::types::{ArchivePath, StorageKind};
use crate::stores::storage_trait::RemoteStorage;
use crate::stores::{require_str, source_metadata};
use crate::utils::{paths, retention};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_ENDPOINT: &str = "s3.amazonaws.com";

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_base: Url,
    make_public: bool,
}

impl S3Storage {
    pub fn new(config: &ArchiveConfig) -> Result<Self, StorageConfigError> {
        let s3 = config
            .aws_s3
            .as_ref()
            .ok_or(StorageConfigError::MissingSection(StorageKind::AwsS3))?;

        let access_key_id = require_str(&s3.access_key_id, StorageKind::AwsS3, "access_key_id")?;
        let secret_access_key = match s3.secret_access_key.as_ref() {
            Some(secret) if !secret.expose_secret().is_empty() => secret.expose_secret(),
            _ => {
                return Err(StorageConfigError::MissingField {
                    kind: StorageKind::AwsS3,
                    field: "secret_access_key",
                });
            }
        };
        let bucket = require_str(&s3.bucket_name, StorageKind::AwsS3, "bucket_name")?.to_string();

        let endpoint = s3.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let public_raw = format!("https://{bucket}.{endpoint}");
        let public_base = paths::parse_base_url(&public_raw)?;

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key.as_str(),
            None,
            None,
            "archive-config",
        );
        let mut builder = aws_sdk_s3::config::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(s3.region.clone()))
            .credentials_provider(credentials);

        if s3.endpoint.is_some() {
            builder = builder.endpoint_url(format!("https://{endpoint}"));
        }
        if s3.path_style {
            builder = builder.force_path_style(true);
        }

        let client = S3Client::from_conf(builder.build());
        debug!(bucket = %bucket, region = %s3.region, "S3 client initialized");

        Ok(Self {
            client,
            bucket,
            public_base,
            make_public: s3.make_public,
        })
    }

    fn object_url(&self, key: &str) -> String {
        paths::join_url(&self.public_base, key)
    }
}

fn classify_sdk_error<E, R>(action: &str, err: SdkError<E, R>) -> UploadError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let transient = matches!(
        &err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
    );
    let detail = format!("{action}: {}", DisplayErrorContext(err));
    if transient {
        UploadError::Transient(detail)
    } else {
        UploadError::Backend(detail)
    }
}

#[async_trait::async_trait]
impl RemoteStorage for S3Storage {
    fn kind(&self) -> StorageKind {
        StorageKind::AwsS3
    }

    async fn upload_file(
        &self,
        source: &Path,
        dest: &ArchivePath,
    ) -> Result<Option<String>, UploadError> {
        let metadata = source_metadata(source).await?;
        let size = metadata.len();
        let key = dest.key();

        let body = ByteStream::from_path(source).await.map_err(|e| {
            UploadError::IoError(std::io::Error::other(format!(
                "Failed to read {}: {e}",
                source.display()
            )))
        })?;

        let mut put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body);
        if self.make_public {
            put = put.acl(ObjectCannedAcl::PublicRead);
        }
        put.send()
            .await
            .map_err(|e| classify_sdk_error("S3 upload failed", e))?;

        if !self.make_public {
            info!(bucket = %self.bucket, key = %key, size, "Artifact archived to S3 without public URL");
            return Ok(None);
        }

        let url = self.object_url(&key);
        info!(bucket = %self.bucket, key = %key, size, url = %url, "Artifact archived to S3");
        Ok(Some(url))
    }

    async fn clean_files(&self, scope_root: &str, max_age_days: u32) -> Result<u64, SweepError> {
        let prefix = format!("{}/", scope_root.trim_matches('/'));
        let now = Utc::now();
        let mut deleted = 0u64;

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                SweepError::Backend(format!("S3 listing failed: {}", DisplayErrorContext(e)))
            })?;

            for object in page.contents() {
                if let (Some(key), Some(last_modified)) = (object.key(), object.last_modified()) {
                    let modified = DateTime::<Utc>::from_timestamp(last_modified.secs(), 0);
                    if let Some(modified) = modified {
                        if retention::is_expired(now, modified, max_age_days) {
                            match self
                                .client
                                .delete_object()
                                .bucket(&self.bucket)
                                .key(key)
                                .send()
                                .await
                            {
                                Ok(_) => deleted += 1,
                                Err(e) => {
                                    warn!(key = %key, error = %DisplayErrorContext(e), "Failed to delete aged object")
                                }
                            }
                        }
                    }
                }
            }
        }

        if deleted > 0 {
            info!(bucket = %self.bucket, prefix = %prefix, deleted, "Removed aged objects from S3");
        }
        Ok(deleted)
    }
}
