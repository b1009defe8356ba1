use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// Storage target kind, matching the `storage_type` configuration tag.
/// Unknown tags are rejected when the configuration is deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Local,
    Scp,
    AwsS3,
    GoogleCloud,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            StorageKind::Local => "local",
            StorageKind::Scp => "scp",
            StorageKind::AwsS3 => "aws_s3",
            StorageKind::GoogleCloud => "google_cloud",
        };
        f.write_str(tag)
    }
}

/// One artifact to archive. Created per file, consumed once.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source_path: PathBuf,
    pub category: String,
    pub timestamp: i64,
}

impl UploadRequest {
    pub fn new(
        source_path: impl Into<PathBuf>,
        category: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            category: category.into(),
            timestamp,
        }
    }

    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Destination of one artifact: the backend's archive root plus the
/// date-partitioned relative location under it.
#[derive(Debug, Clone)]
pub struct ArchivePath {
    pub archive_root: String,
    pub partition: String,
    pub file_name: String,
}

impl ArchivePath {
    /// Relative object key, `category/YYYY/M/D/filename`. Object-store
    /// backends use this directly; it is also what public URLs are built from.
    pub fn key(&self) -> String {
        format!("{}/{}", self.partition, self.file_name)
    }

    /// Absolute local destination under the archive root.
    pub fn full_path(&self) -> PathBuf {
        Path::new(&self.archive_root)
            .join(&self.partition)
            .join(&self.file_name)
    }

    /// Remote destination with forward slashes, for SFTP targets.
    pub fn remote_path(&self) -> String {
        let root = self.archive_root.trim_end_matches('/');
        if root.is_empty() {
            self.key()
        } else {
            format!("{}/{}", root, self.key())
        }
    }
}

/// Confirmed write location. Only produced after the backend acknowledged
/// the upload; `public_url` stays empty when the backend cannot serve one.
#[derive(Debug, Clone, Serialize)]
pub struct StorageLocation {
    pub kind: StorageKind,
    pub relative_path: String,
    pub public_url: Option<String>,
}

/// Age-based retention window for one system's archive tree.
/// `max_age_days == 0` disables sweeping.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub scope_root: String,
    pub max_age_days: u32,
}

impl RetentionPolicy {
    pub fn disabled() -> Self {
        Self {
            scope_root: String::new(),
            max_age_days: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_age_days >= 1
    }
}

/// Call metadata written by the recorder next to the audio file. Only
/// `start_time` matters here; everything else is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallMetadata {
    pub start_time: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Public URLs produced for one processed call, keyed by artifact type.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CallUrls {
    pub audio_wav_url: Option<String>,
    pub audio_m4a_url: Option<String>,
    pub audio_json_url: Option<String>,
}

impl CallUrls {
    /// Slot an archived URL by the artifact's file extension. Returns `false`
    /// when no slot exists for the extension, leaving the fields untouched.
    pub fn set(&mut self, extension: &str, url: Option<String>) -> bool {
        match extension {
            "wav" => self.audio_wav_url = url,
            "m4a" => self.audio_m4a_url = url,
            "json" => self.audio_json_url = url,
            _ => return false,
        }
        true
    }
}
