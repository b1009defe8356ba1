use crate::models::types::StorageKind;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn default_archive_extensions() -> Vec<String> {
    vec![".wav".to_string(), ".m4a".to_string(), ".json".to_string()]
}

fn default_scp_port() -> u16 {
    22
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

fn default_make_public() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub systems: HashMap<String, SystemConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    pub archive: ArchiveConfig,
}

/// Per-system archive settings. Credential blocks are optional at parse time
/// so a missing field surfaces as a construction-time configuration error
/// (storage disabled for that system), not as a failure to load the file.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub enabled: bool,
    pub storage_type: StorageKind,
    #[serde(default)]
    pub archive_path: String,
    /// `0` = no sweep, `>= 1` = sweep after upload, `-1` = delete the local
    /// artifacts immediately instead of archiving.
    #[serde(default)]
    pub archive_days: i64,
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,
    #[serde(default)]
    pub local: Option<LocalConfig>,
    #[serde(default)]
    pub scp: Option<ScpConfig>,
    #[serde(default)]
    pub aws_s3: Option<S3Config>,
    #[serde(default)]
    pub google_cloud: Option<GcsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScpConfig {
    pub host: Option<String>,
    #[serde(default = "default_scp_port")]
    pub port: u16,
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub bucket_name: Option<String>,
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// Host used both for the client endpoint and for public URLs,
    /// e.g. `s3.us-west-2.amazonaws.com`. Defaults to `s3.amazonaws.com`.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub path_style: bool,
    #[serde(default = "default_make_public")]
    pub make_public: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GcsConfig {
    pub credentials_file: Option<PathBuf>,
    pub project_id: Option<String>,
    pub bucket_name: Option<String>,
    #[serde(default = "default_make_public")]
    pub make_public: bool,
}

/// Sample configuration written on first run, one system covering every
/// backend block. Matches the shape the recorder's uploader expects.
const DEFAULT_CONFIG: &str = r#"{
  "systems": {
    "example_system": {
      "archive": {
        "enabled": false,
        "storage_type": "local",
        "archive_path": "/srv/trunk-archive",
        "archive_days": 0,
        "archive_extensions": [".wav", ".m4a", ".json"],
        "local": {
          "base_url": "https://cdn.example.com"
        },
        "scp": {
          "host": "",
          "port": 22,
          "user": "",
          "password": "",
          "private_key_path": "",
          "base_url": ""
        },
        "aws_s3": {
          "access_key_id": "",
          "secret_access_key": "",
          "bucket_name": "",
          "region": "us-east-1"
        },
        "google_cloud": {
          "credentials_file": "",
          "project_id": "",
          "bucket_name": ""
        }
      }
    }
  }
}
"#;

impl Config {
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("TR"))
            .build()?;

        settings.try_deserialize()
    }

    /// Write the sample configuration when none exists yet. Returns `true`
    /// when a file was created and the operator needs to edit it first.
    pub fn write_default_if_missing(path: &Path) -> std::io::Result<bool> {
        if path.exists() {
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, DEFAULT_CONFIG)?;
        Ok(true)
    }

    pub fn system(&self, short_name: &str) -> Option<&SystemConfig> {
        self.systems.get(short_name)
    }
}
