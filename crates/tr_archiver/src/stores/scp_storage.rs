//! SFTP-backed ("SCP") archive backend
//!
//! Every call opens its own SSH session on the blocking thread pool and
//! closes it on all exit paths when the session handle drops.

use crate::config::ArchiveConfig;
use crate::models::error::{StorageConfigError, SweepError, UploadError};
use crate::models::types::{ArchivePath, StorageKind};
use crate::stores::storage_trait::RemoteStorage;
use crate::stores::{require_str, source_metadata};
use crate::utils::{paths, retention};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use ssh2::{Session, Sftp};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;
use tracing::{debug, info, warn};
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
// Bounds every blocking SSH operation so a stalled transfer cannot pin a
// blocking-pool thread past the per-attempt upload timeout.
const SESSION_TIMEOUT_MS: u32 = 30_000;

pub struct ScpStorage {
    host: String,
    port: u16,
    user: String,
    password: Option<SecretString>,
    private_key_path: Option<PathBuf>,
    base_url: Url,
}

impl ScpStorage {
    pub fn new(config: &ArchiveConfig) -> Result<Self, StorageConfigError> {
        let scp = config
            .scp
            .as_ref()
            .ok_or(StorageConfigError::MissingSection(StorageKind::Scp))?;

        // Without a remote root, uploads would land home-relative while the
        // sweep scope resolves to an absolute path that never matches them.
        if config.archive_path.is_empty() {
            return Err(StorageConfigError::MissingField {
                kind: StorageKind::Scp,
                field: "archive_path",
            });
        }

        let host = require_str(&scp.host, StorageKind::Scp, "host")?.to_string();
        let user = require_str(&scp.user, StorageKind::Scp, "user")?.to_string();
        let base_raw = require_str(&scp.base_url, StorageKind::Scp, "base_url")?;
        let base_url = paths::parse_base_url(base_raw)?;

        let password = scp
            .password
            .as_ref()
            .filter(|p| !p.expose_secret().is_empty())
            .cloned();
        let private_key_path = scp
            .private_key_path
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
            .cloned();

        if password.is_none() && private_key_path.is_none() {
            return Err(StorageConfigError::MissingField {
                kind: StorageKind::Scp,
                field: "password or private_key_path",
            });
        }

        Ok(Self {
            host,
            port: scp.port,
            user,
            password,
            private_key_path,
            base_url,
        })
    }
}

fn open_session(
    host: &str,
    port: u16,
    user: &str,
    password: Option<&str>,
    private_key_path: Option<&Path>,
) -> Result<Session, UploadError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| UploadError::Transient(format!("Failed to resolve {host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| UploadError::Transient(format!("No address found for {host}:{port}")))?;

    let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
        .map_err(|e| UploadError::Transient(format!("Failed to connect to {host}:{port}: {e}")))?;

    let mut session = Session::new()
        .map_err(|e| UploadError::Backend(format!("Failed to create SSH session: {e}")))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(SESSION_TIMEOUT_MS);
    session
        .handshake()
        .map_err(|e| UploadError::Transient(format!("SSH handshake with {host} failed: {e}")))?;

    if let Some(key) = private_key_path {
        if key.exists() {
            if let Err(e) = session.userauth_pubkey_file(user, None, key, None) {
                debug!(key = %key.display(), error = %e, "Key authentication failed, falling back to password");
            }
        } else {
            debug!(key = %key.display(), "Configured private key not readable, falling back to password");
        }
    }

    if !session.authenticated() {
        if let Some(pw) = password {
            if let Err(e) = session.userauth_password(user, pw) {
                return Err(UploadError::Auth(format!(
                    "Password authentication for {user}@{host} rejected: {e}"
                )));
            }
        }
    }

    if !session.authenticated() {
        return Err(UploadError::Auth(format!(
            "No accepted authentication method for {user}@{host}"
        )));
    }

    Ok(session)
}

/// Walk the destination path segment by segment, creating anything `stat`
/// reports missing. Concurrent uploads race on `mkdir`; the directory
/// existing afterwards is all that matters.
fn ensure_remote_dir(sftp: &Sftp, dir: &str) -> Result<(), UploadError> {
    let mut current = if dir.starts_with('/') {
        String::from("/")
    } else {
        String::new()
    };

    for segment in dir.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(segment);

        let path = Path::new(&current);
        if sftp.stat(path).is_err() {
            if let Err(e) = sftp.mkdir(path, 0o755) {
                if sftp.stat(path).is_err() {
                    return Err(UploadError::Backend(format!(
                        "Cannot create remote directory {current}: {e}"
                    )));
                }
            }
        }
    }

    Ok(())
}

fn sweep_remote_dir(
    sftp: &Sftp,
    dir: &Path,
    now: DateTime<Utc>,
    max_age_days: u32,
    deleted: &mut u64,
) -> Result<(), SweepError> {
    let entries = sftp
        .readdir(dir)
        .map_err(|e| SweepError::Backend(format!("Failed to list {}: {e}", dir.display())))?;

    for (path, stat) in entries {
        if stat.is_dir() {
            sweep_remote_dir(sftp, &path, now, max_age_days, deleted)?;
            // Fails while entries remain, which is indistinguishable from a
            // concurrent writer adding files mid-sweep; ignored either way.
            let _ = sftp.rmdir(&path);
        } else if stat.is_file() {
            if let Some(mtime) = stat.mtime {
                if let Some(modified) = DateTime::<Utc>::from_timestamp(mtime as i64, 0) {
                    if retention::is_expired(now, modified, max_age_days) {
                        match sftp.unlink(&path) {
                            Ok(()) => *deleted += 1,
                            Err(e) => {
                                warn!(path = %path.display(), error = %e, "Failed to remove aged remote file")
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

#[async_trait::async_trait]
impl RemoteStorage for ScpStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Scp
    }

    async fn upload_file(
        &self,
        source: &Path,
        dest: &ArchivePath,
    ) -> Result<Option<String>, UploadError> {
        let metadata = source_metadata(source).await?;
        let size = metadata.len();

        let host = self.host.clone();
        let port = self.port;
        let user = self.user.clone();
        let password = self.password.clone();
        let key_path = self.private_key_path.clone();
        let source_path = source.to_path_buf();
        let remote_path = dest.remote_path();
        let remote_target = remote_path.clone();

        task::spawn_blocking(move || -> Result<(), UploadError> {
            let session = open_session(
                &host,
                port,
                &user,
                password.as_ref().map(|p| p.expose_secret().as_str()),
                key_path.as_deref(),
            )?;
            let sftp = session
                .sftp()
                .map_err(|e| UploadError::Transient(format!("Failed to open SFTP channel: {e}")))?;

            if let Some(dir) = remote_target.rsplit_once('/').map(|(dir, _)| dir) {
                ensure_remote_dir(&sftp, dir)?;
            }

            let mut local = std::fs::File::open(&source_path).map_err(UploadError::IoError)?;
            let mut remote = sftp.create(Path::new(&remote_target)).map_err(|e| {
                UploadError::Transient(format!("Failed to create remote file {remote_target}: {e}"))
            })?;
            std::io::copy(&mut local, &mut remote).map_err(|e| {
                UploadError::Transient(format!("Transfer to {remote_target} failed: {e}"))
            })?;

            Ok(())
        })
        .await
        .map_err(|e| UploadError::Transient(format!("SFTP upload task failed: {e}")))??;

        let url = paths::join_url(&self.base_url, &dest.key());
        info!(host = %self.host, dest = %remote_path, size, url = %url, "Artifact archived via SFTP");
        Ok(Some(url))
    }

    async fn clean_files(&self, scope_root: &str, max_age_days: u32) -> Result<u64, SweepError> {
        let host = self.host.clone();
        let port = self.port;
        let user = self.user.clone();
        let password = self.password.clone();
        let key_path = self.private_key_path.clone();
        let scope = scope_root.to_string();

        let deleted = task::spawn_blocking(move || -> Result<u64, SweepError> {
            let session = open_session(
                &host,
                port,
                &user,
                password.as_ref().map(|p| p.expose_secret().as_str()),
                key_path.as_deref(),
            )
            .map_err(|e| match e {
                UploadError::Auth(message) => SweepError::Auth(message),
                other => SweepError::Backend(other.to_string()),
            })?;
            let sftp = session
                .sftp()
                .map_err(|e| SweepError::Backend(format!("Failed to open SFTP channel: {e}")))?;

            let root = Path::new(&scope);
            if sftp.stat(root).is_err() {
                return Ok(0);
            }

            let now = Utc::now();
            let mut deleted = 0u64;
            sweep_remote_dir(&sftp, root, now, max_age_days, &mut deleted)?;
            Ok(deleted)
        })
        .await
        .map_err(|e| SweepError::Backend(format!("SFTP sweep task failed: {e}")))??;

        if deleted > 0 {
            info!(host = %self.host, root = %scope_root, deleted, "Removed aged remote files");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScpConfig;

    fn scp_config() -> ArchiveConfig {
        ArchiveConfig {
            enabled: true,
            storage_type: StorageKind::Scp,
            archive_path: "/srv/archive".to_string(),
            archive_days: 0,
            archive_extensions: vec![".wav".to_string()],
            local: None,
            scp: Some(ScpConfig {
                host: Some("radio.example.com".to_string()),
                port: 22,
                user: Some("uploader".to_string()),
                password: Some(SecretString::new("hunter2".to_string())),
                private_key_path: None,
                base_url: Some("https://radio.example.com/audio".to_string()),
            }),
            aws_s3: None,
            google_cloud: None,
        }
    }

    #[test]
    fn construction_requires_host_and_user() {
        let mut config = scp_config();
        config.scp.as_mut().unwrap().host = None;
        assert!(matches!(
            ScpStorage::new(&config),
            Err(StorageConfigError::MissingField { field: "host", .. })
        ));

        let mut config = scp_config();
        config.scp.as_mut().unwrap().user = Some(String::new());
        assert!(matches!(
            ScpStorage::new(&config),
            Err(StorageConfigError::MissingField { field: "user", .. })
        ));
    }

    #[test]
    fn construction_requires_an_archive_path() {
        let mut config = scp_config();
        config.archive_path = String::new();
        assert!(matches!(
            ScpStorage::new(&config),
            Err(StorageConfigError::MissingField {
                field: "archive_path",
                ..
            })
        ));
    }

    #[test]
    fn construction_requires_some_credential() {
        let mut config = scp_config();
        config.scp.as_mut().unwrap().password = None;
        config.scp.as_mut().unwrap().private_key_path = Some(PathBuf::new());
        assert!(matches!(
            ScpStorage::new(&config),
            Err(StorageConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn construction_requires_a_parseable_base_url() {
        let mut config = scp_config();
        config.scp.as_mut().unwrap().base_url = Some("not a url".to_string());
        assert!(matches!(
            ScpStorage::new(&config),
            Err(StorageConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn missing_section_is_reported() {
        let mut config = scp_config();
        config.scp = None;
        assert!(matches!(
            ScpStorage::new(&config),
            Err(StorageConfigError::MissingSection(StorageKind::Scp))
        ));
    }

    // The source check runs before any SSH session is opened, so a missing
    // file must fail fast even though the configured host is unreachable.
    #[tokio::test]
    async fn missing_source_fails_without_opening_a_session() {
        let store = ScpStorage::new(&scp_config()).unwrap();
        let dest = ArchivePath {
            archive_root: "/srv/archive".to_string(),
            partition: "countyA/2024/3/5".to_string(),
            file_name: "call123.wav".to_string(),
        };

        let result = store
            .upload_file(Path::new("/nonexistent/call123.wav"), &dest)
            .await;

        assert!(matches!(result, Err(UploadError::SourceMissing(_))));
    }
}
