//! Trait for remote archive storage backends

use crate::models::error::{SweepError, UploadError};
use crate::models::types::{ArchivePath, StorageKind};
use std::path::Path;

/// One concrete storage target. All backends share the same contract:
/// a local file path in, a public URL (or none) out, plus an age-based
/// retention sweep over the archive tree.
#[async_trait::async_trait]
pub trait RemoteStorage: Send + Sync {
    fn kind(&self) -> StorageKind;

    /// Durably store `source` at `dest`. Returns the public URL once the
    /// backend has confirmed the write, or `None` when the backend cannot
    /// serve a public URL for it. Verifies the source exists before touching
    /// the network.
    async fn upload_file(
        &self,
        source: &Path,
        dest: &ArchivePath,
    ) -> Result<Option<String>, UploadError>;

    /// Delete entries under `scope_root` whose age in whole days is at least
    /// `max_age_days`, pruning directories that become empty on hierarchical
    /// backends. Returns the number of files removed.
    async fn clean_files(&self, scope_root: &str, max_age_days: u32) -> Result<u64, SweepError>;
}
