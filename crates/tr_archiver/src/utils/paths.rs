//! Date-partitioned archive paths and public URL construction

use crate::models::error::StorageConfigError;
use chrono::{DateTime, Datelike, Utc};
use url::Url;

/// Relative archive partition for an artifact: `category/YYYY/M/D`.
/// Month and day carry no zero padding, so the same recording always lands
/// on the same path regardless of the producing host's locale.
pub fn date_partition(category: &str, timestamp: i64) -> String {
    let date = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_default();
    format!(
        "{}/{}/{}/{}",
        category,
        date.year(),
        date.month(),
        date.day()
    )
}

/// Parse and validate a configured base URL. Rejects opaque URLs (e.g.
/// `mailto:`) that cannot carry path segments.
pub fn parse_base_url(raw: &str) -> Result<Url, StorageConfigError> {
    let url = Url::parse(raw).map_err(|source| StorageConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(StorageConfigError::OpaqueBaseUrl(raw.to_string()));
    }
    Ok(url)
}

/// Join a relative archive path onto a base URL, percent-encoding each
/// segment. A trailing slash on the base does not produce a double slash.
pub fn join_url(base: &Url, relative: &str) -> String {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(relative.split('/').filter(|s| !s.is_empty()));
    }
    url.to_string()
}
