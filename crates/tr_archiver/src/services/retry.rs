//! Retry wrapper for transient upload failures

use crate::models::error::UploadError;
use crate::models::types::StorageKind;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_SECS: u64 = 5;
const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 300;

/// Re-runs an upload on transient failures with a fixed backoff between
/// attempts. Auth, config and missing-source errors are returned as-is
/// since repeating them cannot succeed.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    max_attempts: u32,
    backoff: Duration,
    attempt_timeout: Duration,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_secs(DEFAULT_BACKOFF_SECS),
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
        }
    }
}

impl RetryExecutor {
    pub fn new(max_attempts: u32, backoff: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
            attempt_timeout,
        }
    }

    pub async fn execute<T, F, Fut>(
        &self,
        kind: StorageKind,
        target: &str,
        operation: F,
    ) -> Result<T, UploadError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, UploadError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            let outcome = match tokio::time::timeout(self.attempt_timeout, operation()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(UploadError::Transient(format!(
                    "upload attempt timed out after {}s",
                    self.attempt_timeout.as_secs()
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if e.is_transient() && attempt < self.max_attempts - 1 {
                        warn!(
                            backend = %kind,
                            target = %target,
                            attempt = attempt + 1,
                            backoff_ms = self.backoff.as_millis(),
                            error = %e,
                            "Retrying upload after backoff"
                        );
                        tokio::time::sleep(self.backoff).await;
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| UploadError::Transient("upload retries exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_retry() -> RetryExecutor {
        RetryExecutor::new(3, Duration::from_secs(5), Duration::from_secs(300))
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_get_three_attempts_with_fixed_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let start = tokio::time::Instant::now();

        let result = fast_retry()
            .execute(StorageKind::Local, "countyA/2024/3/5/call123.wav", move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(UploadError::Transient("connection reset".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(UploadError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_errors_fail_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let start = tokio::time::Instant::now();

        let result = fast_retry()
            .execute(StorageKind::Scp, "countyA/2024/3/5/call123.wav", move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(UploadError::Auth("bad key".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(UploadError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_source_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = fast_retry()
            .execute(StorageKind::Local, "countyA/2024/3/5/call123.wav", move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(UploadError::SourceMissing(PathBuf::from("/tmp/call123.wav")))
                }
            })
            .await;

        assert!(matches!(result, Err(UploadError::SourceMissing(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_a_later_attempt_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = fast_retry()
            .execute(StorageKind::AwsS3, "countyA/2024/3/5/call123.wav", move || {
                let counter = Arc::clone(&counter);
                async move {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt < 2 {
                        Err(UploadError::Transient("throttled".to_string()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_time_out_as_transient() {
        let retry = RetryExecutor::new(2, Duration::from_secs(5), Duration::from_secs(1));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = retry
            .execute(StorageKind::Scp, "countyA/2024/3/5/call123.wav", move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(600)).await;
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(UploadError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
