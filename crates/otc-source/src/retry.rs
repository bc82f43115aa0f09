//! 소스 호출 재시도 정책.
//!
//! 고정 대기 간격으로 제한된 횟수만큼 재시도합니다.
//! 재시도 대상은 에러 종류로 지정하며 기본값은 `Timeout`, `UpstreamUnavailable` 입니다.
//!
//! # 예시
//!
//! ```rust,ignore
//! use otc_source::retry::RetryPolicy;
//!
//! let policy = RetryPolicy::default();
//! let raw = policy.run(|| source.fetch(&query)).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use otc_core::ErrorKind;
use tracing::{debug, warn};

use crate::error::SourceError;

/// 재시도 정책.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (최초 시도 포함, 최소 1).
    pub max_attempts: u32,
    /// 시도 간 고정 대기 시간.
    pub backoff: Duration,
    /// 재시도할 에러 종류.
    pub retry_on: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
            retry_on: ErrorKind::DEFAULT_RETRYABLE.to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            ..Default::default()
        }
    }

    /// 재시도 없음 (단일 시도).
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// 재시도 대상 에러 종류를 바꿉니다.
    pub fn with_retry_on(mut self, kinds: Vec<ErrorKind>) -> Self {
        self.retry_on = kinds;
        self
    }

    /// 재시도 대상인지 확인합니다.
    pub fn should_retry(&self, error: &SourceError) -> bool {
        self.retry_on.contains(&error.kind())
    }

    /// 작업을 정책에 따라 실행합니다.
    ///
    /// 모든 시도가 실패하면 마지막 에러를 반환합니다.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(attempts = attempt, "재시도 후 성공");
                    }
                    return Ok(result);
                }
                Err(e) if attempt < max_attempts && self.should_retry(&e) => {
                    warn!(
                        attempt,
                        max_attempts,
                        kind = %e.kind(),
                        error = %e,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "재시도 가능한 소스 에러, 대기 후 재시도"
                    );
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 || self.should_retry(&e) {
                        warn!(attempts = attempt, kind = %e.kind(), error = %e, "재시도 한도 도달 또는 재시도 불가 에러");
                    } else {
                        debug!(kind = %e.kind(), error = %e, "재시도 불가능한 에러, 즉시 실패 반환");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(500));

        let started = tokio::time::Instant::now();
        let result = policy
            .run(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(SourceError::Timeout("slow".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(2, Duration::from_millis(10));

        let result: Result<(), _> = policy
            .run(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::UpstreamUnavailable("down".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(SourceError::UpstreamUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();

        let result: Result<(), _> = policy
            .run(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::AuthenticationFailed("bad key".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_retry_kinds() {
        let policy = RetryPolicy::new(3, Duration::ZERO)
            .with_retry_on(vec![ErrorKind::UpstreamBadResponse]);
        assert!(policy.should_retry(&SourceError::bad_response(Some(502), "gw", None)));
        assert!(!policy.should_retry(&SourceError::Timeout("t".into())));
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }
}
