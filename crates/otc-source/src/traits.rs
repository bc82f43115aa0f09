//! 캔들 소스 trait 정의.

use std::time::Duration;

use async_trait::async_trait;
use otc_core::CandleQuery;
use serde_json::Value;

use crate::SourceError;

/// 소스 작업을 위한 Result 타입.
pub type SourceResult<T> = Result<T, SourceError>;

/// 소스별 시간 예산.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTimeouts {
    /// 단일 시도 제한
    pub attempt: Duration,
    /// 재시도를 포함한 전체 제한
    pub overall: Duration,
}

impl SourceTimeouts {
    pub fn from_secs(attempt: u64, overall: u64) -> Self {
        Self {
            attempt: Duration::from_secs(attempt),
            overall: Duration::from_secs(overall),
        }
    }

    /// 설정 값으로 덮어씁니다. 전체 제한은 시도 제한보다 짧아지지 않습니다.
    pub fn with_overrides(self, attempt_secs: Option<u64>, overall_secs: Option<u64>) -> Self {
        let attempt = attempt_secs.map(Duration::from_secs).unwrap_or(self.attempt);
        let overall = overall_secs
            .map(Duration::from_secs)
            .unwrap_or(self.overall)
            .max(attempt);
        Self { attempt, overall }
    }
}

/// 캔들 소스 어댑터.
///
/// 원시 레코드를 반환하며 정규화는 호출자가 담당합니다.
/// 반환 레코드 수는 `query.limit`을 넘지 않아야 합니다.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// 소스 이름 (로그/헬스 체크용).
    fn name(&self) -> &'static str;

    /// 소스 기본 시간 예산.
    fn default_timeouts(&self) -> SourceTimeouts;

    /// 캔들 원시 레코드 조회.
    async fn fetch(&self, query: &CandleQuery) -> SourceResult<Vec<Value>>;

    /// 보유 자원 정리 (브라우저 세션 등).
    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_overrides() {
        let base = SourceTimeouts::from_secs(15, 25);
        assert_eq!(base.with_overrides(None, None), base);

        let t = base.with_overrides(Some(30), None);
        assert_eq!(t.attempt, Duration::from_secs(30));
        assert_eq!(t.overall, Duration::from_secs(30));

        let t = base.with_overrides(Some(5), Some(9));
        assert_eq!(t, SourceTimeouts::from_secs(5, 9));
    }
}
