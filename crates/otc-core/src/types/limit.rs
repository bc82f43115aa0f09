//! 요청 캔들 개수 정책.

use crate::error::FetchError;

/// 기본 요청 개수.
pub const DEFAULT_LIMIT: usize = 200;

/// 기본 최대 요청 개수.
pub const DEFAULT_MAX_LIMIT: usize = 500;

/// 캔들 개수 정책.
///
/// 0 이하는 에러, 최대값 초과는 조용히 잘라냅니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    pub default: usize,
    pub max: usize,
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self {
            default: DEFAULT_LIMIT,
            max: DEFAULT_MAX_LIMIT,
        }
    }
}

impl LimitPolicy {
    /// 새 정책 생성. 최대값은 최소 1, 기본값은 `[1, max]` 범위로 보정됩니다.
    pub fn new(default: usize, max: usize) -> Self {
        let max = max.max(1);
        Self {
            default: default.clamp(1, max),
            max,
        }
    }

    /// 요청 개수를 결정합니다.
    pub fn resolve(&self, raw: Option<i64>) -> Result<usize, FetchError> {
        match raw {
            None => Ok(self.default),
            Some(n) if n <= 0 => Err(FetchError::InvalidLimit(format!(
                "limit must be positive, got {}",
                n
            ))),
            Some(n) => Ok((n as u64).min(self.max as u64) as usize),
        }
    }
}

/// 문자열 limit(쿼리 파라미터 등)을 정수로 변환합니다.
///
/// 비어 있으면 `None`이며, 범위 검증은 [`LimitPolicy::resolve`]가 맡습니다.
pub fn parse_raw_limit(raw: Option<&str>) -> Result<Option<i64>, FetchError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s.parse::<i64>().map(Some).map_err(|_| {
            FetchError::InvalidLimit(format!(
                "limit must be an integer, got '{}'",
                s.chars().take(16).collect::<String>()
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_limit_default_and_clamp() {
        let policy = LimitPolicy::default();
        assert_eq!(policy.resolve(None).unwrap(), 200);
        assert_eq!(policy.resolve(Some(10_000)).unwrap(), 500);
        assert_eq!(policy.resolve(Some(3)).unwrap(), 3);
    }

    #[test]
    fn test_limit_rejects_non_positive() {
        let policy = LimitPolicy::default();
        assert!(matches!(
            policy.resolve(Some(0)),
            Err(FetchError::InvalidLimit(_))
        ));
        assert!(policy.resolve(Some(-5)).is_err());
    }

    #[test]
    fn test_parse_raw_limit() {
        assert_eq!(parse_raw_limit(None).unwrap(), None);
        assert_eq!(parse_raw_limit(Some(" ")).unwrap(), None);
        assert_eq!(parse_raw_limit(Some(" 7 ")).unwrap(), Some(7));
        assert_eq!(parse_raw_limit(Some("-3")).unwrap(), Some(-3));
        assert!(matches!(
            parse_raw_limit(Some("ten")),
            Err(FetchError::InvalidLimit(_))
        ));

        let policy = LimitPolicy::new(50, 100);
        let resolved = parse_raw_limit(Some("1000")).and_then(|n| policy.resolve(n));
        assert_eq!(resolved.unwrap(), 100);
    }

    #[test]
    fn test_limit_new_normalises_bounds() {
        let policy = LimitPolicy::new(1_000, 0);
        assert_eq!(policy.max, 1);
        assert_eq!(policy.default, 1);
    }

    proptest! {
        #[test]
        fn prop_resolved_limit_in_range(n in 1i64..1_000_000) {
            let policy = LimitPolicy::default();
            let limit = policy.resolve(Some(n)).unwrap();
            prop_assert!(limit >= 1 && limit <= policy.max);
        }
    }
}
