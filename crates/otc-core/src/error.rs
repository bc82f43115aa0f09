//! 캔들 조회 파이프라인의 에러 타입.
//!
//! 모든 실패는 안정적인 종류 태그(`ErrorKind`)와 짧은 진단 메시지를 가집니다.
//! 메시지에는 자격증명, 스택 트레이스, 페이지 원문이 포함되지 않아야 합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 에러 종류 태그.
///
/// 프로그램 호출자가 분기할 수 있도록 직렬화 형태가 고정되어 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidSymbol,
    InvalidInterval,
    InvalidLimit,
    UpstreamUnavailable,
    UpstreamBadResponse,
    AuthenticationFailed,
    Timeout,
    MalformedUpstreamData,
    NotImplemented,
    NoData,
    Internal,
}

impl ErrorKind {
    /// 기본 재시도 대상. 입력/데이터 에러는 재시도해도 결과가 같습니다.
    pub const DEFAULT_RETRYABLE: [ErrorKind; 2] = [ErrorKind::Timeout, ErrorKind::UpstreamUnavailable];

    /// 고정된 태그 문자열을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidSymbol => "INVALID_SYMBOL",
            ErrorKind::InvalidInterval => "INVALID_INTERVAL",
            ErrorKind::InvalidLimit => "INVALID_LIMIT",
            ErrorKind::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            ErrorKind::UpstreamBadResponse => "UPSTREAM_BAD_RESPONSE",
            ErrorKind::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::MalformedUpstreamData => "MALFORMED_UPSTREAM_DATA",
            ErrorKind::NotImplemented => "NOT_IMPLEMENTED",
            ErrorKind::NoData => "NO_DATA",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 캔들 조회 에러.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// 허용되지 않거나 형식이 잘못된 심볼
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    /// 인식할 수 없는 간격
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    /// 잘못된 요청 개수
    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    /// 업스트림 미설정 또는 연결 불가
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// 업스트림이 응답했지만 사용할 수 없는 응답
    #[error("upstream bad response: {message}")]
    UpstreamBadResponse {
        /// 업스트림 HTTP 상태 코드 (있는 경우)
        status: Option<u16>,
        message: String,
        /// 진단용 업스트림 본문 (잘려서 저장됨)
        body: Option<String>,
    },

    /// 소스 측 인증 실패 (서비스 설정 문제)
    #[error("source authentication failed: {0}")]
    AuthenticationFailed(String),

    /// 시간 예산 초과
    #[error("timeout: {0}")]
    Timeout(String),

    /// 응답을 표준 캔들로 정규화할 수 없음
    #[error("malformed upstream data: {0}")]
    MalformedUpstreamData(String),

    /// 소스가 해당 기능을 지원하지 않음
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// 정상 응답이지만 캔들이 없음
    #[error("no data: {0}")]
    NoData(String),

    /// 예상하지 못한 내부 에러
    #[error("internal error: {0}")]
    Internal(String),
}

/// 캔들 조회를 위한 Result 타입.
pub type FetchResult<T> = Result<T, FetchError>;

impl FetchError {
    /// 에러 종류 태그를 반환합니다.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidSymbol(_) => ErrorKind::InvalidSymbol,
            FetchError::InvalidInterval(_) => ErrorKind::InvalidInterval,
            FetchError::InvalidLimit(_) => ErrorKind::InvalidLimit,
            FetchError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            FetchError::UpstreamBadResponse { .. } => ErrorKind::UpstreamBadResponse,
            FetchError::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            FetchError::Timeout(_) => ErrorKind::Timeout,
            FetchError::MalformedUpstreamData(_) => ErrorKind::MalformedUpstreamData,
            FetchError::NotImplemented(_) => ErrorKind::NotImplemented,
            FetchError::NoData(_) => ErrorKind::NoData,
            FetchError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 업스트림 HTTP 상태 코드 (`UpstreamBadResponse`인 경우).
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            FetchError::UpstreamBadResponse { status, .. } => *status,
            _ => None,
        }
    }

    /// 외부에 노출해도 안전한 메시지.
    ///
    /// 내부 에러는 상세 내용을 숨깁니다.
    pub fn public_message(&self) -> String {
        match self {
            FetchError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}
