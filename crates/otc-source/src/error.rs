//! 소스 어댑터 에러 타입.

use otc_core::{ErrorKind, FetchError};
use thiserror::Error;

/// 진단용으로 보관하는 업스트림 본문 최대 길이 (문자 수).
pub const MAX_BODY_CHARS: usize = 512;

/// 소스 어댑터 에러.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// 미설정 또는 연결 불가
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// 업스트림이 사용할 수 없는 응답을 반환
    #[error("Upstream bad response: {message}")]
    UpstreamBadResponse {
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },

    /// 소스 자격증명 누락 또는 거부
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// 시간 예산 초과
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 소스가 지원하지 않는 요청
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl SourceError {
    /// 상태 코드와 본문이 있는 응답 에러를 생성합니다. 본문은 잘려서 저장됩니다.
    pub fn bad_response(status: Option<u16>, message: impl Into<String>, body: Option<&str>) -> Self {
        SourceError::UpstreamBadResponse {
            status,
            message: message.into(),
            body: body.map(truncate_body),
        }
    }

    /// 에러 종류 태그.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            SourceError::UpstreamBadResponse { .. } => ErrorKind::UpstreamBadResponse,
            SourceError::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            SourceError::Timeout(_) => ErrorKind::Timeout,
            SourceError::NotImplemented(_) => ErrorKind::NotImplemented,
        }
    }
}

/// 본문을 최대 길이로 자릅니다 (문자 경계 유지).
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_CHARS {
        body.to_string()
    } else {
        let mut truncated: String = body.chars().take(MAX_BODY_CHARS).collect();
        truncated.push_str("...");
        truncated
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        // URL에 API 키가 들어갈 수 있으므로 제거
        let err = err.without_url();
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            SourceError::UpstreamUnavailable(err.to_string())
        } else if err.is_decode() {
            SourceError::bad_response(None, format!("Undecodable upstream body: {}", err), None)
        } else {
            SourceError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<SourceError> for FetchError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::UpstreamUnavailable(msg) => FetchError::UpstreamUnavailable(msg),
            SourceError::UpstreamBadResponse {
                status,
                message,
                body,
            } => FetchError::UpstreamBadResponse {
                status,
                message,
                body,
            },
            SourceError::AuthenticationFailed(msg) => FetchError::AuthenticationFailed(msg),
            SourceError::Timeout(msg) => FetchError::Timeout(msg),
            SourceError::NotImplemented(msg) => FetchError::NotImplemented(msg),
        }
    }
}
