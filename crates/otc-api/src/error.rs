//! 통합 API 에러 응답 타입.
//!
//! 모든 엔드포인트가 같은 에러 형식을 사용합니다.
//!
//! ```json
//! {
//!   "code": "INVALID_SYMBOL",
//!   "message": "invalid symbol: XYZ does not match the XXXYYY_OTC pattern",
//!   "timestamp": 1738300800
//! }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use otc_core::{ErrorKind, FetchError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

/// 통합 API 에러 응답.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "INVALID_SYMBOL", "UNAUTHORIZED")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// 상태 코드가 결정된 API 에러.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, body: ApiErrorResponse) -> Self {
        Self { status, body }
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ApiErrorResponse::new("UNAUTHORIZED", "Unauthorized"),
        )
    }

    /// 서비스 토큰이 설정되지 않은 배포.
    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorResponse::new("SERVICE_MISCONFIGURED", message),
        )
    }
}

/// 에러 종류별 HTTP 상태 코드.
pub fn status_for(error: &FetchError) -> StatusCode {
    match error.kind() {
        ErrorKind::InvalidSymbol | ErrorKind::InvalidInterval | ErrorKind::InvalidLimit => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::UpstreamBadResponse => match error.upstream_status() {
            Some(404) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_GATEWAY,
        },
        ErrorKind::MalformedUpstreamData => StatusCode::BAD_GATEWAY,
        ErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::NoData => StatusCode::NOT_FOUND,
        // 소스 자격증명 문제는 서비스 설정 문제
        ErrorKind::AuthenticationFailed | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            error!(kind = %err.kind(), error = %err, "Candle request failed");
        }

        let code = err.kind().as_str();
        let message = err.public_message();
        let body = match &err {
            FetchError::UpstreamBadResponse {
                status: upstream_status,
                body: upstream_text,
                ..
            } => ApiErrorResponse::with_details(
                code,
                message,
                json!({
                    "upstream_status": upstream_status,
                    "upstream_text": upstream_text,
                }),
            ),
            _ => ApiErrorResponse::new(code, message),
        };

        Self::new(status, body)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;
