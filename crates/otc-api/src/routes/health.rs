//! 헬스 체크 endpoint.
//!
//! 인증 없이 호출할 수 있으며 로드밸런서/오케스트레이터가 사용합니다.

use axum::{extract::State, routing::get, Json, Router};
use otc_data::CacheStats;
use serde::Serialize;

use crate::state::AppState;

/// 헬스 체크 응답.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// API 버전
    pub version: String,
    /// 선택된 캔들 소스
    pub source: &'static str,
    /// 서버 업타임(초)
    pub uptime_secs: u64,
    /// 결과 캐시 통계
    pub cache: CacheStats,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: state.version.clone(),
        source: state.service.source_name(),
        uptime_secs: state.uptime_secs(),
        cache: state.service.cache_stats(),
    })
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let app = health_router().with_state(create_test_state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["ok"], true);
        assert_eq!(health["source"], "mock");
        assert_eq!(health["cache"]["hits"], 0);
    }
}
