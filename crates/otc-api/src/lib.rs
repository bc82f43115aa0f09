//! OTC 캔들 HTTP API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API (`/health`, `/symbols`, `/candles`)
//! - 서비스 토큰 인증
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 서비스 토큰 검증
//! - [`error`]: 에러 응답 형식과 상태 코드 매핑
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`sweeper`]: 캐시 만료 항목 주기 정리

pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod sweeper;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use routes::create_api_router;
pub use state::AppState;
pub use sweeper::spawn_cache_sweeper;

#[cfg(test)]
pub use state::create_test_state;
