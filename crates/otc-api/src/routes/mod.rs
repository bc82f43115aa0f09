//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (인증 없음)
//! - `/symbols` - 지원 심볼 목록 (토큰 필요)
//! - `/candles` - 캔들 조회 (토큰 필요)
//!
//! `/metrics`는 별도 상태(PrometheusHandle)를 쓰므로 `main`에서 병합합니다.

pub mod candles;
pub mod health;
pub mod symbols;

use axum::{middleware, Router};

pub use candles::{candles_router, CandlesParams};
pub use health::{health_router, HealthResponse};
pub use symbols::{symbols_router, SymbolsResponse};

use crate::auth::require_token;
use crate::state::AppState;

/// 전체 API 라우터를 생성합니다.
pub fn create_api_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(symbols_router())
        .merge(candles_router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .merge(health_router())
        .merge(protected)
        .with_state(state)
}
