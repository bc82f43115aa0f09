//! 캔들 조회 endpoint.
//!
//! `GET /candles?symbol=EURUSD_OTC&interval=1m&limit=200`
//!
//! 쿼리 값은 모두 문자열로 받아 조회 서비스의 검증 규칙을 그대로 적용합니다.
//! 숫자가 아닌 `limit`도 프레임워크 거부 대신 `INVALID_LIMIT`으로 응답합니다.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use otc_core::{parse_raw_limit, CandleFieldStyle, CandleSeries};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// 캔들 조회 쿼리 파라미터.
#[derive(Debug, Default, Deserialize)]
pub struct CandlesParams {
    pub symbol: Option<String>,
    pub interval: Option<String>,
    pub limit: Option<String>,
    /// 응답 필드 형태 덮어쓰기 (verbose | compact)
    pub style: Option<String>,
}

fn parse_style(raw: Option<&str>, default: CandleFieldStyle) -> CandleFieldStyle {
    raw.and_then(|s| s.parse().ok()).unwrap_or(default)
}

/// GET /candles
pub async fn get_candles(
    State(state): State<AppState>,
    Query(params): Query<CandlesParams>,
) -> ApiResult<Json<CandleSeries>> {
    let limit = parse_raw_limit(params.limit.as_deref())?;
    let style = parse_style(params.style.as_deref(), state.field_style);

    let series = state
        .service
        .fetch_series(
            params.symbol.as_deref().unwrap_or_default(),
            params.interval.as_deref(),
            limit,
            style,
        )
        .await?;

    Ok(Json(series))
}

pub fn candles_router() -> Router<AppState> {
    Router::new().route("/candles", get(get_candles))
}
