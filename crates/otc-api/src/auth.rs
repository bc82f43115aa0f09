//! 서비스 토큰 인증 미들웨어.
//!
//! `?token=` 쿼리 파라미터 또는 `Authorization: Bearer <token>` 헤더를 받습니다.
//! 서버에 토큰이 설정되지 않았으면 보호된 엔드포인트는 500을 반환합니다.

use axum::{
    extract::{Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// 토큰 쿼리 파라미터.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// 요청에서 제시된 토큰을 추출합니다. 쿼리 파라미터가 우선합니다.
pub fn presented_token<'a>(query: &'a TokenQuery, headers: &'a HeaderMap) -> Option<&'a str> {
    if let Some(token) = query.token.as_deref().filter(|t| !t.is_empty()) {
        return Some(token);
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// 타이밍 공격 방지를 위한 상수 시간 비교.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// 토큰을 검증합니다.
pub fn verify_token(state: &AppState, presented: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = state.token.as_ref() else {
        warn!("Protected endpoint called but no service token is configured");
        return Err(ApiError::misconfigured(
            "Service misconfigured: service token is empty",
        ));
    };

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), expected.expose_secret().as_bytes()) => {
            Ok(())
        }
        Some(_) => {
            debug!("토큰 불일치");
            Err(ApiError::unauthorized())
        }
        None => {
            debug!("토큰 없음");
            Err(ApiError::unauthorized())
        }
    }
}

/// 보호된 라우트에 적용하는 미들웨어.
pub async fn require_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    request: Request,
    next: Next,
) -> Response {
    match verify_token(&state, presented_token(&query, request.headers())) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
