//! 심볼 목록 endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// 심볼 목록 응답.
#[derive(Debug, Serialize)]
pub struct SymbolsResponse {
    pub symbols: Vec<String>,
}

/// GET /symbols
pub async fn list_symbols(State(state): State<AppState>) -> Json<SymbolsResponse> {
    Json(SymbolsResponse {
        symbols: state.service.symbol_policy().listing(),
    })
}

pub fn symbols_router() -> Router<AppState> {
    Router::new().route("/symbols", get(list_symbols))
}
