//! 라우터 통합 테스트 (oneshot).

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use otc_api::{create_api_router, AppState};
use otc_core::{ManualClock, SharedClock};
use otc_data::{CandleService, ResultCache};
use otc_source::{CandleSource, MockSource, ProxySource, RetryPolicy};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

const T0: i64 = 1_699_999_980;
const TOKEN: &str = "s3cret";

fn app_with(source: Arc<dyn CandleSource>, token: Option<&str>) -> Router {
    let clock: SharedClock = Arc::new(ManualClock::at_secs(T0));
    let cache = Arc::new(ResultCache::new(clock, Duration::from_secs(2)));
    let service =
        Arc::new(CandleService::new(source, cache).with_retry(RetryPolicy::no_retry()));
    let token = token.map(|t| SecretString::new(t.into()));
    create_api_router(AppState::new(service, token))
}

fn mock_app() -> Router {
    let clock: SharedClock = Arc::new(ManualClock::at_secs(T0));
    app_with(Arc::new(MockSource::new(clock)), Some(TOKEN))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_candles_end_to_end_with_mock() {
    let (status, body) = get(
        mock_app(),
        "/candles?symbol=EURUSD_OTC&interval=1m&limit=3&token=s3cret",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "EURUSD_OTC");
    assert_eq!(body["interval"], "1m");

    let candles = body["candles"].as_array().unwrap();
    let ts: Vec<i64> = candles.iter().map(|c| c["ts"].as_i64().unwrap()).collect();
    assert_eq!(ts, vec![T0 - 120, T0 - 60, T0]);
    for c in candles {
        let (o, h, l, cl) = (
            c["open"].as_f64().unwrap(),
            c["high"].as_f64().unwrap(),
            c["low"].as_f64().unwrap(),
            c["close"].as_f64().unwrap(),
        );
        assert!(l <= o.min(cl) && h >= o.max(cl));
    }
}

#[tokio::test]
async fn test_bearer_header_and_compact_style() {
    let request = Request::builder()
        .uri("/candles?symbol=gbpusd_otc&limit=2&style=compact")
        .header(AUTHORIZATION, format!("Bearer {}", TOKEN))
        .body(Body::empty())
        .unwrap();

    let response = mock_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["symbol"], "GBPUSD_OTC");
    assert_eq!(json["candles"][1]["t"], T0);
}

#[tokio::test]
async fn test_missing_or_wrong_token_is_401() {
    let (status, body) = get(mock_app(), "/candles?symbol=EURUSD_OTC").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = get(mock_app(), "/symbols?token=wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unconfigured_token_is_500() {
    let clock: SharedClock = Arc::new(ManualClock::at_secs(T0));
    let app = app_with(Arc::new(MockSource::new(clock)), None);

    let (status, body) = get(app, "/symbols?token=anything").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "SERVICE_MISCONFIGURED");
}

#[tokio::test]
async fn test_health_is_public() {
    let (status, body) = get(mock_app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_symbols_listing() {
    let (status, body) = get(mock_app(), "/symbols?token=s3cret").await;
    assert_eq!(status, StatusCode::OK);
    let symbols = body["symbols"].as_array().unwrap();
    assert!(symbols.iter().any(|s| s == "EURUSD_OTC"));
}

#[tokio::test]
async fn test_input_errors_are_400() {
    for (uri, code) in [
        ("/candles?symbol=XYZ&token=s3cret", "INVALID_SYMBOL"),
        ("/candles?token=s3cret", "INVALID_SYMBOL"),
        ("/candles?symbol=EURUSD_OTC&interval=7m&token=s3cret", "INVALID_INTERVAL"),
        ("/candles?symbol=EURUSD_OTC&limit=0&token=s3cret", "INVALID_LIMIT"),
        ("/candles?symbol=EURUSD_OTC&limit=abc&token=s3cret", "INVALID_LIMIT"),
    ] {
        let (status, body) = get(mock_app(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["code"], code, "{}", uri);
    }
}

#[tokio::test]
async fn test_large_limit_is_clamped() {
    let (status, body) = get(
        mock_app(),
        "/candles?symbol=EURUSD_OTC&limit=10000&token=s3cret",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["candles"].as_array().unwrap().len(), 500);
}

#[tokio::test]
async fn test_proxy_upstream_404_maps_to_404() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/candles")
        .match_query(mockito::Matcher::Any)
        .with_status(404)
        .with_body("unknown symbol")
        .create_async()
        .await;

    let source = ProxySource::new(Some(server.url())).unwrap();
    let app = app_with(Arc::new(source), Some(TOKEN));

    let (status, body) = get(app, "/candles?symbol=EURUSD_OTC&token=s3cret").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "UPSTREAM_BAD_RESPONSE");
    assert_eq!(body["details"]["upstream_status"], 404);
}

#[tokio::test]
async fn test_unconfigured_proxy_is_503() {
    let source = ProxySource::new(None).unwrap();
    let app = app_with(Arc::new(source), Some(TOKEN));

    let (status, body) = get(app, "/candles?symbol=EURUSD_OTC&token=s3cret").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "UPSTREAM_UNAVAILABLE");
}

