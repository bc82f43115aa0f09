//! OTC 캔들 API 서버.
//!
//! 설정을 로드하고 캔들 소스를 선택한 뒤 Axum 서버를 시작합니다.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use otc_core::{init_logging, AppConfig, LogConfig, SharedClock, SystemClock};
use otc_data::CandleService;
use otc_source::build_source;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use otc_api::metrics::setup_metrics_recorder;
use otc_api::middleware::metrics_layer;
use otc_api::routes::create_api_router;
use otc_api::state::AppState;
use otc_api::sweeper::spawn_cache_sweeper;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<_> = origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let allow_origin = if parsed.is_empty() {
        if !origins.is_empty() {
            warn!("server.cors_origins contains no valid origins, allowing any");
        }
        AllowOrigin::any()
    } else {
        info!("CORS configured with {} allowed origins", parsed.len());
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600))
}

async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

fn create_router(state: AppState, metrics_handle: PrometheusHandle, config: &AppConfig) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router(state))
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.request_timeout_secs.max(1)),
        ))
        .layer(cors_layer(&config.server.cors_origins))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default()?;
    init_logging(LogConfig::from_settings(&config.logging))?;

    info!("Starting OTC candle API server...");

    let metrics_handle = setup_metrics_recorder()?;
    info!("Prometheus metrics recorder initialized");

    let clock: SharedClock = Arc::new(SystemClock);
    let source = build_source(&config, clock.clone()).map_err(|e| {
        error!(kind = %e.kind(), error = %e, "캔들 소스 생성 실패");
        e
    })?;

    let service = Arc::new(CandleService::from_config(&config, source, clock));
    let timeouts = service.timeouts();
    info!(
        source = service.source_name(),
        attempt_secs = timeouts.attempt.as_secs(),
        overall_secs = timeouts.overall.as_secs(),
        cache_ttl_ms = config.cache.ttl_ms,
        "Candle service initialized"
    );

    if config.auth.token.is_none() {
        warn!("auth.token is not set; /symbols and /candles will answer 500 SERVICE_MISCONFIGURED");
    }

    let state = AppState::new(Arc::clone(&service), config.auth.token.clone())
        .with_field_style(config.candles.field_style);
    info!(version = %state.version, "Application state initialized");

    let app = create_router(state, metrics_handle, &config);

    let shutdown_token = CancellationToken::new();
    let sweeper = spawn_cache_sweeper(
        Arc::clone(&service),
        Duration::from_secs(config.cache.sweep_interval_secs),
        shutdown_token.clone(),
    );

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!(
            address = %addr,
            error = %e,
            "소켓 바인딩 실패. server.host, server.port 설정을 확인하세요."
        );
        e
    })?;

    info!(%addr, "API server listening");
    info!("Metrics available at http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }

    // 브라우저 세션 등 소스 자원 정리
    if tokio::time::timeout(Duration::from_secs(10), service.shutdown())
        .await
        .is_err()
    {
        warn!("Cleanup timeout, forcing shutdown");
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
        _ = shutdown_token.cancelled() => {}
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated");
}
