//! 캔들 조회 명령.
//!
//! 서버와 같은 조회 서비스를 한 번 구성해 한 건을 조회하고 종료합니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use otc_core::{AppConfig, CandleFieldStyle, CandleSeries, SharedClock, SourceKind, SystemClock};
use otc_data::CandleService;
use otc_source::build_source_of_kind;
use tracing::info;

/// 조회 설정.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub symbol: String,
    pub interval: Option<String>,
    pub limit: Option<i64>,
    /// 설정 파일의 소스 종류 덮어쓰기
    pub source: Option<SourceKind>,
    /// 설정 파일의 필드 형태 덮어쓰기
    pub style: Option<CandleFieldStyle>,
}

/// 캔들을 조회합니다.
pub async fn run_fetch(
    app_config: &AppConfig,
    config: &FetchConfig,
    clock: SharedClock,
) -> Result<CandleSeries> {
    let kind = config.source.unwrap_or(app_config.source.kind);
    let source = build_source_of_kind(kind, &app_config.source, clock.clone())
        .with_context(|| format!("failed to build '{}' source", kind.as_str()))?;

    let service = CandleService::from_config(app_config, source, clock);
    let style = config.style.unwrap_or(app_config.candles.field_style);

    info!(
        symbol = %config.symbol,
        source = service.source_name(),
        "Fetching candles"
    );

    let result = service
        .fetch_series(
            &config.symbol,
            config.interval.as_deref(),
            config.limit,
            style,
        )
        .await;
    service.shutdown().await;

    let series = result.map_err(|e| anyhow::anyhow!("[{}] {}", e.kind(), e.public_message()))?;
    info!(count = series.candles.len(), "캔들 조회 완료");
    Ok(series)
}

/// 기본 시스템 시계로 조회합니다.
pub async fn run_fetch_now(app_config: &AppConfig, config: &FetchConfig) -> Result<CandleSeries> {
    let clock: SharedClock = Arc::new(SystemClock);
    run_fetch(app_config, config, clock).await
}
