//! 캔들 조회 오케스트레이터.
//!
//! 입력 검증, 캐시, 소스 호출(시간 제한 + 재시도), 정규화를 하나의 흐름으로 묶습니다.
//!
//! # 동작 흐름
//!
//! ```text
//! 요청 (symbol, interval?, limit?)
//!         │
//! ┌───────▼────────────┐
//! │ 1. 입력 정규화/검증  │ ← 실패 시 INVALID_* (재시도 없음)
//! └───────┬────────────┘
//!         │
//!   ┌─────┴─────┐
//!   │ 캐시 적중? │── YES ──▶ 즉시 반환
//!   └─────┬─────┘
//!         │ NO
//! ┌───────▼────────────────────────┐
//! │ 2. 전체 제한 ⊃ 재시도 ⊃ 시도 제한 │
//! │    source.fetch(query)          │
//! └───────┬────────────────────────┘
//!         │
//! ┌───────▼────────────┐
//! │ 3. 정규화           │ ← MALFORMED_UPSTREAM_DATA
//! └───────┬────────────┘
//!         │
//!   ┌─────┴─────┐
//!   │ 비어있음?  │── YES ──▶ NO_DATA (캐시 안 함)
//!   └─────┬─────┘
//!         │ NO
//! ┌───────▼────────────┐
//! │ 4. 캐시 저장 후 반환 │
//! └────────────────────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use otc_core::{
    normalize, AppConfig, Candle, CandleFieldStyle, CandleQuery, CandleSeries, FetchError,
    IntervalPolicy, LimitPolicy, SharedClock, SymbolPolicy,
};
use otc_source::{
    resolve_timeouts, retry_policy, CandleSource, RetryPolicy, SourceError, SourceTimeouts,
};
use tracing::{debug, info, instrument, warn, Instrument};

use crate::cache::{CacheStats, ResultCache};

/// 캔들 조회 서비스.
///
/// 소스와 캐시는 생성 시 주입되며 이후 교체되지 않습니다.
pub struct CandleService {
    source: Arc<dyn CandleSource>,
    cache: Arc<ResultCache>,
    symbols: SymbolPolicy,
    intervals: IntervalPolicy,
    limits: LimitPolicy,
    retry: RetryPolicy,
    timeouts: SourceTimeouts,
}

impl CandleService {
    /// 기본 정책으로 서비스를 생성합니다.
    ///
    /// 시간 예산은 소스 기본값을 사용합니다.
    pub fn new(source: Arc<dyn CandleSource>, cache: Arc<ResultCache>) -> Self {
        let timeouts = source.default_timeouts();
        Self {
            source,
            cache,
            symbols: SymbolPolicy::pattern_only(),
            intervals: IntervalPolicy::default(),
            limits: LimitPolicy::default(),
            retry: RetryPolicy::default(),
            timeouts,
        }
    }

    /// 설정으로부터 서비스를 구성합니다.
    pub fn from_config(
        config: &AppConfig,
        source: Arc<dyn CandleSource>,
        clock: SharedClock,
    ) -> Self {
        let cache = Arc::new(ResultCache::new(clock, Duration::from_millis(config.cache.ttl_ms)));
        let timeouts = resolve_timeouts(source.as_ref(), &config.source);

        Self::new(source, cache)
            .with_symbol_policy(config.symbols.policy())
            .with_interval_policy(config.candles.interval_policy())
            .with_limit_policy(config.candles.limit_policy())
            .with_retry(retry_policy(&config.source))
            .with_timeouts(timeouts)
    }

    pub fn with_symbol_policy(mut self, policy: SymbolPolicy) -> Self {
        self.symbols = policy;
        self
    }

    pub fn with_interval_policy(mut self, policy: IntervalPolicy) -> Self {
        self.intervals = policy;
        self
    }

    pub fn with_limit_policy(mut self, policy: LimitPolicy) -> Self {
        self.limits = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, timeouts: SourceTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub fn symbol_policy(&self) -> &SymbolPolicy {
        &self.symbols
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// 만료된 캐시 항목을 정리하고 제거한 개수를 반환합니다.
    pub fn purge_expired_cache(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn timeouts(&self) -> SourceTimeouts {
        self.timeouts
    }

    /// 원시 입력을 조회 키로 변환합니다.
    pub fn resolve_query(
        &self,
        raw_symbol: &str,
        raw_interval: Option<&str>,
        raw_limit: Option<i64>,
    ) -> Result<CandleQuery, FetchError> {
        let symbol = self.symbols.normalize_and_validate(raw_symbol)?;
        let interval = self.intervals.normalize_interval(raw_interval)?;
        let limit = self.limits.resolve(raw_limit)?;
        Ok(CandleQuery::new(symbol, interval, limit))
    }

    /// 캔들을 조회합니다.
    ///
    /// 반환되는 캔들은 시간 오름차순이며 개수는 `limit` 이하입니다.
    /// 결과가 비어있으면 `FetchError::NoData`를 반환합니다.
    #[instrument(skip(self), fields(source = self.source.name()))]
    pub async fn fetch_candles(
        &self,
        raw_symbol: &str,
        raw_interval: Option<&str>,
        raw_limit: Option<i64>,
    ) -> Result<Vec<Candle>, FetchError> {
        self.fetch_recorded(raw_symbol, raw_interval, raw_limit)
            .await
            .map(|(_, candles)| candles)
    }

    /// 캔들을 조회해 응답 형태로 변환합니다.
    #[instrument(skip(self), fields(source = self.source.name()))]
    pub async fn fetch_series(
        &self,
        raw_symbol: &str,
        raw_interval: Option<&str>,
        raw_limit: Option<i64>,
        style: CandleFieldStyle,
    ) -> Result<CandleSeries, FetchError> {
        let (query, candles) = self
            .fetch_recorded(raw_symbol, raw_interval, raw_limit)
            .await?;
        Ok(CandleSeries::new(&query, &candles, style))
    }

    async fn fetch_recorded(
        &self,
        raw_symbol: &str,
        raw_interval: Option<&str>,
        raw_limit: Option<i64>,
    ) -> Result<(CandleQuery, Vec<Candle>), FetchError> {
        let started = Instant::now();
        let result = match self.resolve_query(raw_symbol, raw_interval, raw_limit) {
            Ok(query) => self
                .fetch_query(&query)
                .await
                .map(|candles| (query, candles)),
            Err(e) => Err(e),
        };
        self.record_outcome(result.as_ref().map(|_| ()), started);
        result
    }

    /// 검증된 조회 키로 캔들을 조회합니다.
    pub async fn fetch_query(&self, query: &CandleQuery) -> Result<Vec<Candle>, FetchError> {
        if let Some(candles) = self.cache.get(query) {
            debug!(query = %query, count = candles.len(), "Cache hit");
            return Ok(candles);
        }

        let raw = self.call_source(query).await?;
        let candles = normalize(&raw, query.limit)?;

        if candles.is_empty() {
            info!(query = %query, "Source returned no candles");
            return Err(FetchError::NoData(format!(
                "no candles for {} {}",
                query.symbol, query.interval
            )));
        }

        debug!(query = %query, raw = raw.len(), count = candles.len(), "Candles normalized");
        self.cache.put(query.clone(), candles.clone());
        Ok(candles)
    }

    /// 전체 제한 안에서 재시도 정책에 따라 소스를 호출합니다.
    async fn call_source(&self, query: &CandleQuery) -> Result<Vec<serde_json::Value>, FetchError> {
        let SourceTimeouts { attempt, overall } = self.timeouts;
        let source_name = self.source.name();

        let attempts = self.retry.run(|| {
            let source = Arc::clone(&self.source);
            let query = query.clone();
            async move {
                match tokio::time::timeout(attempt, source.fetch(&query)).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout(format!(
                        "{} attempt exceeded {}s",
                        source_name,
                        attempt.as_secs()
                    ))),
                }
            }
        });

        let span = otc_core::fetch_span!("source_fetch", source_name, query);
        match tokio::time::timeout(overall, attempts.instrument(span)).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => {
                warn!(query = %query, kind = %e.kind(), error = %e, "Source fetch failed");
                Err(e.into())
            }
            Err(_) => {
                warn!(query = %query, overall_secs = overall.as_secs(), "Overall fetch budget exceeded");
                Err(FetchError::Timeout(format!(
                    "{} fetch exceeded {}s",
                    source_name,
                    overall.as_secs()
                )))
            }
        }
    }

    fn record_outcome(&self, result: Result<(), &FetchError>, started: Instant) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => e.kind().as_str(),
        };
        metrics::counter!(
            "otc_candle_fetch_total",
            "source" => self.source.name(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!("otc_candle_fetch_duration_seconds", "source" => self.source.name())
            .record(started.elapsed().as_secs_f64());
    }

    /// 소스 자원을 정리합니다.
    pub async fn shutdown(&self) {
        info!(source = self.source.name(), "Shutting down candle source");
        self.source.shutdown().await;
    }
}
