//! 모의 소스 기반 조회 파이프라인 통합 테스트.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use otc_core::{
    AppConfig, CandleQuery, ErrorKind, Interval, ManualClock, SharedClock,
};
use otc_data::{CandleService, ResultCache};
use otc_source::{CandleSource, MockSource, RetryPolicy, SourceResult, SourceTimeouts};
use serde_json::Value;

/// 1분 경계에 맞춘 고정 시각.
const T0: i64 = 1_699_999_980;

/// 호출 횟수를 세는 소스 래퍼.
struct CountingSource {
    inner: MockSource,
    calls: AtomicU32,
}

impl CountingSource {
    fn new(clock: SharedClock) -> Self {
        Self {
            inner: MockSource::new(clock),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandleSource for CountingSource {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn default_timeouts(&self) -> SourceTimeouts {
        self.inner.default_timeouts()
    }

    async fn fetch(&self, query: &CandleQuery) -> SourceResult<Vec<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(query).await
    }
}

fn setup() -> (ManualClock, Arc<CountingSource>, CandleService) {
    let clock = ManualClock::at_secs(T0);
    let shared: SharedClock = Arc::new(clock.clone());
    let source = Arc::new(CountingSource::new(shared.clone()));
    let cache = Arc::new(ResultCache::new(shared, Duration::from_secs(2)));
    let service = CandleService::new(source.clone(), cache).with_retry(RetryPolicy::no_retry());
    (clock, source, service)
}

#[tokio::test]
async fn test_mock_end_to_end_at_minute_boundary() {
    let (_clock, _source, service) = setup();

    let candles = service
        .fetch_candles("EURUSD_OTC", Some("1m"), Some(3))
        .await
        .unwrap();

    let timestamps: Vec<i64> = candles.iter().map(|c| c.timestamp).collect();
    assert_eq!(timestamps, vec![T0 - 120, T0 - 60, T0]);
    for candle in &candles {
        assert!(candle.is_consistent(), "invalid OHLC: {:?}", candle);
    }
}

#[tokio::test]
async fn test_mock_series_shape_for_every_interval() {
    let (_clock, _source, service) = setup();

    for interval in Interval::ALL {
        let candles = service
            .fetch_candles("GBPUSD_OTC", Some(interval.as_str()), Some(50))
            .await
            .unwrap();

        assert_eq!(candles.len(), 50);
        for pair in candles.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, interval.as_secs());
        }
    }
}

#[tokio::test]
async fn test_cache_ttl_controls_source_calls() {
    let (clock, source, service) = setup();

    service.fetch_candles("EURUSD_OTC", Some("1m"), Some(10)).await.unwrap();
    clock.advance_millis(1_000);
    service.fetch_candles("EURUSD_OTC", Some("1m"), Some(10)).await.unwrap();
    assert_eq!(source.calls(), 1);

    clock.advance_millis(1_500);
    service.fetch_candles("EURUSD_OTC", Some("1m"), Some(10)).await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_different_limits_are_cached_separately() {
    let (_clock, source, service) = setup();

    service.fetch_candles("EURUSD_OTC", None, Some(10)).await.unwrap();
    service.fetch_candles("EURUSD_OTC", None, Some(11)).await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_invalid_symbol_regardless_of_source() {
    let (_clock, source, service) = setup();

    let err = service.fetch_candles("XYZ", None, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSymbol);
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_limit_clamped_to_max() {
    let (_clock, _source, service) = setup();

    let candles = service
        .fetch_candles("EURUSD_OTC", Some("1m"), Some(10_000))
        .await
        .unwrap();
    assert_eq!(candles.len(), 500);
}

#[tokio::test]
async fn test_from_config_applies_policies() {
    let mut config = AppConfig::default();
    config.symbols.allow_list = vec!["EURUSD_OTC".to_string()];
    config.candles.max_limit = 20;

    let clock: SharedClock = Arc::new(ManualClock::at_secs(T0));
    let source = Arc::new(MockSource::new(clock.clone()));
    let service = CandleService::from_config(&config, source, clock);

    let err = service.fetch_candles("GBPUSD_OTC", None, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSymbol);

    let candles = service.fetch_candles("eurusd_otc", None, Some(100)).await.unwrap();
    assert_eq!(candles.len(), 20);
    assert_eq!(service.source_name(), "mock");
    assert!(service.symbol_policy().has_allow_list());
}
