//! 결정적 모의 캔들 소스.
//!
//! 같은 (심볼, 봉 시각)에는 항상 같은 캔들을 생성합니다.
//! - 심볼별 기준가 (0.5 ~ 2.0)
//! - 일간/시간 주기의 두 사인파로 완만한 추세
//! - 봉 시각으로 시드한 난수로 꼬리 생성
//! - `close[i] == open[i+1]` 연속성
//!
//! 실제 시세와는 무관합니다.

use std::f64::consts::TAU;

use async_trait::async_trait;
use otc_core::{CandleQuery, SharedClock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tracing::debug;

use crate::traits::{CandleSource, SourceResult, SourceTimeouts};

/// 하루 (초).
const DAY_SECS: f64 = 86_400.0;
/// 한 시간 (초).
const HOUR_SECS: f64 = 3_600.0;
/// 일간 주기 진폭 (기준가 대비).
const DAILY_AMPLITUDE: f64 = 0.003;
/// 시간 주기 진폭 (기준가 대비).
const HOURLY_AMPLITUDE: f64 = 0.001;
/// 꼬리 최대 길이 (기준가 대비).
const WICK_RATIO: f64 = 0.0004;
/// 가격 소수점 자리수.
const PRICE_DECIMALS: i32 = 5;

/// 모의 캔들 소스.
pub struct MockSource {
    clock: SharedClock,
}

impl MockSource {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    /// 주어진 구간의 캔들 레코드를 생성합니다.
    ///
    /// `end`는 마지막 봉의 시작 시각입니다.
    pub fn generate(symbol: &str, step: i64, end: i64, limit: usize) -> Vec<Value> {
        let curve = PriceCurve::for_symbol(symbol);
        let start = end - (limit as i64 - 1) * step;

        (0..limit as i64)
            .map(|i| {
                let ts = start + i * step;
                let open = round_price(curve.price_at(ts));
                let close = round_price(curve.price_at(ts + step));

                let mut rng = StdRng::seed_from_u64(curve.seed ^ (ts as u64));
                let wick = curve.base * WICK_RATIO;
                let high = round_price(open.max(close) + rng.gen_range(0.0..=wick));
                let low = round_price(open.min(close) - rng.gen_range(0.0..=wick));
                let volume = rng.gen_range(10u32..500) as f64;

                json!({
                    "ts": ts,
                    "open": open,
                    "high": high,
                    "low": low,
                    "close": close,
                    "volume": volume,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CandleSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn default_timeouts(&self) -> SourceTimeouts {
        SourceTimeouts::from_secs(5, 10)
    }

    async fn fetch(&self, query: &CandleQuery) -> SourceResult<Vec<Value>> {
        let end = query.interval.floor(self.clock.now_secs());
        debug!(query = %query, end, "Generating mock candles");

        Ok(Self::generate(
            query.symbol.as_str(),
            query.interval.as_secs(),
            end,
            query.limit,
        ))
    }
}

/// 심볼별 가격 곡선.
struct PriceCurve {
    seed: u64,
    base: f64,
    daily_phase: f64,
    hourly_phase: f64,
}

impl PriceCurve {
    fn for_symbol(symbol: &str) -> Self {
        let seed = fnv1a(symbol.as_bytes());
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            seed,
            base: rng.gen_range(0.5..2.0),
            daily_phase: rng.gen_range(0.0..TAU),
            hourly_phase: rng.gen_range(0.0..TAU),
        }
    }

    fn price_at(&self, ts: i64) -> f64 {
        let t = ts as f64;
        self.base
            * (1.0
                + DAILY_AMPLITUDE * (TAU * t / DAY_SECS + self.daily_phase).sin()
                + HOURLY_AMPLITUDE * (TAU * t / HOUR_SECS + self.hourly_phase).sin())
    }
}

/// FNV-1a 64비트 해시. 프로세스 간 안정적인 시드를 위해 사용합니다.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

fn round_price(price: f64) -> f64 {
    let factor = 10f64.powi(PRICE_DECIMALS);
    (price * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use otc_core::{normalize, Interval, ManualClock, SymbolPolicy};
    use std::sync::Arc;

    fn query(symbol: &str, interval: Interval, limit: usize) -> CandleQuery {
        let symbol = SymbolPolicy::pattern_only()
            .normalize_and_validate(symbol)
            .unwrap();
        CandleQuery::new(symbol, interval, limit)
    }

    #[tokio::test]
    async fn test_mock_three_candles_at_minute_boundary() {
        let t0 = 1_699_999_980;
        let source = MockSource::new(Arc::new(ManualClock::at_secs(t0)));

        let raw = source
            .fetch(&query("EURUSD_OTC", Interval::M1, 3))
            .await
            .unwrap();
        let candles = normalize(&raw, 3).unwrap();

        let ts: Vec<i64> = candles.iter().map(|c| c.timestamp).collect();
        assert_eq!(ts, vec![t0 - 120, t0 - 60, t0]);
        assert!(candles.iter().all(|c| c.is_consistent()));
    }

    #[tokio::test]
    async fn test_mock_floors_to_interval_boundary() {
        // 1_700_000_000은 분 경계가 아님 (mod 60 = 20)
        let source = MockSource::new(Arc::new(ManualClock::at_secs(1_700_000_000)));
        let raw = source
            .fetch(&query("EURUSD_OTC", Interval::M1, 1))
            .await
            .unwrap();
        assert_eq!(raw[0]["ts"], 1_699_999_980);
    }

    #[tokio::test]
    async fn test_mock_exact_limit_and_spacing() {
        let clock = Arc::new(ManualClock::at_secs(1_700_003_333));
        let source = MockSource::new(clock);

        for interval in Interval::ALL {
            let raw = source
                .fetch(&query("GBPJPY_OTC", interval, 50))
                .await
                .unwrap();
            let candles = normalize(&raw, 50).unwrap();
            assert_eq!(candles.len(), 50);
            assert!(candles
                .windows(2)
                .all(|w| w[1].timestamp - w[0].timestamp == interval.as_secs()));
            // 연속성
            assert!(candles.windows(2).all(|w| w[0].close == w[1].open));
            assert!(candles.iter().all(|c| c.is_consistent()));
        }
    }

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let clock = Arc::new(ManualClock::at_secs(1_700_000_000));
        let a = MockSource::new(clock.clone());
        let b = MockSource::new(clock);
        let q = query("AUDUSD_OTC", Interval::M5, 20);

        assert_eq!(a.fetch(&q).await.unwrap(), b.fetch(&q).await.unwrap());
        assert_ne!(
            a.fetch(&q).await.unwrap(),
            a.fetch(&query("EURUSD_OTC", Interval::M5, 20)).await.unwrap()
        );
    }

    #[test]
    fn test_overlapping_windows_agree() {
        // 같은 봉 시각은 구간과 무관하게 같은 값
        let long = MockSource::generate("EURUSD_OTC", 60, 1_699_999_980, 10);
        let short = MockSource::generate("EURUSD_OTC", 60, 1_699_999_980, 3);
        assert_eq!(&long[7..], &short[..]);
    }

    #[test]
    fn test_base_price_range() {
        for symbol in otc_core::KNOWN_OTC_SYMBOLS {
            let curve = PriceCurve::for_symbol(symbol);
            assert!((0.5..2.0).contains(&curve.base));
        }
    }
}
