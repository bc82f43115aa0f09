//! 캔들(OHLCV) 데이터 모델.
//!
//! - `Candle` - 표준 캔들
//! - `CandleQuery` - 어댑터 호출 인자이자 캐시 키
//! - `CandleFieldStyle` / `CandleSeries` - 응답 직렬화 형태

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{Interval, Symbol};

/// 표준 캔들.
///
/// `timestamp`는 봉 시작 시각(Unix epoch 초)입니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 봉 시작 시각 (epoch 초)
    pub timestamp: i64,
    /// 시가
    pub open: f64,
    /// 고가
    pub high: f64,
    /// 저가
    pub low: f64,
    /// 종가
    pub close: f64,
    /// 거래량 (없으면 0)
    #[serde(default)]
    pub volume: f64,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 고가/저가가 시가·종가를 감싸는지 확인합니다.
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open.min(self.close) && self.high >= self.open.max(self.close)
    }
}

/// 정규화된 캔들 조회 요청.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandleQuery {
    pub symbol: Symbol,
    pub interval: Interval,
    /// `[1, MAX_LIMIT]` 범위로 보정된 개수
    pub limit: usize,
}

impl CandleQuery {
    pub fn new(symbol: Symbol, interval: Interval, limit: usize) -> Self {
        Self {
            symbol,
            interval,
            limit,
        }
    }
}

impl fmt::Display for CandleQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}x{}", self.symbol, self.interval, self.limit)
    }
}

/// 캔들 필드 이름 형태 (배포 단위 설정).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleFieldStyle {
    /// `{ts, open, high, low, close, volume}`
    #[default]
    Verbose,
    /// `{t, o, h, l, c, v}`
    Compact,
}

impl FromStr for CandleFieldStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "verbose" | "long" => Ok(CandleFieldStyle::Verbose),
            "compact" | "short" => Ok(CandleFieldStyle::Compact),
            other => Err(format!("Invalid candle field style: {}", other)),
        }
    }
}

/// 긴 필드 이름 캔들.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerboseCandle {
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<&Candle> for VerboseCandle {
    fn from(c: &Candle) -> Self {
        Self {
            ts: c.timestamp,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
        }
    }
}

/// 짧은 필드 이름 캔들.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompactCandle {
    pub t: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: f64,
}

impl From<&Candle> for CompactCandle {
    fn from(c: &Candle) -> Self {
        Self {
            t: c.timestamp,
            o: c.open,
            h: c.high,
            l: c.low,
            c: c.close,
            v: c.volume,
        }
    }
}

/// 스타일별 캔들 목록.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WireCandles {
    Verbose(Vec<VerboseCandle>),
    Compact(Vec<CompactCandle>),
}

impl WireCandles {
    pub fn from_candles(candles: &[Candle], style: CandleFieldStyle) -> Self {
        match style {
            CandleFieldStyle::Verbose => {
                WireCandles::Verbose(candles.iter().map(VerboseCandle::from).collect())
            }
            CandleFieldStyle::Compact => {
                WireCandles::Compact(candles.iter().map(CompactCandle::from).collect())
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            WireCandles::Verbose(v) => v.len(),
            WireCandles::Compact(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 캔들 조회 응답.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleSeries {
    pub symbol: String,
    pub interval: String,
    pub candles: WireCandles,
}

impl CandleSeries {
    pub fn new(query: &CandleQuery, candles: &[Candle], style: CandleFieldStyle) -> Self {
        Self {
            symbol: query.symbol.to_string(),
            interval: query.interval.to_string(),
            candles: WireCandles::from_candles(candles, style),
        }
    }
}
