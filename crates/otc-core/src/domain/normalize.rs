//! 이종 소스 응답을 표준 캔들로 정규화.
//!
//! 소스마다 필드 이름과 타입이 다릅니다. 이 모듈은 다음을 처리합니다:
//! - 필드 별칭: 시각 `t|ts|time|timestamp|datetime`, `o|open`, `h|high`,
//!   `l|low`, `c|close`, 거래량 `v|vol|volume`
//! - 숫자/숫자 문자열 변환 (유한값만 허용)
//! - 시각: 초, 밀리초(10^11 초과), 숫자 문자열, ISO-8601 문자열
//! - 배열 행 `[t, o, h, l, c, v?]`
//! - 오름차순 정렬, 중복 시각은 마지막 레코드 유지, 최근 `limit`개만 유지

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use super::candle::Candle;
use crate::error::FetchError;

const TIMESTAMP_KEYS: &[&str] = &["t", "ts", "time", "timestamp", "datetime"];
const OPEN_KEYS: &[&str] = &["o", "open"];
const HIGH_KEYS: &[&str] = &["h", "high"];
const LOW_KEYS: &[&str] = &["l", "low"];
const CLOSE_KEYS: &[&str] = &["c", "close"];
const VOLUME_KEYS: &[&str] = &["v", "vol", "volume"];

/// 이 값보다 큰 epoch 값은 밀리초로 간주합니다 (1973년 이후의 밀리초 / 5138년 이후의 초).
const MILLIS_THRESHOLD: f64 = 1e11;

/// 원시 레코드 목록을 표준 캔들로 정규화합니다.
///
/// 필수 필드가 없는 레코드는 버립니다. 입력이 비어 있지 않은데
/// 남는 레코드가 없으면 `MalformedUpstreamData`를 반환합니다.
pub fn normalize(raw: &[Value], limit: usize) -> Result<Vec<Candle>, FetchError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    // 같은 시각은 뒤의 레코드가 덮어씀
    let mut by_ts: BTreeMap<i64, Candle> = BTreeMap::new();
    let mut dropped = 0usize;

    for record in raw {
        match parse_record(record) {
            Some(candle) => {
                by_ts.insert(candle.timestamp, candle);
            }
            None => dropped += 1,
        }
    }

    if by_ts.is_empty() {
        return Err(FetchError::MalformedUpstreamData(format!(
            "none of {} records had a usable timestamp/open/high/low/close",
            raw.len()
        )));
    }

    if dropped > 0 {
        tracing::debug!(dropped, total = raw.len(), "Dropped malformed candle records");
    }

    let skip = by_ts.len().saturating_sub(limit);
    Ok(by_ts.into_values().skip(skip).collect())
}

/// 레코드의 시각(epoch 초). 시각 필드가 없거나 해석할 수 없으면 `None`.
pub fn record_timestamp(record: &Value) -> Option<i64> {
    match record {
        Value::Object(map) => pick(map, TIMESTAMP_KEYS).and_then(coerce_timestamp),
        Value::Array(row) => row.first().and_then(coerce_timestamp),
        _ => None,
    }
}

/// 원시 레코드를 시각 오름차순으로 정렬하고 최근 `limit`개만 남깁니다.
///
/// 소스가 최신순으로 보내도 가장 최근 봉이 남습니다. 시각을 알 수 없는 레코드는
/// 앞쪽에 모여 먼저 잘리고, 같은 시각의 레코드는 원래 순서를 유지합니다.
pub fn keep_most_recent(mut records: Vec<Value>, limit: usize) -> Vec<Value> {
    records.sort_by_cached_key(record_timestamp);
    if records.len() > limit {
        records.drain(..records.len() - limit);
    }
    records
}

/// 단일 레코드를 캔들로 변환합니다.
fn parse_record(record: &Value) -> Option<Candle> {
    match record {
        Value::Object(map) => parse_object(map),
        Value::Array(row) => parse_row(row),
        _ => None,
    }
}

fn parse_object(map: &Map<String, Value>) -> Option<Candle> {
    let timestamp = pick(map, TIMESTAMP_KEYS).and_then(coerce_timestamp)?;
    let open = pick(map, OPEN_KEYS).and_then(coerce_number)?;
    let high = pick(map, HIGH_KEYS).and_then(coerce_number)?;
    let low = pick(map, LOW_KEYS).and_then(coerce_number)?;
    let close = pick(map, CLOSE_KEYS).and_then(coerce_number)?;
    let volume = match pick(map, VOLUME_KEYS) {
        None | Some(Value::Null) => 0.0,
        Some(v) => coerce_number(v)?,
    };

    Some(Candle::new(timestamp, open, high, low, close, volume))
}

fn parse_row(row: &[Value]) -> Option<Candle> {
    if row.len() < 5 {
        return None;
    }
    let volume = match row.get(5) {
        None | Some(Value::Null) => 0.0,
        Some(v) => coerce_number(v)?,
    };
    Some(Candle::new(
        coerce_timestamp(&row[0])?,
        coerce_number(&row[1])?,
        coerce_number(&row[2])?,
        coerce_number(&row[3])?,
        coerce_number(&row[4])?,
        volume,
    ))
}

/// 별칭 중 처음 존재하는 필드 값.
fn pick<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k))
}

/// 숫자 또는 숫자 문자열을 유한한 f64로 변환합니다.
fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// 시각 값을 epoch 초로 변환합니다.
fn coerce_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(epoch_from_int(i))
            } else {
                epoch_from_float(n.as_f64()?)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(epoch_from_int(i));
            }
            if let Ok(f) = s.parse::<f64>() {
                return epoch_from_float(f);
            }
            parse_datetime(s)
        }
        _ => None,
    }
}

fn epoch_from_int(i: i64) -> i64 {
    if (i as f64).abs() > MILLIS_THRESHOLD {
        i.div_euclid(1000)
    } else {
        i
    }
}

fn epoch_from_float(f: f64) -> Option<i64> {
    if !f.is_finite() {
        return None;
    }
    let secs = if f.abs() > MILLIS_THRESHOLD { f / 1000.0 } else { f };
    Some(secs.floor() as i64)
}

/// ISO-8601 / `YYYY-MM-DD HH:MM:SS` / 날짜 문자열 파싱. 시간대가 없으면 UTC로 간주합니다.
pub fn parse_datetime(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_aliases_and_string_coercion() {
        let raw = vec![
            json!({"t": 120, "o": "1.1", "h": 1.3, "l": 1.0, "c": 1.2, "v": 7}),
            json!({"time": "60", "open": 1.0, "high": 1.2, "low": 0.9, "close": 1.1}),
            json!({"datetime": "2024-01-02 03:04:00", "open": 2, "high": 3, "low": 1, "close": 2}),
        ];
        let candles = normalize(&raw, 10).unwrap();

        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].timestamp, 60);
        assert_eq!(candles[0].volume, 0.0);
        assert_eq!(candles[1].open, 1.1);
        assert_eq!(candles[1].volume, 7.0);
        assert_eq!(candles[2].timestamp, 1_704_164_640);
    }

    #[test]
    fn test_millisecond_and_iso_timestamps() {
        let raw = vec![
            json!({"ts": 1_700_000_040_000i64, "o": 1, "h": 1, "l": 1, "c": 1}),
            json!({"ts": "2023-11-14T22:14:20Z", "o": 1, "h": 1, "l": 1, "c": 1}),
            json!({"ts": 1_700_000_100.9, "o": 1, "h": 1, "l": 1, "c": 1}),
        ];
        let ts: Vec<i64> = normalize(&raw, 10)
            .unwrap()
            .iter()
            .map(|c| c.timestamp)
            .collect();
        assert_eq!(ts, vec![1_700_000_040, 1_700_000_060, 1_700_000_100]);
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert_eq!(parse_datetime("2023-11-14 22:13:20"), Some(1_700_000_000));
        assert_eq!(parse_datetime("2023-11-14T22:13:20Z"), Some(1_700_000_000));
        assert_eq!(parse_datetime("2023-11-14T22:13:20"), Some(1_700_000_000));
        assert_eq!(parse_datetime(" 2023-11-14 "), Some(1_699_920_000));
        assert_eq!(parse_datetime("yesterday"), None);
    }

    #[test]
    fn test_keep_most_recent_handles_newest_first() {
        let raw: Vec<Value> = [300, 240, 180, 120, 60]
            .iter()
            .map(|t| json!({"ts": t, "o": 1, "h": 1, "l": 1, "c": 1}))
            .collect();

        let kept = keep_most_recent(raw, 2);
        let ts: Vec<i64> = kept.iter().filter_map(record_timestamp).collect();
        assert_eq!(ts, vec![240, 300]);
    }

    #[test]
    fn test_keep_most_recent_cuts_undated_first() {
        let raw = vec![
            json!({"t": 120, "o": 1, "h": 1, "l": 1, "c": 1}),
            json!({"o": 1, "h": 1, "l": 1, "c": 1}),
            json!([60, 1, 1, 1, 1]),
            json!({"t": 120, "o": 2, "h": 2, "l": 2, "c": 2}),
        ];

        let kept = keep_most_recent(raw, 3);
        assert_eq!(kept.len(), 3);
        assert_eq!(record_timestamp(&kept[0]), Some(60));

        // 같은 시각은 입력 순서를 유지하므로 normalize가 뒤의 레코드를 채택
        let candles = normalize(&kept, 3).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].open, 2.0);
    }

    #[test]
    fn test_array_rows() {
        let raw = vec![json!([60, "1.0", "1.2", "0.9", "1.1", "3.5"]), json!([120, 1, 2, 0.5, 1.5])];
        let candles = normalize(&raw, 10).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].volume, 3.5);
        assert_eq!(candles[1].volume, 0.0);
    }

    #[test]
    fn test_drops_incomplete_records() {
        let raw = vec![
            json!({"t": 60, "o": 1, "h": 1, "l": 1}),
            json!({"t": 120, "o": 1, "h": 1, "l": 1, "c": "NaN"}),
            json!("garbage"),
            json!({"t": 180, "o": 1, "h": 1, "l": 1, "c": 1}),
        ];
        let candles = normalize(&raw, 10).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].timestamp, 180);
    }

    #[test]
    fn test_all_malformed_is_error() {
        let raw = vec![json!({"foo": 1}), json!(null)];
        let err = normalize(&raw, 10).unwrap_err();
        assert!(matches!(err, FetchError::MalformedUpstreamData(_)));
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        assert!(normalize(&[], 10).unwrap().is_empty());
    }

    #[test]
    fn test_sort_dedupe_and_truncate() {
        let raw = vec![
            json!({"t": 180, "o": 3, "h": 3, "l": 3, "c": 3}),
            json!({"t": 60, "o": 1, "h": 1, "l": 1, "c": 1}),
            json!({"t": 120, "o": 2, "h": 2, "l": 2, "c": 2}),
            json!({"t": 120, "o": 9, "h": 9, "l": 9, "c": 9}),
        ];
        let candles = normalize(&raw, 2).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 120);
        // 중복 시각은 마지막 레코드
        assert_eq!(candles[0].open, 9.0);
        assert_eq!(candles[1].timestamp, 180);
    }

    fn candle_strategy() -> impl Strategy<Value = Value> {
        (
            0i64..2_000_000_000,
            0.0001f64..1000.0,
            0.0001f64..1000.0,
            0.0001f64..1000.0,
            0.0001f64..1000.0,
            0.0f64..1e6,
        )
            .prop_map(|(t, o, h, l, c, v)| json!({"t": t, "o": o, "h": h, "l": l, "c": c, "v": v}))
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            raw in prop::collection::vec(candle_strategy(), 1..50),
            limit in 1usize..60,
        ) {
            let once = normalize(&raw, limit).unwrap();
            let canonical: Vec<Value> = once
                .iter()
                .map(|c| serde_json::to_value(c).unwrap())
                .collect();
            let twice = normalize(&canonical, limit).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_output_is_ascending_and_bounded(
            raw in prop::collection::vec(candle_strategy(), 1..50),
            limit in 1usize..60,
        ) {
            let candles = normalize(&raw, limit).unwrap();
            prop_assert!(candles.len() <= limit);
            prop_assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        }
    }
}
