//! 금융 시계열 REST API 소스 (Twelve Data 호환).
//!
//! # 매핑
//!
//! - 심볼: `EURUSD_OTC` → `EUR/USD`
//! - 간격: `1m` → `1min`, `1h` → `1h`
//!
//! API는 최신 봉부터 반환하므로 시각 순으로 정렬한 뒤 최근 `limit`개만 남깁니다.
//! `datetime` 문자열은 그대로 넘기고 해석은 정규화 단계가 맡습니다.
//! OTC 시세는 실제 시장 시세와 다를 수 있습니다.

use std::time::Duration;

use async_trait::async_trait;
use otc_core::{keep_most_recent, parse_datetime, CandleQuery, Interval};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::traits::{CandleSource, SourceResult, SourceTimeouts};

/// API 최대 `outputsize`.
const MAX_OUTPUT_SIZE: usize = 5_000;

/// 시계열 API 응답.
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    values: Option<Vec<TimeSeriesValue>>,
}

/// 시계열 API 봉.
#[derive(Debug, Deserialize)]
struct TimeSeriesValue {
    datetime: String,
    open: Value,
    high: Value,
    low: Value,
    close: Value,
    #[serde(default)]
    volume: Option<Value>,
}

/// 시계열 API 소스.
pub struct TimeSeriesApiSource {
    base_url: String,
    api_key: Option<SecretString>,
    output_margin: usize,
    client: Client,
}

impl TimeSeriesApiSource {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        output_margin: usize,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| SourceError::UpstreamUnavailable(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            output_margin,
            client,
        })
    }

    /// 간격을 API 간격 문자열로 변환.
    pub fn interval_to_api(interval: Interval) -> &'static str {
        match interval {
            Interval::M1 => "1min",
            Interval::M5 => "5min",
            Interval::M15 => "15min",
            Interval::M30 => "30min",
            Interval::H1 => "1h",
        }
    }

    /// 심볼을 API 통화쌍 표기로 변환.
    pub fn symbol_to_api(query: &CandleQuery) -> Result<String, SourceError> {
        query
            .symbol
            .pair()
            .map(|(base, quote)| format!("{}/{}", base, quote))
            .ok_or_else(|| {
                SourceError::NotImplemented(format!(
                    "{} has no currency-pair mapping for the time-series API",
                    query.symbol
                ))
            })
    }

    /// 요청할 봉 개수 (여유분 포함).
    fn output_size(&self, limit: usize) -> usize {
        (limit + self.output_margin).min(MAX_OUTPUT_SIZE)
    }
}

#[async_trait]
impl CandleSource for TimeSeriesApiSource {
    fn name(&self) -> &'static str {
        "time_series"
    }

    fn default_timeouts(&self) -> SourceTimeouts {
        SourceTimeouts::from_secs(20, 30)
    }

    async fn fetch(&self, query: &CandleQuery) -> SourceResult<Vec<Value>> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            SourceError::AuthenticationFailed("Time-series API key is not configured".to_string())
        })?;
        let symbol = Self::symbol_to_api(query)?;
        let output_size = self.output_size(query.limit).to_string();

        let response = self
            .client
            .get(format!("{}/time_series", self.base_url))
            .query(&[
                ("symbol", symbol.as_str()),
                ("interval", Self::interval_to_api(query.interval)),
                ("outputsize", output_size.as_str()),
                ("timezone", "UTC"),
                ("apikey", api_key.expose_secret()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(SourceError::AuthenticationFailed(format!(
                "Time-series API rejected the API key (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), query = %query, "Time-series API request failed");
            return Err(SourceError::bad_response(
                Some(status.as_u16()),
                format!("Time-series API returned HTTP {}", status.as_u16()),
                Some(&body),
            ));
        }

        let parsed: TimeSeriesResponse = serde_json::from_str(&body).map_err(|e| {
            SourceError::bad_response(
                Some(status.as_u16()),
                format!("Unexpected time-series payload: {}", e),
                Some(&body),
            )
        })?;

        // 에러도 HTTP 200 본문의 status 필드로 오는 경우가 있음
        if parsed.status.as_deref() == Some("error") {
            let message = parsed
                .message
                .unwrap_or_else(|| "unknown provider error".to_string());
            return match parsed.code {
                Some(401) | Some(403) => Err(SourceError::AuthenticationFailed(message)),
                code => Err(SourceError::bad_response(code, message, None)),
            };
        }

        let values = parsed.values.unwrap_or_default();
        let total = values.len();

        let records: Vec<Value> = values
            .into_iter()
            .filter(|v| {
                let ok = parse_datetime(&v.datetime).is_some();
                if !ok {
                    debug!(datetime = %v.datetime, "Skipping bar with unparseable datetime");
                }
                ok
            })
            .map(|v| {
                json!({
                    "datetime": v.datetime,
                    "o": v.open,
                    "h": v.high,
                    "l": v.low,
                    "c": v.close,
                    "v": v.volume.unwrap_or(Value::Null),
                })
            })
            .collect();

        // 최신순 → 오래된순, 최근 limit개
        let records = keep_most_recent(records, query.limit);

        debug!(query = %query, received = total, kept = records.len(), "Time-series candles received");
        Ok(records)
    }
}
