//! 외부 캔들 서비스 위임 소스.
//!
//! `GET {base_url}/candles?symbol=..&interval=..&limit=..`를 호출하고
//! `{"candles": [...]}` 형태의 응답에서 레코드를 꺼냅니다.

use std::time::Duration;

use async_trait::async_trait;
use otc_core::{keep_most_recent, CandleQuery};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::traits::{CandleSource, SourceResult, SourceTimeouts};

/// 외부 캔들 서비스 소스.
pub struct ProxySource {
    base_url: Option<String>,
    client: Client,
}

impl ProxySource {
    /// 새 소스를 생성합니다.
    ///
    /// `base_url`이 없으면 모든 호출이 `UpstreamUnavailable`로 실패합니다.
    pub fn new(base_url: Option<String>) -> Result<Self, SourceError> {
        let base_url = base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());

        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| SourceError::UpstreamUnavailable(format!("HTTP client init failed: {}", e)))?;

        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl CandleSource for ProxySource {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn default_timeouts(&self) -> SourceTimeouts {
        SourceTimeouts::from_secs(15, 25)
    }

    async fn fetch(&self, query: &CandleQuery) -> SourceResult<Vec<Value>> {
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            SourceError::UpstreamUnavailable(
                "No upstream configured. Set source.proxy.base_url to a candle service".to_string(),
            )
        })?;

        let url = format!("{}/candles", base_url);
        let limit = query.limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", query.symbol.as_str()),
                ("interval", query.interval.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), query = %query, "Upstream candle request failed");
            return Err(SourceError::bad_response(
                Some(status.as_u16()),
                format!("Upstream returned HTTP {}", status.as_u16()),
                Some(&body),
            ));
        }

        let data: Value = serde_json::from_str(&body).map_err(|_| {
            SourceError::bad_response(Some(status.as_u16()), "Upstream returned non-JSON", Some(&body))
        })?;

        let candles = match data {
            Value::Object(mut map) => match map.remove("candles") {
                Some(Value::Array(candles)) => candles,
                Some(_) => {
                    return Err(SourceError::bad_response(
                        Some(status.as_u16()),
                        "Upstream 'candles' field is not an array",
                        None,
                    ))
                }
                None => {
                    return Err(SourceError::bad_response(
                        Some(status.as_u16()),
                        "Upstream missing 'candles' field",
                        None,
                    ))
                }
            },
            _ => {
                return Err(SourceError::bad_response(
                    Some(status.as_u16()),
                    "Upstream response is not a JSON object",
                    None,
                ))
            }
        };

        // 업스트림이 최신순이거나 더 많이 보내도 최근 limit개만 전달
        let candles = keep_most_recent(candles, query.limit);

        debug!(query = %query, count = candles.len(), "Upstream candles received");
        Ok(candles)
    }
}
