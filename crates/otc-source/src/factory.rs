//! 설정에 따른 소스 선택.
//!
//! 소스는 시작 시 한 번 선택되며 이후 교체되지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use otc_core::{AppConfig, SharedClock, SourceConfig, SourceKind};
use tracing::{info, warn};

use crate::browser::{BrowserCredentials, BrowserDriver, BrowserSource, PageSettings, WebDriverClient};
use crate::error::SourceError;
use crate::mock::MockSource;
use crate::proxy::ProxySource;
use crate::retry::RetryPolicy;
use crate::time_series::TimeSeriesApiSource;
use crate::traits::{CandleSource, SourceTimeouts};

/// 설정된 종류의 소스를 생성합니다.
pub fn build_source(
    config: &AppConfig,
    clock: SharedClock,
) -> Result<Arc<dyn CandleSource>, SourceError> {
    build_source_of_kind(config.source.kind, &config.source, clock)
}

/// 주어진 종류의 소스를 생성합니다 (CLI `--source` 덮어쓰기용).
pub fn build_source_of_kind(
    kind: SourceKind,
    config: &SourceConfig,
    clock: SharedClock,
) -> Result<Arc<dyn CandleSource>, SourceError> {
    let source: Arc<dyn CandleSource> = match kind {
        SourceKind::Mock => Arc::new(MockSource::new(clock)),
        SourceKind::Proxy => {
            if config.proxy.base_url.is_none() {
                warn!("Proxy source selected without source.proxy.base_url; requests will fail with UPSTREAM_UNAVAILABLE");
            }
            Arc::new(ProxySource::new(config.proxy.base_url.clone())?)
        }
        SourceKind::TimeSeries => {
            let ts = &config.time_series;
            if ts.api_key.is_none() {
                warn!("Time-series source selected without an API key; requests will fail with AUTHENTICATION_FAILED");
            }
            Arc::new(TimeSeriesApiSource::new(
                ts.base_url.clone(),
                ts.api_key.clone(),
                ts.output_margin,
            )?)
        }
        SourceKind::Browser => Arc::new(build_browser_source(config)?),
    };

    info!(source = source.name(), "Candle source selected");
    Ok(source)
}

fn build_browser_source(config: &SourceConfig) -> Result<BrowserSource, SourceError> {
    let browser = &config.browser;

    let driver: Option<Arc<dyn BrowserDriver>> = match browser.webdriver_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let settings = PageSettings {
                login_url: browser.login_url.clone(),
                chart_url_template: browser.chart_url_template.clone(),
                email_selector: browser.selectors.email_input.clone(),
                password_selector: browser.selectors.password_input.clone(),
                submit_selector: browser.selectors.submit_button.clone(),
                authenticated_selector: browser.selectors.authenticated_marker.clone(),
                extract_script: browser.extract_script.clone(),
                headless: browser.headless,
            };
            let client: Arc<dyn BrowserDriver> = Arc::new(WebDriverClient::new(url, settings)?);
            Some(client)
        }
        _ => {
            warn!("Browser source selected without source.browser.webdriver_url; requests will fail with NOT_IMPLEMENTED");
            None
        }
    };

    let credentials = match (&browser.email, &browser.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() => Some(BrowserCredentials {
            email: email.clone(),
            password: password.clone(),
        }),
        _ => None,
    };

    Ok(BrowserSource::new(
        driver,
        credentials,
        Duration::from_secs(browser.phase_timeout_secs.max(1)),
    ))
}

/// 소스 기본 시간 예산에 설정 덮어쓰기를 적용합니다.
pub fn resolve_timeouts(source: &dyn CandleSource, config: &SourceConfig) -> SourceTimeouts {
    source
        .default_timeouts()
        .with_overrides(config.attempt_timeout_secs, config.overall_timeout_secs)
}

/// 설정에서 재시도 정책을 만듭니다.
pub fn retry_policy(config: &SourceConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.max_attempts,
        Duration::from_millis(config.retry_backoff_ms),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use otc_core::ManualClock;

    fn clock() -> SharedClock {
        Arc::new(ManualClock::at_secs(1_700_000_000))
    }

    #[test]
    fn test_build_each_kind() {
        let config = AppConfig::default();
        for (kind, name) in [
            (SourceKind::Mock, "mock"),
            (SourceKind::Proxy, "proxy"),
            (SourceKind::TimeSeries, "time_series"),
            (SourceKind::Browser, "browser"),
        ] {
            let source = build_source_of_kind(kind, &config.source, clock()).unwrap();
            assert_eq!(source.name(), name);
        }
    }

    #[test]
    fn test_timeout_resolution() {
        let mut config = AppConfig::default();
        let source = build_source(&config, clock()).unwrap();
        assert_eq!(
            resolve_timeouts(source.as_ref(), &config.source),
            SourceTimeouts::from_secs(5, 10)
        );

        config.source.overall_timeout_secs = Some(3);
        let t = resolve_timeouts(source.as_ref(), &config.source);
        // 전체 제한은 시도 제한 이상
        assert_eq!(t, SourceTimeouts::from_secs(5, 5));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = AppConfig::default();
        let policy = retry_policy(&config.source);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_millis(500));
    }
}
