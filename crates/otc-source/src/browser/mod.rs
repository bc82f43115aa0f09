//! 브라우저 자동화 캔들 소스.
//!
//! 요청마다 다음 단계를 순서대로 진행하며 각 단계는 시간 제한을 가집니다:
//!
//! ```text
//! Idle → Authenticating → Navigating → Extracting → Success
//!                 \______________\____________\______→ Failed
//! ```
//!
//! 세션은 `SessionPool`로 재사용되고 실패 시 폐기됩니다.
//! 매 요청마다 로그인 상태를 다시 확인하고 필요하면 재로그인합니다.

mod session;
mod webdriver;

pub use session::*;
pub use webdriver::*;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use otc_core::{keep_most_recent, CandleQuery};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::traits::{CandleSource, SourceResult, SourceTimeouts};

/// 요청 처리 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserPhase {
    Idle,
    Authenticating,
    Navigating,
    Extracting,
    Success,
    Failed,
}

impl BrowserPhase {
    /// 성공 경로의 다음 단계.
    pub fn next(self) -> BrowserPhase {
        match self {
            BrowserPhase::Idle => BrowserPhase::Authenticating,
            BrowserPhase::Authenticating => BrowserPhase::Navigating,
            BrowserPhase::Navigating => BrowserPhase::Extracting,
            BrowserPhase::Extracting => BrowserPhase::Success,
            BrowserPhase::Success => BrowserPhase::Success,
            BrowserPhase::Failed => BrowserPhase::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BrowserPhase::Success | BrowserPhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BrowserPhase::Idle => "idle",
            BrowserPhase::Authenticating => "authenticating",
            BrowserPhase::Navigating => "navigating",
            BrowserPhase::Extracting => "extracting",
            BrowserPhase::Success => "success",
            BrowserPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for BrowserPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 브라우저 자동화 소스.
pub struct BrowserSource {
    driver: Option<Arc<dyn BrowserDriver>>,
    credentials: Option<BrowserCredentials>,
    pool: SessionPool,
    phase_timeout: Duration,
}

impl BrowserSource {
    /// 새 소스를 생성합니다.
    ///
    /// `driver`가 없으면 모든 호출이 `NotImplemented`로 실패합니다.
    pub fn new(
        driver: Option<Arc<dyn BrowserDriver>>,
        credentials: Option<BrowserCredentials>,
        phase_timeout: Duration,
    ) -> Self {
        Self {
            driver,
            credentials,
            pool: SessionPool::new(),
            phase_timeout,
        }
    }

    /// 단계 하나를 시간 제한 안에서 실행합니다.
    async fn run_phase<T, F>(&self, phase: BrowserPhase, fut: F) -> SourceResult<T>
    where
        F: Future<Output = SourceResult<T>>,
    {
        debug!(phase = %phase, "Browser phase started");
        tokio::time::timeout(self.phase_timeout, fut)
            .await
            .map_err(|_| {
                SourceError::Timeout(format!(
                    "browser phase '{}' exceeded {}s",
                    phase,
                    self.phase_timeout.as_secs()
                ))
            })?
    }

    async fn drive(
        &self,
        lease: &mut SessionLease,
        driver: &dyn BrowserDriver,
        credentials: &BrowserCredentials,
        query: &CandleQuery,
    ) -> SourceResult<Vec<Value>> {
        let mut phase = BrowserPhase::Idle;

        if lease.is_empty() {
            info!("Opening new browser session");
            let session = self.run_phase(phase, driver.open_session()).await?;
            lease.install(session);
        }
        let session = lease.session_mut().ok_or_else(|| {
            SourceError::UpstreamUnavailable("browser session unavailable".to_string())
        })?;

        phase = phase.next();
        self.run_phase(phase, async {
            if !session.is_authenticated().await? {
                info!("Browser session not authenticated, logging in");
                session.authenticate(credentials).await?;
            }
            Ok::<(), SourceError>(())
        })
        .await?;

        phase = phase.next();
        self.run_phase(phase, session.open_chart(&query.symbol, query.interval))
            .await?;

        phase = phase.next();
        let mut records = self
            .run_phase(phase, session.extract_candles(query.limit))
            .await?;

        // 페이지가 최신순으로 그려져도 최근 limit개 유지
        records = keep_most_recent(records, query.limit);

        phase = phase.next();
        debug!(phase = %phase, query = %query, count = records.len(), "Browser extraction finished");
        Ok(records)
    }
}

#[async_trait]
impl CandleSource for BrowserSource {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn default_timeouts(&self) -> SourceTimeouts {
        SourceTimeouts::from_secs(60, 70)
    }

    async fn fetch(&self, query: &CandleQuery) -> SourceResult<Vec<Value>> {
        let driver = self.driver.as_deref().ok_or_else(|| {
            SourceError::NotImplemented(
                "browser source has no WebDriver endpoint configured".to_string(),
            )
        })?;
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            SourceError::AuthenticationFailed("browser credentials are not configured".to_string())
        })?;

        let mut lease = self.pool.acquire().await;
        lease.begin();
        match self.drive(&mut lease, driver, credentials, query).await {
            Ok(records) => {
                lease.release();
                Ok(records)
            }
            Err(e) => {
                warn!(phase = %BrowserPhase::Failed, error = %e, "Browser fetch failed, discarding session");
                lease.discard().await;
                Err(e)
            }
        }
    }

    async fn shutdown(&self) {
        self.pool.close().await;
    }
}
