//! 브라우저 드라이버 seam과 세션 풀.
//!
//! 드라이버는 세션을 열고, 세션은 로그인/차트 이동/캔들 추출을 수행합니다.
//! 풀은 세션 하나를 보관하며 한 번에 한 요청만 페이지를 조작하도록 직렬화합니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use otc_core::{Interval, Symbol};
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::traits::SourceResult;

/// 세션 종료 대기 제한.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// 사이트 로그인 자격증명.
#[derive(Debug, Clone)]
pub struct BrowserCredentials {
    pub email: String,
    pub password: SecretString,
}

/// 브라우저 세션 생성기.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// 새 브라우저 세션을 엽니다.
    async fn open_session(&self) -> SourceResult<Box<dyn BrowserSession>>;
}

/// 열린 브라우저 세션.
#[async_trait]
pub trait BrowserSession: Send {
    /// 현재 로그인 상태인지 확인합니다.
    async fn is_authenticated(&mut self) -> SourceResult<bool>;

    /// 로그인합니다.
    async fn authenticate(&mut self, credentials: &BrowserCredentials) -> SourceResult<()>;

    /// 심볼/간격 차트로 이동합니다.
    async fn open_chart(&mut self, symbol: &Symbol, interval: Interval) -> SourceResult<()>;

    /// 페이지에서 최근 캔들 레코드를 읽습니다.
    async fn extract_candles(&mut self, limit: usize) -> SourceResult<Vec<Value>>;

    /// 세션을 종료합니다. 실패는 무시됩니다.
    async fn close(&mut self);
}

type Slot = Option<Box<dyn BrowserSession>>;

/// 단일 슬롯 세션 풀.
#[derive(Clone, Default)]
pub struct SessionPool {
    slot: Arc<Mutex<Slot>>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 슬롯을 임대합니다. 다른 요청이 사용 중이면 반환될 때까지 기다립니다.
    pub async fn acquire(&self) -> SessionLease {
        SessionLease {
            guard: self.slot.clone().lock_owned().await,
            in_use: false,
        }
    }

    /// 보관 중인 세션을 종료합니다.
    pub async fn close(&self) {
        let lease = self.acquire().await;
        lease.discard().await;
    }
}

/// 세션 슬롯 임대.
///
/// `begin` 이후 `release` 없이 drop되면 (요청 future 취소 등) 페이지 상태를
/// 알 수 없으므로 세션을 슬롯에서 빼서 닫습니다. `release` 후 drop되면 세션은
/// 풀에 남고, `discard` 시 종료 후 제거됩니다.
pub struct SessionLease {
    guard: OwnedMutexGuard<Slot>,
    in_use: bool,
}

impl SessionLease {
    pub fn is_empty(&self) -> bool {
        self.guard.is_none()
    }

    pub fn install(&mut self, session: Box<dyn BrowserSession>) {
        *self.guard = Some(session);
    }

    pub fn session_mut(&mut self) -> Option<&mut (dyn BrowserSession + 'static)> {
        self.guard.as_deref_mut()
    }

    /// 세션 조작을 시작합니다.
    pub fn begin(&mut self) {
        self.in_use = true;
    }

    /// 조작을 마치고 세션을 풀에 돌려줍니다.
    pub fn release(mut self) {
        self.in_use = false;
    }

    /// 세션을 종료하고 슬롯을 비웁니다.
    pub async fn discard(mut self) {
        self.in_use = false;
        if let Some(session) = self.guard.take() {
            close_session(session).await;
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if !self.in_use {
            return;
        }
        if let Some(session) = self.guard.take() {
            warn!("Browser lease dropped mid-request, discarding session");
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(close_session(session));
            }
        }
    }
}

async fn close_session(mut session: Box<dyn BrowserSession>) {
    debug!("Closing browser session");
    if tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await.is_err() {
        warn!("Browser session close timed out");
    }
}
