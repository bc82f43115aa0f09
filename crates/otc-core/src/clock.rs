//! 주입 가능한 시계.
//!
//! 캐시 TTL 판정과 모의 캔들 생성이 같은 시계를 공유합니다.
//! 테스트에서는 `ManualClock`으로 시간을 고정하거나 앞당깁니다.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// 현재 시각 제공자.
pub trait Clock: Send + Sync {
    /// Unix epoch 기준 밀리초.
    fn now_millis(&self) -> i64;

    /// Unix epoch 기준 초.
    fn now_secs(&self) -> i64 {
        self.now_millis().div_euclid(1000)
    }
}

/// 시스템 시계.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// 수동으로 조작하는 시계.
///
/// 복제본끼리 같은 시각을 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    /// 주어진 초 단위 시각으로 고정된 시계를 생성합니다.
    pub fn at_secs(secs: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(secs * 1000)),
        }
    }

    /// 시각을 앞당깁니다.
    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// 공유 시계 핸들.
pub type SharedClock = Arc<dyn Clock>;
