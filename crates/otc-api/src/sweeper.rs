//! 캐시 만료 항목 주기 정리 작업.

use std::sync::Arc;
use std::time::Duration;

use otc_data::CandleService;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 주기적으로 만료된 캐시 항목을 정리하는 백그라운드 작업을 시작합니다.
///
/// `period`가 0이면 작업을 만들지 않습니다. 종료 토큰이 취소되면 멈춥니다.
pub fn spawn_cache_sweeper(
    service: Arc<CandleService>,
    period: Duration,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if period.is_zero() {
        info!("Cache sweeper disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = service.purge_expired_cache();
                    if removed > 0 {
                        debug!(removed, "Purged expired cache entries");
                    }
                }
            }
        }
        debug!("Cache sweeper stopped");
    }))
}
