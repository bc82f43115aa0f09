//! 애플리케이션 공유 상태.

use std::sync::Arc;
use std::time::Instant;

use otc_core::CandleFieldStyle;
use otc_data::CandleService;
use secrecy::SecretString;

/// 핸들러 간 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 캔들 조회 서비스
    pub service: Arc<CandleService>,
    /// 서비스 접근 토큰 (없으면 보호된 엔드포인트는 500)
    pub token: Option<SecretString>,
    /// 응답 필드 이름 형태
    pub field_style: CandleFieldStyle,
    /// 애플리케이션 버전
    pub version: String,
    /// 서버 시작 시각
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: Arc<CandleService>, token: Option<SecretString>) -> Self {
        Self {
            service,
            token,
            field_style: CandleFieldStyle::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
        }
    }

    pub fn with_field_style(mut self, style: CandleFieldStyle) -> Self {
        self.field_style = style;
        self
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// 테스트용 상태 (모의 소스, 고정 시각, 토큰 "test-token").
#[cfg(test)]
pub fn create_test_state() -> AppState {
    use otc_core::ManualClock;
    use otc_data::ResultCache;
    use otc_source::MockSource;
    use std::time::Duration;

    let clock: otc_core::SharedClock = Arc::new(ManualClock::at_secs(1_699_999_980));
    let source = Arc::new(MockSource::new(clock.clone()));
    let cache = Arc::new(ResultCache::new(clock, Duration::from_secs(2)));
    let service = Arc::new(CandleService::new(source, cache));

    AppState::new(service, Some(SecretString::new("test-token".into())))
}
