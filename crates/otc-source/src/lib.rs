//! 캔들 소스 어댑터.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `CandleSource` trait: 통합 소스 인터페이스
//! - 모의 소스 (결정적 생성)
//! - 외부 캔들 서비스 위임 소스
//! - 금융 시계열 API 소스
//! - 브라우저 자동화 소스 (WebDriver)
//! - 재시도 정책과 설정 기반 소스 선택

pub mod browser;
pub mod error;
pub mod factory;
pub mod mock;
pub mod proxy;
pub mod retry;
pub mod time_series;
pub mod traits;

pub use browser::{
    BrowserCredentials, BrowserDriver, BrowserPhase, BrowserSession, BrowserSource, PageSettings,
    SessionLease, SessionPool, WebDriverClient,
};
pub use error::*;
pub use factory::{build_source, build_source_of_kind, resolve_timeouts, retry_policy};
pub use mock::MockSource;
pub use proxy::ProxySource;
pub use retry::RetryPolicy;
pub use time_series::TimeSeriesApiSource;
pub use traits::*;
