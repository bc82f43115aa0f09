//! 캔들 조회 오케스트레이션 및 결과 캐싱.
//!
//! 이 crate는 다음을 제공합니다:
//! - 입력 검증부터 정규화까지 묶는 캔들 조회 서비스
//! - 짧은 TTL의 결과 캐시

pub mod cache;
pub mod service;

pub use cache::{CacheStats, ResultCache};
pub use service::CandleService;
