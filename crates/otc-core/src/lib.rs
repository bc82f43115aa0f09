//! # OTC Core
//!
//! OTC 캔들 서비스의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 서비스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 캔들(OHLCV) 및 조회 키 (`CandleQuery`)
//! - 심볼/간격/개수 검증 및 정규화 정책
//! - 이종 소스 응답을 표준 캔들로 바꾸는 정규화기
//! - 에러 분류 체계 (`FetchError`, `ErrorKind`)
//! - 주입 가능한 시계 (`Clock`)
//! - 설정 관리 및 로깅 인프라

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use clock::*;
pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
