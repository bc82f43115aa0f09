//! CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 캔들 조회 (서버와 같은 설정 로더/소스 선택 사용)
//! - 심볼 목록 출력

pub mod commands;

pub use commands::*;
