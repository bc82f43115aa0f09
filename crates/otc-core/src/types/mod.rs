//! 요청 입력 검증에 사용되는 공통 타입.

mod interval;
mod limit;
mod symbol;

pub use interval::*;
pub use limit::*;
pub use symbol::*;
