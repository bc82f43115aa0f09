//! 캔들 도메인 모델과 정규화.

mod candle;
mod normalize;

pub use candle::*;
pub use normalize::*;
