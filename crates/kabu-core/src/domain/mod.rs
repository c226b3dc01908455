//! 수집 데이터 도메인 모델.

mod execution;
mod ohlcv;

pub use execution::*;
pub use ohlcv::*;
