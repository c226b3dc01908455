//! # Kabu Core
//!
//! 주가 데이터 일괄 수집 엔진의 핵심 타입을 제공합니다.
//!
//! 이 크레이트는 수집 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 시간축(`Interval`) 및 종목 코드 헬퍼
//! - OHLCV 바 데이터 구조체
//! - 수집/저장 에러 분류 체계 (`ErrorCategory`, `Classify`)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
