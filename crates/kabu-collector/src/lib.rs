//! Standalone collector for the kabu bulk acquisition engine.
//!
//! 이 crate는 엔진을 구동하는 바이너리를 제공합니다:
//! - `bulk`: 호출 단위 병렬 수집 (제출 후 대기)
//! - `batch`: 배치 엔진 실행 (제출 후 추적, 실행 기록 영속화)
//! - `estimate`: 소요 시간 추정
//! - `history`: 저장된 실행 기록 조회

pub mod config;
pub mod error;
pub mod runtime;
pub mod stats;

pub use config::{parse_symbols, CollectorConfig};
pub use error::{CollectorError, Result};
pub use runtime::{build_runtime, Collaborators};
pub use stats::CollectionStats;
