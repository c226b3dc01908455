//! 에러 타입 정의.

use kabu_data::StoreError;
use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 저장소 에러
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 데이터 소스 초기화 에러
    #[error("Data source error: {0}")]
    DataSource(String),

    /// 런타임 생성 실패
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
