//! 영속 저장소 오류 타입.

use thiserror::Error;

/// 실행 기록 저장소 오류.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    Connection(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    Query(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 저장소 일시 사용 불가
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// 마이그레이션 실패
    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::PoolClosed => StoreError::Unavailable("pool closed".to_string()),
            sqlx::Error::Io(e) => StoreError::Connection(e.to_string()),
            sqlx::Error::Database(db_err) => StoreError::Query(db_err.message().to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
