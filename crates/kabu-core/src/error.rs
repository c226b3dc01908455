//! 수집/저장 에러 타입과 분류 체계.
//!
//! 수집기와 저장기는 자신이 만든 에러에 직접 분류 태그를 붙입니다.
//! 배치 엔진은 메시지 문자열을 해석하지 않고 이 태그만으로 재시도 여부를 결정합니다.
//!
//! - **Temporary**: 네트워크/타임아웃/요청 한도 등 재시도로 회복 가능한 장애
//! - **Permanent**: 잘못된 입력이나 데이터 형식 문제 (재시도 무의미)
//! - **System**: 저장소/트랜잭션 장애 (배치 전체 중단)

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 에러 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// 일시적 에러 (재시도 대상)
    Temporary,
    /// 영구적 에러 (건너뜀)
    Permanent,
    /// 시스템 에러 (배치 중단)
    System,
}

impl ErrorCategory {
    /// 모든 분류 반환.
    pub fn all() -> [ErrorCategory; 3] {
        [
            ErrorCategory::Temporary,
            ErrorCategory::Permanent,
            ErrorCategory::System,
        ]
    }

    /// 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Temporary => "temporary",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::System => "system",
        }
    }

    /// HTTP 상태 코드로부터 분류를 결정합니다.
    ///
    /// 429/503/504는 일시적, 그 외 상태는 모두 영구적입니다.
    /// 알 수 없는 실패를 무한히 재시도하지 않도록 기본값은 영구적입니다.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            429 | 503 | 504 => ErrorCategory::Temporary,
            _ => ErrorCategory::Permanent,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 분류 태그를 가진 에러.
pub trait Classify: std::error::Error + Send + Sync {
    /// 에러 분류.
    fn category(&self) -> ErrorCategory;

    /// 안정적인 에러 종류 이름 (로그/리포트용).
    fn kind(&self) -> &str;

    /// 연관된 HTTP 상태 코드.
    fn status_code(&self) -> Option<u16> {
        None
    }
}

/// 데이터 수집 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// HTTP 에러 응답
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 조회 결과 없음
    #[error("No data: {0}")]
    NoData(String),

    /// 데이터 형식 오류
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 잘못된 종목 코드
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// 데이터 소스 자체의 장애 (클라이언트 초기화 실패 등)
    #[error("Data source unavailable: {0}")]
    Unavailable(String),
}

impl Classify for FetchError {
    fn category(&self) -> ErrorCategory {
        match self {
            FetchError::Network(_)
            | FetchError::Timeout(_)
            | FetchError::RateLimited(_)
            | FetchError::Unavailable(_) => ErrorCategory::Temporary,
            FetchError::Http { status, .. } => ErrorCategory::from_http_status(*status),
            FetchError::NoData(_) | FetchError::InvalidData(_) | FetchError::InvalidSymbol(_) => {
                ErrorCategory::Permanent
            }
        }
    }

    fn kind(&self) -> &str {
        match self {
            FetchError::Network(_) => "FetchError::Network",
            FetchError::Timeout(_) => "FetchError::Timeout",
            FetchError::RateLimited(_) => "FetchError::RateLimited",
            FetchError::Http { .. } => "FetchError::Http",
            FetchError::NoData(_) => "FetchError::NoData",
            FetchError::InvalidData(_) => "FetchError::InvalidData",
            FetchError::InvalidSymbol(_) => "FetchError::InvalidSymbol",
            FetchError::Unavailable(_) => "FetchError::Unavailable",
        }
    }

    fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            FetchError::RateLimited(_) => Some(429),
            _ => None,
        }
    }
}

/// 데이터 저장 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    /// 데이터베이스 연결/쿼리 에러
    #[error("Database error: {0}")]
    Database(String),

    /// 트랜잭션 커밋/롤백 실패
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// 저장 불가능한 레코드
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl Classify for SaveError {
    fn category(&self) -> ErrorCategory {
        match self {
            SaveError::Database(_) | SaveError::Transaction(_) => ErrorCategory::System,
            SaveError::InvalidRecord(_) => ErrorCategory::Permanent,
        }
    }

    fn kind(&self) -> &str {
        match self {
            SaveError::Database(_) => "SaveError::Database",
            SaveError::Transaction(_) => "SaveError::Transaction",
            SaveError::InvalidRecord(_) => "SaveError::InvalidRecord",
        }
    }
}

/// 수집 작업 Result 타입.
pub type FetchResult<T> = Result<T, FetchError>;

/// 저장 작업 Result 타입.
pub type SaveResult<T> = Result<T, SaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_categories() {
        assert_eq!(
            FetchError::Timeout("30s".into()).category(),
            ErrorCategory::Temporary
        );
        assert_eq!(
            FetchError::Network("reset".into()).category(),
            ErrorCategory::Temporary
        );
        assert_eq!(
            FetchError::InvalidData("high < low".into()).category(),
            ErrorCategory::Permanent
        );
    }

    #[test]
    fn test_http_status_mapping() {
        for status in [429, 503, 504] {
            let err = FetchError::Http {
                status,
                message: String::new(),
            };
            assert_eq!(err.category(), ErrorCategory::Temporary);
            assert_eq!(err.status_code(), Some(status));
        }
        for status in [401, 403, 404] {
            let err = FetchError::Http {
                status,
                message: String::new(),
            };
            assert_eq!(err.category(), ErrorCategory::Permanent);
        }
        assert_eq!(ErrorCategory::from_http_status(500), ErrorCategory::Permanent);
    }

    #[test]
    fn test_save_error_is_system() {
        assert_eq!(
            SaveError::Database("pool timed out".into()).category(),
            ErrorCategory::System
        );
        assert_eq!(
            SaveError::InvalidRecord("null close".into()).category(),
            ErrorCategory::Permanent
        );
    }

    #[test]
    fn test_message_text_does_not_affect_category() {
        // "timeout"이라는 문자열이 있어도 변형 태그가 우선
        let err = FetchError::InvalidSymbol("timeout".into());
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }
}
