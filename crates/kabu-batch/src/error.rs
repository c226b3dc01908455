//! 배치 엔진 오류 타입.
//!
//! - `EngineError`: 생명주기 호출 오류 (호출자/프로그래머 오류로 즉시 반환)
//! - `BulkError`: 일괄 수집 입력 오류
//! - `TaskError`: 작업 단위 실패. 워커 경계에서 결과 값으로 변환되며 전파되지 않습니다.

use kabu_core::{Classify, ErrorCategory, ExecutionStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// 엔진 생명주기 오류.
#[derive(Debug, Error)]
pub enum EngineError {
    /// 실행을 찾을 수 없음
    #[error("Execution not found: {0}")]
    ExecutionNotFound(Uuid),

    /// 허용되지 않는 상태 전이
    #[error("Invalid transition for execution {id}: {operation} requires {expected}, found {actual}")]
    InvalidTransition {
        id: Uuid,
        operation: &'static str,
        expected: &'static str,
        actual: ExecutionStatus,
    },

    /// 엔진이 이미 종료됨
    #[error("Engine has been shut down")]
    Shutdown,

    /// 작업 큐가 닫힘
    #[error("Task queue closed")]
    QueueClosed,

    /// 워커 스레드 생성 실패
    #[error("Failed to spawn worker {worker_id}: {source}")]
    WorkerSpawn {
        worker_id: String,
        #[source]
        source: std::io::Error,
    },

    /// 완료 대기 타임아웃
    #[error("Timed out waiting for execution {0}")]
    WaitTimeout(Uuid),
}

/// 일괄 수집 입력 오류.
#[derive(Debug, Error)]
pub enum BulkError {
    /// 종목 목록 파일 읽기 실패
    #[error("Failed to read symbol list {path}: {source}")]
    ListFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 빈 종목 목록
    #[error("Symbol list is empty")]
    EmptyList,

    /// 스레드 풀 생성 실패
    #[error("Failed to spawn bulk worker: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// 작업 단위 실패.
///
/// 수집기/저장기 오류의 분류 태그와 종류를 그대로 보존합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct TaskError {
    pub category: ErrorCategory,
    pub kind: String,
    pub message: String,
    pub status_code: Option<u16>,
}

impl TaskError {
    /// 분류 가능한 오류에서 생성합니다.
    pub fn from_classified(err: &dyn Classify) -> Self {
        Self {
            category: err.category(),
            kind: err.kind().to_string(),
            message: err.to_string(),
            status_code: err.status_code(),
        }
    }

    /// 워커 내부 패닉 등 예상하지 못한 오류.
    ///
    /// 원인을 알 수 없으므로 재시도하지 않도록 영구적 오류로 분류합니다.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Permanent,
            kind: "Unexpected".to_string(),
            message: message.into(),
            status_code: None,
        }
    }
}

impl Classify for TaskError {
    fn category(&self) -> ErrorCategory {
        self.category
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn status_code(&self) -> Option<u16> {
        self.status_code
    }
}
