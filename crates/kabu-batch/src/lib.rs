//! # Kabu Batch
//!
//! 주가 데이터 일괄 수집 엔진.
//!
//! - [`ErrorHandler`]: 에러 분류 태그에 따른 재시도/건너뜀/중단 결정과 에러 기록
//! - [`BatchTask`], [`TaskResult`]: 작업 단위와 그 결과
//! - [`StockDataWorker`]: 큐에서 작업을 꺼내 수집 → 저장하는 OS 스레드
//! - [`BatchEngine`]: 실행 생명주기와 집계, 영속 미러링
//! - [`bulk`]: 호출 단위 병렬 수집 경로 ([`BulkDataService`], [`ProgressTracker`])

pub mod bulk;
pub mod engine;
pub mod error;
pub mod error_handler;
pub mod execution;
pub mod task;
pub mod worker;

pub use bulk::{BulkDataService, BulkSummary, CompletionEstimate, ProgressInfo, ProgressTracker, StockFetchResult};
pub use engine::{BatchEngine, BatchEngineBuilder, ProgressCallback};
pub use error::{BulkError, EngineError, EngineResult, TaskError};
pub use error_handler::{ErrorAction, ErrorContext, ErrorHandler, ErrorReport, ErrorStatistics, RetryPolicy};
pub use execution::{
    BatchExecutionInfo, ExecutionSnapshot, QueueStatus, WorkerPoolStatus, WorkerSnapshot,
    WorkerStatus,
};
pub use task::{BatchTask, TaskResult};
pub use worker::{StockDataWorker, TaskSource, WorkerContext};
