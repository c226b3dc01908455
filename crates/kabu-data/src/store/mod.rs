//! 배치 실행 기록 저장소.
//!
//! `batch_executions` 테이블(실행 단위)과 `batch_execution_details` 테이블
//! (종목 단위)을 다룹니다. 엔진 실행 중에는 메모리 집계가 기준이고,
//! 재시작 후에는 이 저장소의 기록이 기준입니다.

mod memory;
mod postgres;

pub use memory::MemoryExecutionStore;
pub use postgres::PgExecutionStore;

use crate::error::Result;
use chrono::{DateTime, Utc};
use kabu_core::{DetailStatus, ExecutionStatus};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 배치 실행 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExecutionRecord {
    pub id: i64,
    pub batch_type: String,
    pub status: String,
    pub total_stocks: i32,
    pub processed_stocks: i32,
    pub successful_stocks: i32,
    pub failed_stocks: i32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// 진행률 (0.0 ~ 100.0).
    pub fn progress_percentage(&self) -> f64 {
        if self.total_stocks <= 0 {
            return 0.0;
        }
        self.processed_stocks as f64 / self.total_stocks as f64 * 100.0
    }

    /// 실행 시간 (초). 종료 전이면 현재 시각 기준입니다.
    pub fn duration_seconds(&self) -> Option<f64> {
        let start = self.start_time?;
        let end = self.end_time.unwrap_or_else(Utc::now);
        Some((end - start).num_milliseconds() as f64 / 1000.0)
    }

    /// 파싱된 상태. 알 수 없는 문자열이면 `None`.
    pub fn parsed_status(&self) -> Option<ExecutionStatus> {
        self.status.parse().ok()
    }
}

/// 종목별 상세 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExecutionDetailRecord {
    pub id: i64,
    pub batch_execution_id: i64,
    pub stock_code: String,
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub records_inserted: i32,
    pub created_at: Option<DateTime<Utc>>,
}

impl ExecutionDetailRecord {
    pub fn duration_seconds(&self) -> Option<f64> {
        let start = self.start_time?;
        let end = self.end_time.unwrap_or_else(Utc::now);
        Some((end - start).num_milliseconds() as f64 / 1000.0)
    }
}

/// 실행 기록 영속화 인터페이스.
///
/// 각 호출은 자체 세션(트랜잭션)을 열고 닫습니다. 구현체는 스레드 간에
/// 세션을 공유하지 않습니다.
pub trait ExecutionStore: Send + Sync {
    /// 실행 레코드를 생성하고 ID를 반환합니다.
    fn create_execution(
        &self,
        batch_type: &str,
        total_stocks: i32,
        status: ExecutionStatus,
    ) -> Result<i64>;

    /// 상태를 갱신합니다. `start_time`이 주어지면 함께 기록합니다.
    fn update_execution_status(
        &self,
        id: i64,
        status: ExecutionStatus,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// 처리/성공/실패 건수를 갱신합니다.
    fn update_execution_progress(
        &self,
        id: i64,
        processed: i32,
        successful: i32,
        failed: i32,
    ) -> Result<()>;

    /// 종료 상태와 종료 시각을 기록합니다.
    fn complete_execution(
        &self,
        id: i64,
        status: ExecutionStatus,
        end_time: DateTime<Utc>,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// 종목 상세 레코드를 `processing` 상태로 생성합니다.
    fn create_detail(&self, execution_id: i64, stock_code: &str) -> Result<i64>;

    /// 종목 상세 레코드를 종료 상태로 갱신합니다.
    fn update_detail(
        &self,
        detail_id: i64,
        status: DetailStatus,
        records_inserted: i32,
        error_message: Option<&str>,
    ) -> Result<()>;

    fn get_execution(&self, id: i64) -> Result<Option<ExecutionRecord>>;

    /// 최근 실행 목록 (생성 역순).
    fn list_executions(
        &self,
        limit: i64,
        offset: i64,
        status: Option<ExecutionStatus>,
    ) -> Result<Vec<ExecutionRecord>>;

    fn get_details(&self, execution_id: i64) -> Result<Vec<ExecutionDetailRecord>>;
}
