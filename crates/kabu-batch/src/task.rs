//! 배치 작업과 작업 결과.
//!
//! 작업은 큐에 들어간 뒤에는 식별/대상 필드가 고정됩니다. `started_at`,
//! `worker_id`, `retry_count` 같은 계측 필드만 작업을 가진 워커가 갱신합니다.

use crate::error::TaskError;
use crate::error_handler::ErrorAction;
use chrono::{DateTime, Utc};
use kabu_core::Interval;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 배치 작업: 한 종목의 (interval, period) 수집-저장 단위.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchTask {
    pub id: Uuid,
    pub symbol: String,
    pub interval: Interval,
    /// Yahoo range 표기. 없으면 시간축 권장 기간.
    pub period: Option<String>,
    /// 우선순위 (표시용, 큐는 FIFO)
    pub priority: i32,
    pub retry_count: u32,
    /// 작업별 최대 재시도 횟수. 없으면 엔진 재시도 정책을 따릅니다.
    pub max_retries: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub worker_id: Option<String>,
    /// 소속 실행. 큐에 넣을 때 엔진이 지정합니다.
    pub execution_id: Option<Uuid>,
}

impl BatchTask {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            interval,
            period: None,
            priority: 0,
            retry_count: 0,
            max_retries: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            worker_id: None,
            execution_id: None,
        }
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// 종목 목록에서 같은 설정의 작업 목록을 만듭니다.
    pub fn for_symbols<I, S>(symbols: I, interval: Interval, period: Option<&str>) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        symbols
            .into_iter()
            .map(|s| {
                let task = BatchTask::new(s, interval);
                match period {
                    Some(p) => task.with_period(p),
                    None => task,
                }
            })
            .collect()
    }
}

/// 작업 실행 결과.
///
/// 실패도 값으로 표현되며 엔진으로 예외가 전파되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub symbol: String,
    pub success: bool,
    pub records_fetched: usize,
    pub records_saved: usize,
    pub records_skipped: usize,
    /// 총 시도 횟수 (첫 시도 포함)
    pub attempts: u32,
    pub error: Option<TaskError>,
    /// 실패 시 오류 처리기의 결정
    pub action: Option<ErrorAction>,
    pub worker_id: Option<String>,
    pub duration_ms: u64,
}

impl TaskResult {
    pub fn succeeded(
        task: &BatchTask,
        records_fetched: usize,
        records_saved: usize,
        records_skipped: usize,
    ) -> Self {
        Self {
            task_id: task.id,
            symbol: task.symbol.clone(),
            success: true,
            records_fetched,
            records_saved,
            records_skipped,
            attempts: task.retry_count + 1,
            error: None,
            action: None,
            worker_id: task.worker_id.clone(),
            duration_ms: 0,
        }
    }

    pub fn failed(task: &BatchTask, error: TaskError, action: ErrorAction) -> Self {
        Self {
            task_id: task.id,
            symbol: task.symbol.clone(),
            success: false,
            records_fetched: 0,
            records_saved: 0,
            records_skipped: 0,
            attempts: task.retry_count + 1,
            error: Some(error),
            action: Some(action),
            worker_id: task.worker_id.clone(),
            duration_ms: 0,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// 실행 전체를 중단해야 하는 결과인지.
    pub fn is_abort(&self) -> bool {
        self.action == Some(ErrorAction::Abort)
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}
