//! 배치 실행 집계와 상태 스냅샷.

use chrono::{DateTime, Utc};
use kabu_core::ExecutionStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 실행 한 건의 메모리 집계.
///
/// 엔진 락 아래에서만 변경됩니다.
/// `completed_tasks + failed_tasks <= total_tasks`가 항상 성립합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchExecutionInfo {
    pub execution_id: Uuid,
    pub batch_type: String,
    pub status: ExecutionStatus,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// 영속 레코드 ID. 저장소 미사용/장애 시 `None`.
    pub db_execution_id: Option<i64>,
}

impl BatchExecutionInfo {
    pub fn new(batch_type: impl Into<String>, total_tasks: usize) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            batch_type: batch_type.into(),
            status: ExecutionStatus::Pending,
            total_tasks,
            completed_tasks: 0,
            failed_tasks: 0,
            created_at: Utc::now(),
            start_time: None,
            end_time: None,
            error_message: None,
            db_execution_id: None,
        }
    }

    pub fn processed_tasks(&self) -> usize {
        self.completed_tasks + self.failed_tasks
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 모든 작업 결과가 도착했는지.
    pub fn all_reported(&self) -> bool {
        self.processed_tasks() >= self.total_tasks
    }

    /// 완료 규칙에 따른 종료 상태.
    pub fn final_status(&self) -> ExecutionStatus {
        if self.failed_tasks == 0 {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        }
    }

    /// 진행률: 성공 작업 / 전체 작업 × 100.
    pub fn progress_percentage(&self) -> f64 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        self.completed_tasks as f64 / self.total_tasks as f64 * 100.0
    }

    /// 성공률: 성공 작업 / 처리 작업 × 100.
    pub fn success_rate(&self) -> f64 {
        let processed = self.processed_tasks();
        if processed == 0 {
            return 0.0;
        }
        self.completed_tasks as f64 / processed as f64 * 100.0
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            execution_id: self.execution_id,
            batch_type: self.batch_type.clone(),
            status: self.status,
            total_tasks: self.total_tasks,
            completed_tasks: self.completed_tasks,
            failed_tasks: self.failed_tasks,
            progress_percentage: self.progress_percentage(),
            success_rate: self.success_rate(),
            start_time: self.start_time,
            end_time: self.end_time,
            error_message: self.error_message.clone(),
            db_execution_id: self.db_execution_id,
        }
    }
}

/// `get_execution_status`와 진행 콜백이 받는 페이로드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub execution_id: Uuid,
    pub batch_type: String,
    pub status: ExecutionStatus,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub progress_percentage: f64,
    pub success_rate: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub db_execution_id: Option<i64>,
}

impl ExecutionSnapshot {
    pub fn processed_tasks(&self) -> usize {
        self.completed_tasks + self.failed_tasks
    }
}

/// 워커 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Working,
    Error,
    Stopped,
}

/// 워커가 처리 중인 작업 (조회 전용 참조).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentTask {
    pub task_id: Uuid,
    pub symbol: String,
    pub execution_id: Option<Uuid>,
}

/// 워커 한 개의 스냅샷.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub worker_id: String,
    pub status: WorkerStatus,
    pub current_task: Option<CurrentTask>,
    pub processed_tasks: u64,
    pub failed_tasks: u64,
    pub last_activity: DateTime<Utc>,
}

/// 워커 풀 스냅샷.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolStatus {
    pub total_workers: usize,
    pub active_workers: usize,
    pub workers: BTreeMap<String, WorkerSnapshot>,
}

/// 작업 큐 스냅샷.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub task_queue_size: usize,
    pub task_queue_max_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let mut info = BatchExecutionInfo::new("partial", 10);
        assert_eq!(info.progress_percentage(), 0.0);
        assert_eq!(info.success_rate(), 0.0);

        info.completed_tasks = 3;
        info.failed_tasks = 1;
        assert_eq!(info.progress_percentage(), 30.0);
        assert_eq!(info.success_rate(), 75.0);
        assert!(!info.all_reported());
    }

    #[test]
    fn test_final_status() {
        let mut info = BatchExecutionInfo::new("all_stocks", 2);
        info.completed_tasks = 2;
        assert!(info.all_reported());
        assert_eq!(info.final_status(), ExecutionStatus::Completed);

        info.completed_tasks = 1;
        info.failed_tasks = 1;
        assert_eq!(info.final_status(), ExecutionStatus::Failed);
    }

    #[test]
    fn test_snapshot_serializes_lowercase_status() {
        let info = BatchExecutionInfo::new("partial", 1);
        let json = serde_json::to_value(info.snapshot()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["total_tasks"], 1);
    }
}
