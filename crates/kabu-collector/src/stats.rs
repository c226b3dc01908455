//! 수집 통계 구조체.

use kabu_batch::{BulkSummary, ExecutionSnapshot};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 대상 종목 수
    pub total: usize,
    /// 성공 종목 수
    pub success: usize,
    /// 실패 종목 수
    pub errors: usize,
    /// 처리되지 않은 종목 수 (취소/중단)
    pub skipped: usize,
    /// 저장된 총 레코드 수
    pub total_records: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 일괄 수집 요약에서 생성
    pub fn from_bulk(summary: &BulkSummary) -> Self {
        let progress = &summary.progress;
        Self {
            total: progress.total,
            success: progress.successful,
            errors: progress.failed,
            skipped: progress.total.saturating_sub(progress.processed),
            total_records: summary.results.iter().map(|r| r.records_saved).sum(),
            elapsed: Duration::from_secs_f64(progress.elapsed_time.max(0.0)),
        }
    }

    /// 엔진 실행 스냅샷에서 생성
    pub fn from_execution(snapshot: &ExecutionSnapshot, total_records: usize) -> Self {
        let elapsed = match (snapshot.start_time, snapshot.end_time) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        };
        Self {
            total: snapshot.total_tasks,
            success: snapshot.completed_tasks,
            errors: snapshot.failed_tasks,
            skipped: snapshot.total_tasks.saturating_sub(snapshot.processed_tasks()),
            total_records,
            elapsed,
        }
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            skipped = self.skipped,
            total_records = self.total_records,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}
