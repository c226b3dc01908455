//! 일괄 수집 진행 추적.

use crate::bulk::StockFetchResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// 요약에 남기는 최대 에러 상세 수.
pub const MAX_ERROR_DETAILS: usize = 100;

/// 실패한 종목 한 건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub symbol: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// 진행 콜백과 진행 로그가 받는 페이로드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    /// 처리 / 전체 × 100 (소수 둘째 자리)
    pub progress_percentage: f64,
    pub current_symbol: Option<String>,
    /// 경과 시간 (초)
    pub elapsed_time: f64,
    pub stocks_per_second: f64,
    /// 예상 완료 시각. 남은 작업이 없거나 속도를 알 수 없으면 `None`
    pub estimated_completion: Option<DateTime<Utc>>,
    pub error_count: usize,
}

/// 일괄 수집 최종 요약.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSummary {
    #[serde(flatten)]
    pub progress: ProgressInfo,
    pub status: String,
    pub end_time: DateTime<Utc>,
    pub error_details: Vec<ErrorDetail>,
    /// 완료 순서대로의 종목별 결과
    pub results: Vec<StockFetchResult>,
}

/// 진행 트래커.
///
/// 결과를 모으는 호출자 스레드 하나에서만 갱신합니다.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    processed: usize,
    successful: usize,
    failed: usize,
    started: Instant,
    current_symbol: Option<String>,
    error_details: Vec<ErrorDetail>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            successful: 0,
            failed: 0,
            started: Instant::now(),
            current_symbol: None,
            error_details: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// 종목 하나의 처리 결과를 반영합니다.
    pub fn update(&mut self, symbol: &str, success: bool, error_message: Option<&str>) {
        self.processed += 1;
        self.current_symbol = Some(symbol.to_string());

        if success {
            self.successful += 1;
        } else {
            self.failed += 1;
            if let Some(error) = error_message {
                self.error_details.push(ErrorDetail {
                    symbol: symbol.to_string(),
                    error: error.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }

    /// 진행 로그를 남길 시점인지 (10건마다, 그리고 마지막).
    pub fn should_log(&self) -> bool {
        self.processed % 10 == 0 || self.processed == self.total
    }

    pub fn get_progress(&self) -> ProgressInfo {
        let elapsed = self.started.elapsed().as_secs_f64();
        let progress_percentage = if self.total > 0 {
            self.processed as f64 / self.total as f64 * 100.0
        } else {
            0.0
        };
        let stocks_per_second = if elapsed > 0.0 {
            self.processed as f64 / elapsed
        } else {
            0.0
        };

        let remaining = self.total.saturating_sub(self.processed);
        let eta_seconds = if stocks_per_second > 0.0 {
            remaining as f64 / stocks_per_second
        } else {
            0.0
        };
        let estimated_completion = if eta_seconds > 0.0 {
            chrono::Duration::from_std(std::time::Duration::from_secs_f64(eta_seconds))
                .ok()
                .map(|eta| Utc::now() + eta)
        } else {
            None
        };

        ProgressInfo {
            total: self.total,
            processed: self.processed,
            successful: self.successful,
            failed: self.failed,
            progress_percentage: round2(progress_percentage),
            current_symbol: self.current_symbol.clone(),
            elapsed_time: round2(elapsed),
            stocks_per_second: round2(stocks_per_second),
            estimated_completion,
            error_count: self.error_details.len(),
        }
    }

    /// 최종 요약. 에러 상세는 앞에서부터 최대 100건만 남깁니다.
    pub fn into_summary(self, results: Vec<StockFetchResult>) -> BulkSummary {
        let progress = self.get_progress();
        let mut error_details = self.error_details;
        error_details.truncate(MAX_ERROR_DETAILS);

        BulkSummary {
            progress,
            status: "completed".to_string(),
            end_time: Utc::now(),
            error_details,
            results,
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
