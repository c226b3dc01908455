//! 오류 분류 및 재시도 정책.
//!
//! 작업 실패를 TEMPORARY/PERMANENT/SYSTEM으로 분류하고
//! RETRY/SKIP/ABORT 중 하나를 결정합니다. 모든 결정은 append-only
//! 오류 기록에 남고, 리포트와 통계는 이 기록에 대한 순수 집계입니다.
//!
//! | 분류 | 조건 | 결정 |
//! |------|------|------|
//! | TEMPORARY | `retry_count < max_retries` | RETRY |
//! | TEMPORARY | `retry_count >= max_retries` | SKIP |
//! | PERMANENT | - | SKIP |
//! | SYSTEM | - | ABORT |

use chrono::{DateTime, Utc};
use kabu_core::{Classify, ErrorCategory, RetryConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 리포트에 포함할 상위 오류 대상 수.
const TOP_SUBJECTS: usize = 10;
/// 리포트에 포함할 최근 오류 수.
const RECENT_ERRORS: usize = 50;

/// 오류 처리 결정.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorAction {
    /// 백오프 후 재시도
    Retry,
    /// 이 작업만 실패 처리
    Skip,
    /// 실행 전체 중단
    Abort,
}

impl ErrorAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorAction::Retry => "retry",
            ErrorAction::Skip => "skip",
            ErrorAction::Abort => "abort",
        }
    }
}

impl fmt::Display for ErrorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 지수 백오프 재시도 정책.
///
/// `retry_count`번째 재시도 전 대기 시간은 `base_delay * multiplier^retry_count`입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            multiplier,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.base_delay(),
            config.backoff_multiplier,
        )
    }

    /// 재시도 대기 시간.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        // 정수 배수는 부동소수점 오차 없이 계산
        if self.multiplier >= 0.0 && self.multiplier.fract() == 0.0 && self.multiplier <= u32::MAX as f64 {
            return (self.multiplier as u32)
                .checked_pow(retry_count)
                .and_then(|factor| self.base_delay.checked_mul(factor))
                .unwrap_or(Duration::MAX);
        }
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        if !factor.is_finite() {
            return Duration::MAX;
        }
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }

    /// 분류와 재시도 횟수로 결정을 내립니다.
    pub fn decide(&self, category: ErrorCategory, retry_count: u32, max_retries: Option<u32>) -> ErrorAction {
        let max_retries = max_retries.unwrap_or(self.max_retries);
        match category {
            ErrorCategory::Temporary if retry_count < max_retries => ErrorAction::Retry,
            ErrorCategory::Temporary | ErrorCategory::Permanent => ErrorAction::Skip,
            ErrorCategory::System => ErrorAction::Abort,
        }
    }
}

/// `handle_error` 호출 컨텍스트.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// 지금까지의 재시도 횟수
    pub retry_count: u32,
    /// 작업별 최대 재시도 횟수 (없으면 정책 값)
    pub max_retries: Option<u32>,
    /// 부가 정보 (execution_id, interval 등)
    pub extra: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn new(retry_count: u32) -> Self {
        Self {
            retry_count,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.extra.insert(key.into(), value.to_string());
        self
    }
}

/// 오류 기록 한 건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub error_type: ErrorCategory,
    /// 오류 대상 (종목 코드)
    pub subject_id: String,
    pub message: String,
    /// 오류 종류 이름 (`FetchError::Timeout` 등)
    pub exception_class: String,
    pub retry_count: u32,
    pub action_taken: ErrorAction,
    pub context: BTreeMap<String, String>,
}

/// 오류 대상별 건수.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectErrorCount {
    pub subject_id: String,
    pub error_count: usize,
}

/// 리포트 요약.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub total_errors: usize,
    pub error_by_type: BTreeMap<ErrorCategory, usize>,
    pub unique_subjects_with_errors: usize,
    pub generated_at: DateTime<Utc>,
}

/// 분류별 건수.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub temporary_errors: usize,
    pub permanent_errors: usize,
    pub system_errors: usize,
}

/// 오류 리포트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub summary: ErrorSummary,
    /// 오류가 많은 대상 상위 10개
    pub top_error_subjects: Vec<SubjectErrorCount>,
    /// 최근 오류 최대 50건
    pub recent_errors: Vec<ErrorRecord>,
    pub statistics: CategoryCounts,
}

/// 오류 통계.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorStatistics {
    pub total_errors: usize,
    pub error_stats: BTreeMap<ErrorCategory, u64>,
    pub error_records_count: usize,
}

#[derive(Default)]
struct HandlerState {
    records: Vec<ErrorRecord>,
    stats: BTreeMap<ErrorCategory, u64>,
}

/// 오류 처리기.
///
/// 여러 워커가 동시에 호출하므로 기록은 내부 락으로 보호합니다.
/// 락은 기록 추가/집계 동안만 잡으며 `retry_with_backoff`의 대기와는 무관합니다.
pub struct ErrorHandler {
    policy: RetryPolicy,
    state: Mutex<HandlerState>,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl ErrorHandler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(HandlerState::default()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 오류를 분류합니다.
    ///
    /// 분류는 오류 변형에 붙은 태그로만 결정되며 메시지 내용은 보지 않습니다.
    pub fn classify_error(&self, err: &dyn Classify) -> ErrorCategory {
        err.category()
    }

    /// 오류를 기록하고 처리 방법을 결정합니다.
    pub fn handle_error(
        &self,
        err: &dyn Classify,
        subject_id: &str,
        context: &ErrorContext,
    ) -> ErrorAction {
        let category = self.classify_error(err);
        let action = self
            .policy
            .decide(category, context.retry_count, context.max_retries);

        let record = ErrorRecord {
            timestamp: Utc::now(),
            error_type: category,
            subject_id: subject_id.to_string(),
            message: err.to_string(),
            exception_class: err.kind().to_string(),
            retry_count: context.retry_count,
            action_taken: action,
            context: context.extra.clone(),
        };

        {
            let mut state = self.state.lock();
            *state.stats.entry(category).or_insert(0) += 1;
            state.records.push(record);
        }

        let max_retries = context.max_retries.unwrap_or(self.policy.max_retries);
        match action {
            ErrorAction::Abort => error!(
                subject = subject_id,
                error_type = %category,
                kind = err.kind(),
                retry_count = context.retry_count,
                error = %err,
                "시스템 오류 - 배치를 중단합니다"
            ),
            ErrorAction::Retry => warn!(
                subject = subject_id,
                error_type = %category,
                kind = err.kind(),
                attempt = context.retry_count + 1,
                max_retries,
                error = %err,
                "일시적 오류 - 재시도합니다"
            ),
            ErrorAction::Skip => info!(
                subject = subject_id,
                error_type = %category,
                kind = err.kind(),
                retry_count = context.retry_count,
                error = %err,
                "오류 - 건너뜁니다"
            ),
        }

        action
    }

    /// 백오프 시간만큼 호출 스레드를 블록합니다.
    ///
    /// 워커 스레드에서만 호출해야 합니다. 실제 대기 시간을 반환합니다.
    pub fn retry_with_backoff(&self, retry_count: u32) -> Duration {
        let delay = self.policy.delay_for(retry_count);
        debug!(retry_count, delay_ms = delay.as_millis() as u64, "재시도 대기");
        std::thread::sleep(delay);
        delay
    }

    /// 오류 리포트를 생성합니다.
    pub fn generate_error_report(&self) -> ErrorReport {
        let state = self.state.lock();

        let mut by_type: BTreeMap<ErrorCategory, usize> = BTreeMap::new();
        let mut by_subject: HashMap<&str, usize> = HashMap::new();
        for record in &state.records {
            *by_type.entry(record.error_type).or_insert(0) += 1;
            *by_subject.entry(record.subject_id.as_str()).or_insert(0) += 1;
        }

        let mut top: Vec<SubjectErrorCount> = by_subject
            .iter()
            .map(|(subject, count)| SubjectErrorCount {
                subject_id: subject.to_string(),
                error_count: *count,
            })
            .collect();
        top.sort_by(|a, b| {
            b.error_count
                .cmp(&a.error_count)
                .then_with(|| a.subject_id.cmp(&b.subject_id))
        });
        top.truncate(TOP_SUBJECTS);

        let skip = state.records.len().saturating_sub(RECENT_ERRORS);
        let recent_errors = state.records[skip..].to_vec();

        let statistics = CategoryCounts {
            temporary_errors: by_type.get(&ErrorCategory::Temporary).copied().unwrap_or(0),
            permanent_errors: by_type.get(&ErrorCategory::Permanent).copied().unwrap_or(0),
            system_errors: by_type.get(&ErrorCategory::System).copied().unwrap_or(0),
        };

        ErrorReport {
            summary: ErrorSummary {
                total_errors: state.records.len(),
                unique_subjects_with_errors: by_subject.len(),
                error_by_type: by_type,
                generated_at: Utc::now(),
            },
            top_error_subjects: top,
            recent_errors,
            statistics,
        }
    }

    /// 오류 통계를 반환합니다.
    pub fn get_error_statistics(&self) -> ErrorStatistics {
        let state = self.state.lock();
        ErrorStatistics {
            total_errors: state.records.len(),
            error_stats: state.stats.clone(),
            error_records_count: state.records.len(),
        }
    }

    /// 오류 기록을 비웁니다.
    pub fn clear_error_records(&self) {
        let mut state = self.state.lock();
        state.records.clear();
        state.stats.clear();
        info!("오류 기록을 초기화했습니다");
    }
}
