//! 호출 단위 일괄 수집 서비스.
//!
//! 엔진의 공유 큐/실행 레지스트리를 쓰지 않고, 호출마다 `max_workers`개의
//! 스레드를 띄워 종목별 수집 → 저장을 독립적으로 재시도합니다.
//! 한 종목의 실패는 항상 결과 값으로 돌아오며 전체 배치를 중단하지 않습니다.

use crate::bulk::tracker::{round2, BulkSummary, ProgressInfo, ProgressTracker};
use crate::error::{BulkError, TaskError};
use crate::error_handler::RetryPolicy;
use crate::worker::panic_message;
use crossbeam::channel;
use kabu_core::{BulkConfig, ErrorCategory, Interval};
use kabu_data::{Fetcher, Saver};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{error, info, warn};

/// 종목 하나의 처리 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockFetchResult {
    pub success: bool,
    pub symbol: String,
    pub interval: Interval,
    pub records_fetched: usize,
    pub records_saved: usize,
    /// 성공한 시도 번호 (1부터). 실패 시 수행한 총 시도 횟수
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
}

impl StockFetchResult {
    fn failed(symbol: &str, interval: Interval, error: &TaskError, attempt: u32) -> Self {
        Self {
            success: false,
            symbol: symbol.to_string(),
            interval,
            records_fetched: 0,
            records_saved: 0,
            attempt,
            error: Some(error.message.clone()),
            category: Some(error.category),
        }
    }
}

/// 소요 시간 추정 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionEstimate {
    Estimated {
        symbol_count: usize,
        sample_time_per_stock: f64,
        estimated_total_seconds: f64,
        estimated_total_minutes: f64,
        max_workers: usize,
    },
    Failed {
        symbol_count: usize,
        error: String,
    },
}

/// 일괄 수집 서비스.
pub struct BulkDataService {
    fetcher: Arc<dyn Fetcher>,
    saver: Arc<dyn Saver>,
    config: BulkConfig,
    policy: RetryPolicy,
}

impl BulkDataService {
    pub fn new(fetcher: Arc<dyn Fetcher>, saver: Arc<dyn Saver>, config: BulkConfig) -> Self {
        // attempt k 실패 후 base * 2^k 대기
        let policy = RetryPolicy::new(
            config.retry_count.saturating_sub(1),
            config.retry_base_delay(),
            2.0,
        );
        Self {
            fetcher,
            saver,
            config,
            policy,
        }
    }

    pub fn config(&self) -> &BulkConfig {
        &self.config
    }

    /// 종목 하나를 수집/저장합니다. 일시적 오류는 `retry_count`번까지 시도합니다.
    pub fn fetch_single_stock(
        &self,
        symbol: &str,
        interval: Interval,
        period: Option<&str>,
    ) -> StockFetchResult {
        let max_attempts = self.config.retry_count.max(1);
        let mut attempt = 0u32;

        loop {
            match self.fetch_and_save(symbol, interval, period) {
                Ok((records_fetched, records_saved)) => {
                    return StockFetchResult {
                        success: true,
                        symbol: symbol.to_string(),
                        interval,
                        records_fetched,
                        records_saved,
                        attempt: attempt + 1,
                        error: None,
                        category: None,
                    };
                }
                Err(err) => {
                    warn!(
                        symbol,
                        attempt = attempt + 1,
                        max_attempts,
                        category = %err.category,
                        error = %err,
                        "종목 수집 실패"
                    );

                    let retryable = err.category == ErrorCategory::Temporary;
                    if !retryable || attempt + 1 >= max_attempts {
                        return StockFetchResult::failed(symbol, interval, &err, attempt + 1);
                    }

                    thread::sleep(self.policy.delay_for(attempt));
                    attempt += 1;
                }
            }
        }
    }

    fn fetch_and_save(
        &self,
        symbol: &str,
        interval: Interval,
        period: Option<&str>,
    ) -> Result<(usize, usize), TaskError> {
        let bars = self
            .fetcher
            .fetch(symbol, interval, period)
            .map_err(|e| TaskError::from_classified(&e))?;
        let summary = self
            .saver
            .save(symbol, interval, &bars)
            .map_err(|e| TaskError::from_classified(&e))?;
        Ok((bars.len(), summary.saved))
    }

    /// 여러 종목을 병렬로 수집합니다.
    ///
    /// 결과는 완료 순서대로 반영되며, 매 결과마다 `progress_callback`이 호출됩니다.
    pub fn fetch_multiple_stocks(
        &self,
        symbols: &[String],
        interval: Interval,
        period: Option<&str>,
        progress_callback: Option<&dyn Fn(&ProgressInfo)>,
    ) -> Result<BulkSummary, BulkError> {
        let pool_size = self.config.max_workers.clamp(1, symbols.len().max(1));
        info!(
            symbols = symbols.len(),
            interval = %interval,
            max_workers = pool_size,
            "일괄 수집 시작"
        );

        let (job_tx, job_rx) = channel::unbounded::<String>();
        for symbol in symbols {
            // 수신 측이 아직 살아 있으므로 실패하지 않음
            let _ = job_tx.send(symbol.clone());
        }
        drop(job_tx);

        let (result_tx, result_rx) = channel::unbounded::<StockFetchResult>();
        let mut tracker = ProgressTracker::new(symbols.len());
        let mut results = Vec::with_capacity(symbols.len());

        thread::scope(|scope| -> Result<(), BulkError> {
            let mut spawned = 0usize;
            for i in 0..pool_size {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let spawn = thread::Builder::new()
                    .name(format!("kabu-bulk-{}", i))
                    .spawn_scoped(scope, move || {
                        for symbol in job_rx.iter() {
                            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                                self.fetch_single_stock(&symbol, interval, period)
                            }))
                            .unwrap_or_else(|payload| {
                                let message = panic_message(payload.as_ref());
                                error!(symbol = %symbol, error = %message, "예상치 못한 오류");
                                StockFetchResult::failed(
                                    &symbol,
                                    interval,
                                    &TaskError::unexpected(message),
                                    1,
                                )
                            });
                            if result_tx.send(result).is_err() {
                                break;
                            }
                        }
                    });

                match spawn {
                    Ok(_) => spawned += 1,
                    Err(e) if spawned == 0 => return Err(BulkError::Spawn(e)),
                    Err(e) => {
                        warn!(error = %e, spawned, "일부 수집 스레드를 만들지 못해 남은 스레드로 계속");
                        break;
                    }
                }
            }
            drop(result_tx);

            for result in result_rx.iter() {
                tracker.update(&result.symbol, result.success, result.error.as_deref());
                results.push(result);

                if let Some(callback) = progress_callback {
                    let progress = tracker.get_progress();
                    if panic::catch_unwind(AssertUnwindSafe(|| callback(&progress))).is_err() {
                        error!("진행 콜백 오류");
                    }
                }

                if tracker.should_log() {
                    let progress = tracker.get_progress();
                    info!(
                        processed = progress.processed,
                        total = progress.total,
                        percentage = progress.progress_percentage,
                        successful = progress.successful,
                        failed = progress.failed,
                        stocks_per_second = progress.stocks_per_second,
                        "일괄 수집 진행"
                    );
                }
            }
            Ok(())
        })?;

        let summary = tracker.into_summary(results);
        info!(
            successful = summary.progress.successful,
            total = summary.progress.total,
            failed = summary.progress.failed,
            elapsed_secs = summary.progress.elapsed_time,
            "일괄 수집 완료"
        );
        Ok(summary)
    }

    /// 종목 목록 파일(한 줄에 한 종목)을 읽어 일괄 수집합니다.
    pub fn fetch_all_from_list_file(
        &self,
        path: impl AsRef<Path>,
        interval: Interval,
        period: Option<&str>,
        progress_callback: Option<&dyn Fn(&ProgressInfo)>,
    ) -> Result<BulkSummary, BulkError> {
        let symbols = load_symbol_list(path)?;
        self.fetch_multiple_stocks(&symbols, interval, period, progress_callback)
    }

    /// 샘플 종목 하나를 실제로 수집해 전체 소요 시간을 추정합니다.
    ///
    /// 추정치는 `종목 수 × 샘플 시간 / max_workers`이며 보장값이 아닙니다.
    pub fn estimate_completion_time(
        &self,
        symbol_count: usize,
        interval: Interval,
    ) -> CompletionEstimate {
        let started = Instant::now();
        let sample = self.fetch_single_stock(&self.config.sample_symbol, interval, None);
        let sample_time = started.elapsed().as_secs_f64();

        if !sample.success {
            let error = sample
                .error
                .unwrap_or_else(|| "sample fetch failed".to_string());
            warn!(sample_symbol = %self.config.sample_symbol, error = %error, "소요 시간 추정 실패");
            return CompletionEstimate::Failed {
                symbol_count,
                error,
            };
        }

        let max_workers = self.config.max_workers.max(1);
        let total = symbol_count as f64 * sample_time / max_workers as f64;
        CompletionEstimate::Estimated {
            symbol_count,
            sample_time_per_stock: round2(sample_time),
            estimated_total_seconds: round2(total),
            estimated_total_minutes: round2(total / 60.0),
            max_workers,
        }
    }
}

/// 종목 목록 파일을 읽습니다. 빈 줄은 무시합니다.
pub fn load_symbol_list(path: impl AsRef<Path>) -> Result<Vec<String>, BulkError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| {
        error!(path = %path.display(), error = %source, "종목 목록 파일 읽기 실패");
        BulkError::ListFile {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let symbols: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if symbols.is_empty() {
        return Err(BulkError::EmptyList);
    }
    info!(path = %path.display(), count = symbols.len(), "종목 목록 파일 로드");
    Ok(symbols)
}
