//! 주가 데이터 워커.
//!
//! 장기 실행 OS 스레드 하나가 작업 큐에서 작업을 꺼내 수집 → 저장을 수행하고
//! 결과를 엔진에 보고합니다.
//!
//! 상태 전이:
//! - IDLE → (작업 획득) → WORKING → (성공/실패) → IDLE
//! - IDLE/WORKING → (예상치 못한 패닉) → ERROR → (쿨다운) → IDLE
//! - 모든 상태 → (중지 신호) → STOPPED
//!
//! 중지는 협력적입니다. `stop`은 플래그를 세우고 제한 시간 동안만 종료를 기다리며,
//! 외부 호출에 블록된 스레드는 강제 종료하지 않고 분리(detach)합니다.

use crate::error::{EngineError, EngineResult, TaskError};
use crate::error_handler::{ErrorAction, ErrorContext, ErrorHandler};
use crate::execution::{CurrentTask, WorkerSnapshot, WorkerStatus};
use crate::task::{BatchTask, TaskResult};
use chrono::Utc;
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use kabu_data::{Fetcher, SaveSummary, Saver};
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 워커가 작업을 받고 결과를 돌려주는 상대 (엔진).
pub trait TaskSource: Send + Sync {
    /// 최대 `timeout` 동안 다음 실행 가능한 작업을 기다립니다.
    ///
    /// 취소/일시정지된 실행의 작업은 여기서 걸러지므로 `None`이 반환될 수 있습니다.
    fn next_task(&self, worker_id: &str, timeout: Duration) -> Option<BatchTask>;

    /// 작업 결과를 보고합니다.
    fn report_task_result(&self, task: &BatchTask, result: TaskResult);
}

/// 워커 실행에 필요한 협력자와 설정.
#[derive(Clone)]
pub struct WorkerContext {
    pub source: Arc<dyn TaskSource>,
    pub fetcher: Arc<dyn Fetcher>,
    pub saver: Arc<dyn Saver>,
    pub error_handler: Arc<ErrorHandler>,
    pub poll_interval: Duration,
    pub error_cooldown: Duration,
}

#[derive(Debug)]
struct WorkerState {
    status: WorkerStatus,
    current_task: Option<CurrentTask>,
    processed_tasks: u64,
    failed_tasks: u64,
    last_activity: chrono::DateTime<Utc>,
}

impl WorkerState {
    fn touch(&mut self, status: WorkerStatus) {
        self.status = status;
        self.last_activity = Utc::now();
    }
}

/// 워커 스레드 핸들.
pub struct StockDataWorker {
    worker_id: String,
    state: Arc<RwLock<WorkerState>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    exited: Receiver<()>,
}

impl StockDataWorker {
    /// 워커 스레드를 시작합니다.
    pub fn spawn(worker_id: impl Into<String>, ctx: WorkerContext) -> EngineResult<Self> {
        let worker_id = worker_id.into();
        let state = Arc::new(RwLock::new(WorkerState {
            status: WorkerStatus::Idle,
            current_task: None,
            processed_tasks: 0,
            failed_tasks: 0,
            last_activity: Utc::now(),
        }));
        let stop = Arc::new(AtomicBool::new(false));
        let (exit_tx, exited) = channel::bounded::<()>(1);

        let runner = WorkerLoop {
            worker_id: worker_id.clone(),
            state: Arc::clone(&state),
            stop: Arc::clone(&stop),
            ctx,
        };

        let handle = std::thread::Builder::new()
            .name(format!("kabu-{}", worker_id))
            .spawn(move || {
                runner.run();
                // 수신 측이 이미 포기했을 수 있으므로 실패는 무시
                let _ = exit_tx.send(());
            })
            .map_err(|source| EngineError::WorkerSpawn {
                worker_id: worker_id.clone(),
                source,
            })?;

        info!(worker_id = %worker_id, "워커 시작");

        Ok(Self {
            worker_id,
            state,
            stop,
            handle: Some(handle),
            exited,
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn status(&self) -> WorkerStatus {
        self.state.read().status
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        let state = self.state.read();
        WorkerSnapshot {
            worker_id: self.worker_id.clone(),
            status: state.status,
            current_task: state.current_task.clone(),
            processed_tasks: state.processed_tasks,
            failed_tasks: state.failed_tasks,
            last_activity: state.last_activity,
        }
    }

    /// 중지 플래그만 세웁니다.
    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// 중지 신호를 보내고 `timeout`까지 종료를 기다립니다.
    ///
    /// 제한 시간 안에 종료되면 `true`. 그렇지 않으면 스레드를 분리하고 `false`.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.signal_stop();
        let Some(handle) = self.handle.take() else {
            return true;
        };

        match self.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    error!(worker_id = %self.worker_id, "워커 스레드가 패닉으로 종료됨");
                }
                debug!(worker_id = %self.worker_id, "워커 종료");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    worker_id = %self.worker_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "워커가 제한 시간 내에 종료되지 않아 분리합니다"
                );
                false
            }
        }
    }
}

struct WorkerLoop {
    worker_id: String,
    state: Arc<RwLock<WorkerState>>,
    stop: Arc<AtomicBool>,
    ctx: WorkerContext,
}

impl WorkerLoop {
    fn run(self) {
        while !self.stop.load(Ordering::SeqCst) {
            let Some(task) = self
                .ctx
                .source
                .next_task(&self.worker_id, self.ctx.poll_interval)
            else {
                continue;
            };

            {
                let mut state = self.state.write();
                state.current_task = Some(CurrentTask {
                    task_id: task.id,
                    symbol: task.symbol.clone(),
                    execution_id: task.execution_id,
                });
                state.touch(WorkerStatus::Working);
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(task.clone())));
            let (result, panicked) = match outcome {
                Ok(result) => (result, false),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        worker_id = %self.worker_id,
                        symbol = %task.symbol,
                        error = %message,
                        "워커 처리 중 예상치 못한 오류"
                    );
                    let err = TaskError::unexpected(message);
                    let action = self.ctx.error_handler.handle_error(
                        &err,
                        &task.symbol,
                        &ErrorContext::new(task.retry_count)
                            .with("worker_id", &self.worker_id),
                    );
                    (TaskResult::failed(&task, err, action), true)
                }
            };

            let success = result.success;
            self.ctx.source.report_task_result(&task, result);

            {
                let mut state = self.state.write();
                state.processed_tasks += 1;
                if !success {
                    state.failed_tasks += 1;
                }
                state.current_task = None;
                state.touch(if panicked {
                    WorkerStatus::Error
                } else {
                    WorkerStatus::Idle
                });
            }

            if panicked {
                std::thread::sleep(self.ctx.error_cooldown);
                self.state.write().touch(WorkerStatus::Idle);
            }
        }

        self.state.write().touch(WorkerStatus::Stopped);
    }

    /// 작업 하나를 실행합니다. RETRY 결정 동안 이 스레드에서 백오프합니다.
    fn execute(&self, mut task: BatchTask) -> TaskResult {
        let execution_id = task
            .execution_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let span = kabu_core::batch_span!("task", execution_id, task.symbol);
        let _entered = span.enter();

        let started = Instant::now();
        task.started_at = Some(Utc::now());
        task.worker_id = Some(self.worker_id.clone());

        loop {
            match self.fetch_and_save(&task) {
                Ok((fetched, summary)) => {
                    debug!(
                        worker_id = %self.worker_id,
                        symbol = %task.symbol,
                        fetched,
                        saved = summary.saved,
                        skipped = summary.skipped,
                        attempt = task.retry_count + 1,
                        "작업 완료"
                    );
                    return TaskResult::succeeded(&task, fetched, summary.saved, summary.skipped)
                        .with_duration_ms(started.elapsed().as_millis() as u64);
                }
                Err(err) => {
                    let mut context = ErrorContext::new(task.retry_count)
                        .with("worker_id", &self.worker_id)
                        .with("interval", task.interval);
                    context.max_retries = task.max_retries;
                    if let Some(execution_id) = task.execution_id {
                        context = context.with("execution_id", execution_id);
                    }

                    let action = self
                        .ctx
                        .error_handler
                        .handle_error(&err, &task.symbol, &context);

                    if action == ErrorAction::Retry {
                        self.ctx.error_handler.retry_with_backoff(task.retry_count);
                        task.retry_count += 1;
                        continue;
                    }

                    return TaskResult::failed(&task, err, action)
                        .with_duration_ms(started.elapsed().as_millis() as u64);
                }
            }
        }
    }

    fn fetch_and_save(&self, task: &BatchTask) -> Result<(usize, SaveSummary), TaskError> {
        let bars = self
            .ctx
            .fetcher
            .fetch(&task.symbol, task.interval, task.period.as_deref())
            .map_err(|e| TaskError::from_classified(&e))?;

        let summary = self
            .ctx
            .saver
            .save(&task.symbol, task.interval, &bars)
            .map_err(|e| TaskError::from_classified(&e))?;

        Ok((bars.len(), summary))
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handler::RetryPolicy;
    use chrono::TimeZone;
    use crossbeam::channel::{unbounded, Sender};
    use kabu_core::{FetchError, FetchResult, Interval, OhlcvBar};
    use kabu_data::MemorySaver;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;

    struct ChannelSource {
        tasks: Receiver<BatchTask>,
        results: Mutex<Vec<TaskResult>>,
    }

    impl TaskSource for ChannelSource {
        fn next_task(&self, _worker_id: &str, timeout: Duration) -> Option<BatchTask> {
            self.tasks.recv_timeout(timeout).ok()
        }

        fn report_task_result(&self, _task: &BatchTask, result: TaskResult) {
            self.results.lock().push(result);
        }
    }

    /// 처음 `failures`번은 타임아웃, 이후 바 한 개를 반환.
    struct FlakyFetcher {
        failures: usize,
        calls: AtomicUsize,
    }

    impl Fetcher for FlakyFetcher {
        fn fetch(&self, symbol: &str, interval: Interval, _period: Option<&str>) -> FetchResult<Vec<OhlcvBar>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if symbol == "PANIC" {
                panic!("boom");
            }
            if n < self.failures {
                return Err(FetchError::Timeout("slow".into()));
            }
            Ok(vec![OhlcvBar::new(
                symbol,
                interval,
                Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap(),
                dec!(100),
                dec!(101),
                dec!(99),
                dec!(100),
                10,
            )])
        }
    }

    fn start(failures: usize) -> (StockDataWorker, Sender<BatchTask>, Arc<ChannelSource>, Arc<FlakyFetcher>) {
        let (tx, rx) = unbounded();
        let source = Arc::new(ChannelSource {
            tasks: rx,
            results: Mutex::new(Vec::new()),
        });
        let fetcher = Arc::new(FlakyFetcher {
            failures,
            calls: AtomicUsize::new(0),
        });
        let ctx = WorkerContext {
            source: source.clone(),
            fetcher: fetcher.clone(),
            saver: Arc::new(MemorySaver::new()),
            error_handler: Arc::new(ErrorHandler::new(RetryPolicy::new(3, Duration::from_millis(1), 2.0))),
            poll_interval: Duration::from_millis(10),
            error_cooldown: Duration::from_millis(10),
        };
        let worker = StockDataWorker::spawn("worker-test", ctx).unwrap();
        (worker, tx, source, fetcher)
    }

    fn wait_for_results(source: &ChannelSource, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while source.results.lock().len() < n && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_worker_retries_then_succeeds() {
        let (mut worker, tx, source, fetcher) = start(2);
        tx.send(BatchTask::new("7203", Interval::D1)).unwrap();
        wait_for_results(&source, 1);

        let results = source.results.lock().clone();
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].attempts, 3);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);

        assert!(worker.stop(Duration::from_secs(2)));
        assert_eq!(worker.status(), WorkerStatus::Stopped);
        assert_eq!(worker.snapshot().processed_tasks, 1);
    }

    #[test]
    fn test_worker_skips_after_retry_budget() {
        let (mut worker, tx, source, fetcher) = start(usize::MAX);
        tx.send(BatchTask::new("7203", Interval::D1).with_max_retries(1))
            .unwrap();
        wait_for_results(&source, 1);

        let results = source.results.lock().clone();
        assert!(!results[0].success);
        assert_eq!(results[0].action, Some(ErrorAction::Skip));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(worker.stop(Duration::from_secs(2)));
        assert_eq!(worker.snapshot().failed_tasks, 1);
    }

    #[test]
    fn test_worker_survives_panic() {
        let (mut worker, tx, source, _fetcher) = start(0);
        tx.send(BatchTask::new("PANIC", Interval::D1)).unwrap();
        tx.send(BatchTask::new("7203", Interval::D1)).unwrap();
        wait_for_results(&source, 2);

        let results = source.results.lock().clone();
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_ref().unwrap().kind, "Unexpected");
        assert!(results[1].success);
        assert!(worker.stop(Duration::from_secs(2)));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut worker, _tx, _source, _fetcher) = start(0);
        assert!(worker.stop(Duration::from_secs(2)));
        assert!(worker.stop(Duration::from_secs(2)));
        assert!(!worker.is_running());
    }
}
