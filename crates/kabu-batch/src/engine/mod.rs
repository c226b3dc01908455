//! 배치 엔진.
//!
//! 작업 큐, 워커 풀, 실행 레지스트리를 소유하고 실행 생명주기
//! (생성/시작/일시정지/재개/취소)를 제공합니다.
//!
//! # 동시성 규칙
//!
//! - 실행 레지스트리와 각 집계는 엔진 락 하나 아래에서만 변경됩니다.
//!   락은 O(1) 장부 갱신 동안만 잡으며 네트워크/DB I/O 동안에는 잡지 않습니다.
//! - 작업 큐는 crossbeam bounded MPMC 채널이라 외부 락이 필요 없습니다.
//! - 영속 미러링은 락 안에서 명령을 넣고, 미러 스레드가 락 밖에서 순서대로 적용합니다.
//! - 취소는 협력적입니다. 이미 꺼낸 작업은 끝까지 실행되고,
//!   취소된 실행의 작업은 꺼내는 시점에 부작용 없이 버려집니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! let engine = BatchEngine::builder(fetcher, saver).store(store).build()?;
//! engine.start_workers()?;
//! let id = engine.create_execution("partial", tasks.len(), None)?;
//! engine.start_execution(id, tasks)?;
//! ```

mod mirror;

use crate::error::{EngineError, EngineResult};
use crate::error_handler::{ErrorHandler, RetryPolicy};
use crate::execution::{
    BatchExecutionInfo, ExecutionSnapshot, QueueStatus, WorkerPoolStatus, WorkerStatus,
};
use crate::task::{BatchTask, TaskResult};
use crate::worker::{StockDataWorker, TaskSource, WorkerContext};
use chrono::Utc;
use crossbeam::channel::{self, Receiver, Sender};
use kabu_core::{DetailStatus, EngineConfig, ExecutionStatus, RetryConfig};
use kabu_data::{ExecutionStore, Fetcher, Saver};
use mirror::{Mirror, MirrorCommand};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 진행 콜백. `get_execution_status`와 같은 페이로드를 받습니다.
pub type ProgressCallback = Arc<dyn Fn(&ExecutionSnapshot) + Send + Sync>;

struct ExecutionEntry {
    info: BatchExecutionInfo,
    callback: Option<ProgressCallback>,
    /// 일시정지 중에 꺼낸 작업
    parked: Vec<BatchTask>,
}

#[derive(Default)]
struct EngineState {
    executions: HashMap<Uuid, ExecutionEntry>,
}

/// 워커와 공유하는 엔진 내부 상태.
struct EngineShared {
    config: EngineConfig,
    state: Mutex<EngineState>,
    terminal: Condvar,
    task_tx: Sender<BatchTask>,
    task_rx: Receiver<BatchTask>,
    store: Option<Arc<dyn ExecutionStore>>,
    mirror: Option<Mirror>,
}

/// 배치 엔진 빌더.
pub struct BatchEngineBuilder {
    config: EngineConfig,
    retry: RetryConfig,
    fetcher: Arc<dyn Fetcher>,
    saver: Arc<dyn Saver>,
    store: Option<Arc<dyn ExecutionStore>>,
}

impl BatchEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 영속 저장소를 지정합니다. 지정하지 않으면 메모리 집계만 사용합니다.
    pub fn store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> EngineResult<BatchEngine> {
        let (task_tx, task_rx) = channel::bounded(self.config.queue_size.max(1));

        let mirror = match &self.store {
            Some(store) => Some(Mirror::spawn(Arc::clone(store)).map_err(|source| {
                EngineError::WorkerSpawn {
                    worker_id: "mirror".to_string(),
                    source,
                }
            })?),
            None => None,
        };

        Ok(BatchEngine {
            shared: Arc::new(EngineShared {
                config: self.config,
                state: Mutex::new(EngineState::default()),
                terminal: Condvar::new(),
                task_tx,
                task_rx,
                store: self.store,
                mirror,
            }),
            error_handler: Arc::new(ErrorHandler::new(RetryPolicy::from_config(&self.retry))),
            fetcher: self.fetcher,
            saver: self.saver,
            workers: Mutex::new(Vec::new()),
            shutdown: AtomicBool::new(false),
        })
    }
}

/// 배치 엔진 핸들.
pub struct BatchEngine {
    shared: Arc<EngineShared>,
    error_handler: Arc<ErrorHandler>,
    fetcher: Arc<dyn Fetcher>,
    saver: Arc<dyn Saver>,
    workers: Mutex<Vec<StockDataWorker>>,
    shutdown: AtomicBool,
}

impl BatchEngine {
    pub fn builder(fetcher: Arc<dyn Fetcher>, saver: Arc<dyn Saver>) -> BatchEngineBuilder {
        BatchEngineBuilder {
            config: EngineConfig::default(),
            retry: RetryConfig::default(),
            fetcher,
            saver,
            store: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn error_handler(&self) -> &ErrorHandler {
        &self.error_handler
    }

    // =========================================================================
    // 워커 풀
    // =========================================================================

    /// 워커 스레드를 시작합니다. 이미 실행 중이면 아무것도 하지 않습니다.
    pub fn start_workers(&self) -> EngineResult<()> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(EngineError::Shutdown);
        }

        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            debug!(count = workers.len(), "워커가 이미 실행 중");
            return Ok(());
        }

        let source: Arc<dyn TaskSource> = self.shared.clone();
        let ctx = WorkerContext {
            source,
            fetcher: Arc::clone(&self.fetcher),
            saver: Arc::clone(&self.saver),
            error_handler: Arc::clone(&self.error_handler),
            poll_interval: self.shared.config.poll_interval(),
            error_cooldown: self.shared.config.error_cooldown(),
        };

        for i in 0..self.shared.config.max_workers {
            match StockDataWorker::spawn(format!("worker-{}", i), ctx.clone()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    // 이미 뜬 워커는 정리
                    for worker in workers.iter() {
                        worker.signal_stop();
                    }
                    let timeout = self.shared.config.stop_timeout();
                    for mut worker in workers.drain(..) {
                        worker.stop(timeout);
                    }
                    return Err(e);
                }
            }
        }

        info!(count = workers.len(), "워커 풀 시작");
        Ok(())
    }

    /// 워커 스레드를 중지합니다. 여러 번 호출해도 안전합니다.
    ///
    /// 전체 대기 시간은 `stop_timeout`으로 제한되며 그 안에 끝나지 않은
    /// 워커는 분리됩니다.
    pub fn stop_workers(&self) {
        // join은 락 밖에서 수행 (상태 조회가 중지 대기에 막히지 않도록)
        let workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return;
        }

        for worker in &workers {
            worker.signal_stop();
        }

        let deadline = Instant::now() + self.shared.config.stop_timeout();
        let mut abandoned = 0usize;
        for mut worker in workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !worker.stop(remaining) {
                abandoned += 1;
            }
        }

        if abandoned > 0 {
            warn!(abandoned, "일부 워커가 제한 시간 내에 종료되지 않음");
        } else {
            info!("워커 풀 중지");
        }
    }

    /// 워커를 중지하고 미러를 비운 뒤 엔진을 닫습니다.
    ///
    /// 이후 `start_workers`/`create_execution`은 `EngineError::Shutdown`을 반환합니다.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_workers();
        if let Some(mirror) = &self.shared.mirror {
            mirror.shutdown();
        }
        info!("배치 엔진 종료");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    // =========================================================================
    // 실행 생명주기
    // =========================================================================

    /// 실행을 PENDING 상태로 등록합니다.
    ///
    /// 영속 저장소 기록 실패는 로그만 남기고 메모리 전용 모드로 계속합니다.
    pub fn create_execution(
        &self,
        batch_type: &str,
        total_tasks: usize,
        progress_callback: Option<ProgressCallback>,
    ) -> EngineResult<Uuid> {
        if self.is_shutdown() {
            return Err(EngineError::Shutdown);
        }
        self.evict_expired();

        let mut info = BatchExecutionInfo::new(batch_type, total_tasks);

        // 실행 등록 전이므로 락 없이 직접 기록
        if let Some(store) = &self.shared.store {
            match store.create_execution(batch_type, to_i32(total_tasks), ExecutionStatus::Pending) {
                Ok(db_id) => info.db_execution_id = Some(db_id),
                Err(e) => error!(
                    execution_id = %info.execution_id,
                    error = %e,
                    "실행 기록 생성 실패 - 메모리 전용 모드로 계속"
                ),
            }
        }

        let execution_id = info.execution_id;
        info!(
            execution_id = %execution_id,
            batch_type,
            total_tasks,
            db_execution_id = ?info.db_execution_id,
            "배치 실행 생성"
        );

        self.shared.state.lock().executions.insert(
            execution_id,
            ExecutionEntry {
                info,
                callback: progress_callback,
                parked: Vec::new(),
            },
        );
        Ok(execution_id)
    }

    /// PENDING 실행을 RUNNING으로 바꾸고 작업을 큐에 넣습니다.
    ///
    /// 작업 수가 생성 시 `total_tasks`와 다르면 실제 작업 수로 맞춥니다.
    /// 큐가 가득 차면 자리가 날 때까지 블록합니다.
    pub fn start_execution(&self, execution_id: Uuid, tasks: Vec<BatchTask>) -> EngineResult<()> {
        if self.is_shutdown() {
            return Err(EngineError::Shutdown);
        }

        let finished_empty = {
            let mut state = self.shared.state.lock();
            let entry = state
                .executions
                .get_mut(&execution_id)
                .ok_or(EngineError::ExecutionNotFound(execution_id))?;

            let info = &mut entry.info;
            if info.status != ExecutionStatus::Pending {
                return Err(EngineError::InvalidTransition {
                    id: execution_id,
                    operation: "start_execution",
                    expected: "pending",
                    actual: info.status,
                });
            }

            if info.total_tasks != tasks.len() {
                warn!(
                    execution_id = %execution_id,
                    declared = info.total_tasks,
                    actual = tasks.len(),
                    "작업 수가 생성 시 값과 달라 실제 값으로 조정"
                );
                info.total_tasks = tasks.len();
            }

            let now = Utc::now();
            info.status = ExecutionStatus::Running;
            info.start_time = Some(now);
            if let (Some(mirror), Some(db_id)) = (&self.shared.mirror, info.db_execution_id) {
                mirror.send(MirrorCommand::Status {
                    db_id,
                    status: ExecutionStatus::Running,
                    start_time: Some(now),
                });
            }

            // 작업이 없으면 즉시 완료
            if tasks.is_empty() {
                self.shared.finish(entry, ExecutionStatus::Completed, None);
                true
            } else {
                false
            }
        };

        if finished_empty {
            self.shared.terminal.notify_all();
            return Ok(());
        }

        info!(execution_id = %execution_id, tasks = tasks.len(), "배치 실행 시작");
        self.shared.enqueue(execution_id, tasks)
    }

    /// RUNNING → PAUSED.
    ///
    /// 이후 꺼낸 작업은 실행에 보관되었다가 재개 시 다시 큐에 들어갑니다.
    pub fn pause_execution(&self, execution_id: Uuid) -> EngineResult<()> {
        self.shared.transition(
            execution_id,
            "pause_execution",
            "running",
            ExecutionStatus::Running,
            ExecutionStatus::Paused,
        )?;
        info!(execution_id = %execution_id, "배치 실행 일시정지");
        Ok(())
    }

    /// PAUSED → RUNNING. 보관된 작업을 다시 큐에 넣습니다.
    pub fn resume_execution(&self, execution_id: Uuid) -> EngineResult<()> {
        let parked = self.shared.transition(
            execution_id,
            "resume_execution",
            "paused",
            ExecutionStatus::Paused,
            ExecutionStatus::Running,
        )?;
        info!(execution_id = %execution_id, parked = parked.len(), "배치 실행 재개");
        if parked.is_empty() {
            return Ok(());
        }
        self.shared.enqueue(execution_id, parked)
    }

    /// RUNNING/PAUSED → CANCELLED.
    ///
    /// 진행 중인 작업은 중단하지 않습니다. 큐에 남은 작업은 꺼내는 시점에 버려집니다.
    pub fn cancel_execution(&self, execution_id: Uuid) -> EngineResult<()> {
        let (snapshot, callback) = {
            let mut state = self.shared.state.lock();
            let entry = state
                .executions
                .get_mut(&execution_id)
                .ok_or(EngineError::ExecutionNotFound(execution_id))?;

            let status = entry.info.status;
            if !matches!(status, ExecutionStatus::Running | ExecutionStatus::Paused) {
                return Err(EngineError::InvalidTransition {
                    id: execution_id,
                    operation: "cancel_execution",
                    expected: "running or paused",
                    actual: status,
                });
            }

            let dropped = entry.parked.len();
            self.shared.finish(entry, ExecutionStatus::Cancelled, None);
            info!(execution_id = %execution_id, dropped_parked = dropped, "배치 실행 취소");
            (entry.info.snapshot(), entry.callback.clone())
        };

        self.shared.terminal.notify_all();
        notify_callback(callback.as_ref(), &snapshot);
        Ok(())
    }

    /// 실행 상태 스냅샷.
    pub fn get_execution_status(&self, execution_id: Uuid) -> Option<ExecutionSnapshot> {
        self.shared
            .state
            .lock()
            .executions
            .get(&execution_id)
            .map(|entry| entry.info.snapshot())
    }

    /// 메모리에 있는 모든 실행 (생성 순).
    pub fn list_executions(&self) -> Vec<ExecutionSnapshot> {
        let state = self.shared.state.lock();
        let mut entries: Vec<&ExecutionEntry> = state.executions.values().collect();
        entries.sort_by_key(|e| e.info.created_at);
        entries.iter().map(|e| e.info.snapshot()).collect()
    }

    /// 워커 풀 스냅샷.
    pub fn get_worker_status(&self) -> WorkerPoolStatus {
        let workers = self.workers.lock();
        let snapshots: std::collections::BTreeMap<_, _> = workers
            .iter()
            .map(|w| (w.worker_id().to_string(), w.snapshot()))
            .collect();
        WorkerPoolStatus {
            total_workers: workers.len(),
            active_workers: snapshots
                .values()
                .filter(|s| s.status == WorkerStatus::Working)
                .count(),
            workers: snapshots,
        }
    }

    /// 작업 큐 스냅샷.
    pub fn get_queue_status(&self) -> QueueStatus {
        QueueStatus {
            task_queue_size: self.shared.task_rx.len(),
            task_queue_max_size: self.shared.task_rx.capacity().unwrap_or(0),
        }
    }

    /// 실행이 종료 상태가 될 때까지 기다립니다.
    pub fn wait_for_completion(
        &self,
        execution_id: Uuid,
        timeout: Duration,
    ) -> EngineResult<ExecutionSnapshot> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            let entry = state
                .executions
                .get(&execution_id)
                .ok_or(EngineError::ExecutionNotFound(execution_id))?;
            if entry.info.is_terminal() {
                return Ok(entry.info.snapshot());
            }
            if self
                .shared
                .terminal
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return match state.executions.get(&execution_id) {
                    Some(entry) if entry.info.is_terminal() => Ok(entry.info.snapshot()),
                    Some(_) => Err(EngineError::WaitTimeout(execution_id)),
                    None => Err(EngineError::ExecutionNotFound(execution_id)),
                };
            }
        }
    }

    /// 제출 후 대기 모드: 실행을 만들고 시작한 뒤 종료까지 기다립니다.
    pub fn run_to_completion(
        &self,
        batch_type: &str,
        tasks: Vec<BatchTask>,
        timeout: Duration,
    ) -> EngineResult<ExecutionSnapshot> {
        self.start_workers()?;
        let execution_id = self.create_execution(batch_type, tasks.len(), None)?;
        self.start_execution(execution_id, tasks)?;
        self.wait_for_completion(execution_id, timeout)
    }

    /// 종료 후 `execution_ttl`이 지난 실행을 메모리에서 제거합니다.
    pub fn evict_expired(&self) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(self.shared.config.execution_ttl()) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;

        let mut state = self.shared.state.lock();
        let before = state.executions.len();
        let mut forgotten = Vec::new();
        state.executions.retain(|_, entry| {
            let expired =
                entry.info.is_terminal() && entry.info.end_time.is_some_and(|end| end <= cutoff);
            if expired {
                forgotten.extend(entry.info.db_execution_id);
            }
            !expired
        });
        let evicted = before - state.executions.len();
        if let Some(mirror) = &self.shared.mirror {
            for db_id in forgotten {
                mirror.send(MirrorCommand::Forget { db_id });
            }
        }
        if evicted > 0 {
            debug!(evicted, "만료된 실행 제거");
        }
        evicted
    }

    /// 미러 스레드에 쌓인 저장소 명령이 모두 적용될 때까지 기다립니다.
    pub fn flush_mirror(&self) {
        if let Some(mirror) = &self.shared.mirror {
            mirror.flush();
        }
    }
}

impl Drop for BatchEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl EngineShared {
    /// 작업에 실행 ID를 붙여 큐에 넣습니다. 락 밖에서 호출해야 합니다.
    fn enqueue(&self, execution_id: Uuid, tasks: Vec<BatchTask>) -> EngineResult<()> {
        for mut task in tasks {
            task.execution_id = Some(execution_id);
            self.task_tx
                .send(task)
                .map_err(|_| EngineError::QueueClosed)?;
        }
        Ok(())
    }

    /// 가드된 상태 전이. 재개 시 보관된 작업을 돌려줍니다.
    fn transition(
        &self,
        execution_id: Uuid,
        operation: &'static str,
        expected: &'static str,
        from: ExecutionStatus,
        to: ExecutionStatus,
    ) -> EngineResult<Vec<BatchTask>> {
        let (parked, snapshot, callback) = {
            let mut state = self.state.lock();
            let entry = state
                .executions
                .get_mut(&execution_id)
                .ok_or(EngineError::ExecutionNotFound(execution_id))?;

            if entry.info.status != from {
                return Err(EngineError::InvalidTransition {
                    id: execution_id,
                    operation,
                    expected,
                    actual: entry.info.status,
                });
            }

            entry.info.status = to;
            if let (Some(mirror), Some(db_id)) = (&self.mirror, entry.info.db_execution_id) {
                mirror.send(MirrorCommand::Status {
                    db_id,
                    status: to,
                    start_time: None,
                });
            }

            let parked = if to == ExecutionStatus::Running {
                std::mem::take(&mut entry.parked)
            } else {
                Vec::new()
            };
            (parked, entry.info.snapshot(), entry.callback.clone())
        };

        notify_callback(callback.as_ref(), &snapshot);
        Ok(parked)
    }

    /// 실행을 종료 상태로 만듭니다. 엔진 락을 잡은 상태에서 호출합니다.
    fn finish(
        &self,
        entry: &mut ExecutionEntry,
        status: ExecutionStatus,
        error_message: Option<String>,
    ) {
        let now = Utc::now();
        entry.info.status = status;
        entry.info.end_time = Some(now);
        if error_message.is_some() {
            entry.info.error_message = error_message.clone();
        }
        entry.parked.clear();

        if let (Some(mirror), Some(db_id)) = (&self.mirror, entry.info.db_execution_id) {
            mirror.send(MirrorCommand::Complete {
                db_id,
                status,
                end_time: now,
                error_message,
            });
        }
    }
}

impl TaskSource for EngineShared {
    fn next_task(&self, worker_id: &str, timeout: Duration) -> Option<BatchTask> {
        let task = self.task_rx.recv_timeout(timeout).ok()?;
        let Some(execution_id) = task.execution_id else {
            return Some(task);
        };

        let mut state = self.state.lock();
        let Some(entry) = state.executions.get_mut(&execution_id) else {
            debug!(task_id = %task.id, "실행이 없는 작업 폐기");
            return None;
        };

        match entry.info.status {
            ExecutionStatus::Running => {
                if let (Some(mirror), Some(db_id)) = (&self.mirror, entry.info.db_execution_id) {
                    mirror.send(MirrorCommand::DetailStarted {
                        db_id,
                        task_id: task.id,
                        symbol: task.symbol.clone(),
                    });
                }
                debug!(worker_id, symbol = %task.symbol, execution_id = %execution_id, "작업 획득");
                Some(task)
            }
            ExecutionStatus::Paused => {
                entry.parked.push(task);
                None
            }
            status => {
                debug!(
                    execution_id = %execution_id,
                    symbol = %task.symbol,
                    status = %status,
                    "종료된 실행의 작업 폐기"
                );
                None
            }
        }
    }

    fn report_task_result(&self, task: &BatchTask, result: TaskResult) {
        let Some(execution_id) = task.execution_id else {
            return;
        };

        let (snapshot, callback, became_terminal) = {
            let mut state = self.state.lock();
            let Some(entry) = state.executions.get_mut(&execution_id) else {
                warn!(execution_id = %execution_id, "결과 보고 대상 실행이 없음");
                return;
            };

            let was_terminal = entry.info.is_terminal();
            if entry.info.processed_tasks() >= entry.info.total_tasks {
                warn!(execution_id = %execution_id, task_id = %task.id, "중복 결과 보고 무시");
                return;
            }

            if result.success {
                entry.info.completed_tasks += 1;
            } else {
                entry.info.failed_tasks += 1;
            }

            if let (Some(mirror), Some(db_id)) = (&self.mirror, entry.info.db_execution_id) {
                mirror.send(MirrorCommand::DetailFinished {
                    task_id: task.id,
                    status: if result.success {
                        DetailStatus::Completed
                    } else {
                        DetailStatus::Failed
                    },
                    records_inserted: to_i32(result.records_saved),
                    error_message: result.error_message(),
                });
                mirror.send(MirrorCommand::Progress {
                    db_id,
                    processed: to_i32(entry.info.processed_tasks()),
                    successful: to_i32(entry.info.completed_tasks),
                    failed: to_i32(entry.info.failed_tasks),
                });
            }

            if !was_terminal {
                if result.is_abort() {
                    let message = format!(
                        "System error on {}: {}",
                        task.symbol,
                        result.error_message().unwrap_or_default()
                    );
                    error!(execution_id = %execution_id, error = %message, "배치 실행 중단");
                    self.finish(entry, ExecutionStatus::Failed, Some(message));
                } else if entry.info.all_reported() {
                    let status = entry.info.final_status();
                    self.finish(entry, status, None);
                    info!(
                        execution_id = %execution_id,
                        status = %status,
                        completed = entry.info.completed_tasks,
                        failed = entry.info.failed_tasks,
                        "배치 실행 종료"
                    );
                }
            }

            (
                entry.info.snapshot(),
                entry.callback.clone(),
                !was_terminal && entry.info.is_terminal(),
            )
        };

        if became_terminal {
            self.terminal.notify_all();
        }
        notify_callback(callback.as_ref(), &snapshot);
    }
}

/// 콜백은 엔진 락 밖에서 호출하며, 콜백의 패닉은 워커로 전파하지 않습니다.
fn notify_callback(callback: Option<&ProgressCallback>, snapshot: &ExecutionSnapshot) {
    if let Some(callback) = callback {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(snapshot)));
        if result.is_err() {
            error!(execution_id = %snapshot.execution_id, "진행 콜백 오류");
        }
    }
}

fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
