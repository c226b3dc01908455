//! 배치 엔진 생명주기 통합 테스트.

mod common;

use common::{wait_until, DownStore, FlakySaver, ScriptedFetcher};
use kabu_batch::{BatchEngine, BatchTask, EngineError, ExecutionSnapshot, ProgressCallback};
use kabu_core::{EngineConfig, ErrorCategory, ExecutionStatus, FetchError, Interval, RetryConfig};
use kabu_data::{ExecutionStore, MemoryExecutionStore, MemorySaver};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn fast_config(workers: usize) -> EngineConfig {
    EngineConfig {
        max_workers: workers,
        queue_size: 1000,
        poll_interval_ms: 10,
        error_cooldown_ms: 10,
        stop_timeout_ms: 2000,
        execution_ttl_secs: 3600,
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        base_delay_ms: 1,
        backoff_multiplier: 2.0,
    }
}

fn engine(fetcher: Arc<ScriptedFetcher>, workers: usize) -> BatchEngine {
    BatchEngine::builder(fetcher, Arc::new(MemorySaver::new()))
        .config(fast_config(workers))
        .retry(fast_retry())
        .build()
        .unwrap()
}

fn tasks(symbols: &[&str]) -> Vec<BatchTask> {
    BatchTask::for_symbols(symbols.iter().copied(), Interval::D1, None)
}

fn numbered(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}", 1000 + i)).collect()
}

#[test]
fn test_partial_failure_marks_execution_failed() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .always_fail("1001", FetchError::InvalidSymbol("1001".into()))
            .always_fail("1004", FetchError::NoData("1004".into()))
            .always_fail("1007", FetchError::Http {
                status: 404,
                message: "Not Found".into(),
            }),
    );
    let engine = engine(fetcher.clone(), 4);
    let symbols = numbered(10);

    let snapshot = engine
        .run_to_completion(
            "partial",
            BatchTask::for_symbols(symbols.iter(), Interval::D1, None),
            WAIT,
        )
        .unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    assert_eq!(snapshot.completed_tasks, 7);
    assert_eq!(snapshot.failed_tasks, 3);
    assert!(snapshot.end_time.is_some());
    assert_eq!(snapshot.progress_percentage, 70.0);
    assert_eq!(snapshot.success_rate, 70.0);
    // 영구적 에러는 재시도하지 않음
    assert_eq!(fetcher.call_count(), 10);
}

#[test]
fn test_all_successes_complete() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let engine = engine(fetcher, 2);

    let snapshot = engine
        .run_to_completion("partial", tasks(&["7203", "6758", "9984", "8306", "6861"]), WAIT)
        .unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Completed);
    assert_eq!(snapshot.completed_tasks, 5);
    assert_eq!(snapshot.failed_tasks, 0);
    assert!(snapshot.start_time.is_some());
    assert!(snapshot.end_time.is_some());
}

#[test]
fn test_concurrent_reports_are_counted_once() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let saver = Arc::new(MemorySaver::new());
    let engine = BatchEngine::builder(fetcher.clone(), saver.clone())
        .config(fast_config(8))
        .retry(fast_retry())
        .build()
        .unwrap();
    engine.start_workers().unwrap();

    let observed: Arc<Mutex<Vec<ExecutionSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = observed.clone();
    let callback: ProgressCallback = Arc::new(move |s: &ExecutionSnapshot| sink.lock().push(s.clone()));

    let symbols = numbered(200);
    let id = engine
        .create_execution("all_stocks", symbols.len(), Some(callback))
        .unwrap();
    engine
        .start_execution(id, BatchTask::for_symbols(symbols.iter(), Interval::D1, None))
        .unwrap();
    let snapshot = engine.wait_for_completion(id, WAIT).unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Completed);
    assert_eq!(snapshot.completed_tasks, 200);
    assert_eq!(fetcher.call_count(), 200);
    assert_eq!(saver.len(), 400);

    assert!(wait_until(|| observed.lock().len() >= 200));
    let observed = observed.lock();
    assert!(observed
        .iter()
        .all(|s| s.completed_tasks + s.failed_tasks <= s.total_tasks));
    assert_eq!(
        observed.iter().map(|s| s.processed_tasks()).max(),
        Some(200)
    );
}

#[test]
fn test_cancel_drops_queued_tasks_without_fetching() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let gate = fetcher.gate("1000");
    let engine = engine(fetcher.clone(), 1);
    engine.start_workers().unwrap();

    let symbols = numbered(5);
    let id = engine.create_execution("partial", 5, None).unwrap();
    engine
        .start_execution(id, BatchTask::for_symbols(symbols.iter(), Interval::D1, None))
        .unwrap();

    gate.wait_entered();
    engine.cancel_execution(id).unwrap();
    gate.open();

    assert!(wait_until(|| engine.get_queue_status().task_queue_size == 0));
    // 진행 중이던 작업은 끝까지 실행되고 집계에 반영됨
    assert!(wait_until(|| {
        engine
            .get_execution_status(id)
            .map_or(false, |s| s.completed_tasks == 1)
    }));
    std::thread::sleep(Duration::from_millis(50));

    let snapshot = engine.get_execution_status(id).unwrap();
    assert_eq!(snapshot.status, ExecutionStatus::Cancelled);
    assert!(snapshot.end_time.is_some());
    assert_eq!(snapshot.processed_tasks(), 1);
    assert_eq!(fetcher.call_count(), 1);

    let waited = engine.wait_for_completion(id, Duration::from_millis(10)).unwrap();
    assert_eq!(waited.status, ExecutionStatus::Cancelled);
}

#[test]
fn test_pause_parks_tasks_until_resume() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let gate = fetcher.gate("1000");
    let engine = engine(fetcher.clone(), 1);
    engine.start_workers().unwrap();

    let symbols = numbered(4);
    let id = engine.create_execution("partial", 4, None).unwrap();
    engine
        .start_execution(id, BatchTask::for_symbols(symbols.iter(), Interval::D1, None))
        .unwrap();

    gate.wait_entered();
    engine.pause_execution(id).unwrap();
    gate.open();

    assert!(wait_until(|| engine.get_queue_status().task_queue_size == 0));
    assert!(wait_until(|| {
        engine
            .get_execution_status(id)
            .map_or(false, |s| s.completed_tasks == 1)
    }));
    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(
        engine.get_execution_status(id).unwrap().status,
        ExecutionStatus::Paused
    );

    engine.resume_execution(id).unwrap();
    let snapshot = engine.wait_for_completion(id, WAIT).unwrap();
    assert_eq!(snapshot.status, ExecutionStatus::Completed);
    assert_eq!(snapshot.completed_tasks, 4);
    assert_eq!(fetcher.call_count(), 4);
}

#[test]
fn test_system_error_aborts_execution() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let saver = Arc::new(FlakySaver::failing_on("9999"));
    let engine = BatchEngine::builder(fetcher.clone(), saver)
        .config(fast_config(1))
        .retry(fast_retry())
        .build()
        .unwrap();

    let snapshot = engine
        .run_to_completion("partial", tasks(&["7203", "9999", "6758", "9984"]), WAIT)
        .unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    assert_eq!(snapshot.completed_tasks, 1);
    assert_eq!(snapshot.failed_tasks, 1);
    let message = snapshot.error_message.unwrap();
    assert!(message.contains("9999"));
    assert!(message.contains("SaveError::Database"));

    // 중단 이후 큐에 남은 작업은 수집 없이 버려짐
    assert!(wait_until(|| engine.get_queue_status().task_queue_size == 0));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(fetcher.call_count(), 2);

    let stats = engine.error_handler().get_error_statistics();
    assert_eq!(stats.error_stats.get(&ErrorCategory::System), Some(&1));
}

#[test]
fn test_temporary_errors_retry_on_worker() {
    let fetcher = Arc::new(ScriptedFetcher::new().fail_then_succeed(
        "7203",
        vec![
            FetchError::Timeout("read timed out".into()),
            FetchError::RateLimited("429".into()),
        ],
    ));
    let engine = engine(fetcher.clone(), 1);

    let snapshot = engine
        .run_to_completion("partial", tasks(&["7203"]), WAIT)
        .unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Completed);
    assert_eq!(fetcher.calls_for("7203"), 3);
    assert_eq!(engine.error_handler().get_error_statistics().total_errors, 2);
}

#[test]
fn test_retry_budget_exhausted_becomes_failure() {
    let fetcher = Arc::new(
        ScriptedFetcher::new().always_fail("7203", FetchError::Network("connection reset".into())),
    );
    let engine = engine(fetcher.clone(), 1);

    let snapshot = engine
        .run_to_completion(
            "partial",
            vec![BatchTask::new("7203", Interval::D1).with_max_retries(2)],
            WAIT,
        )
        .unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    assert_eq!(snapshot.failed_tasks, 1);
    assert_eq!(fetcher.calls_for("7203"), 3);
}

#[test]
fn test_configured_retry_budget_applies_to_tasks() {
    let fetcher = Arc::new(
        ScriptedFetcher::new().always_fail("7203", FetchError::Timeout("30s".into())),
    );
    let engine = BatchEngine::builder(fetcher.clone(), Arc::new(MemorySaver::new()))
        .config(fast_config(1))
        .retry(RetryConfig {
            max_retries: 1,
            ..fast_retry()
        })
        .build()
        .unwrap();

    let snapshot = engine
        .run_to_completion("partial", tasks(&["7203"]), WAIT)
        .unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    assert_eq!(fetcher.calls_for("7203"), 2);
}

#[test]
fn test_invalid_transitions_are_rejected() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let engine = engine(fetcher, 1);

    let id = engine.create_execution("partial", 1, None).unwrap();
    assert!(matches!(
        engine.pause_execution(id),
        Err(EngineError::InvalidTransition { .. })
    ));
    assert!(matches!(
        engine.resume_execution(id),
        Err(EngineError::InvalidTransition { .. })
    ));
    assert!(matches!(
        engine.cancel_execution(id),
        Err(EngineError::InvalidTransition { .. })
    ));

    engine.start_execution(id, tasks(&["7203"])).unwrap();
    let err = engine.start_execution(id, tasks(&["7203"])).unwrap_err();
    match err {
        EngineError::InvalidTransition {
            operation, actual, ..
        } => {
            assert_eq!(operation, "start_execution");
            assert_eq!(actual, ExecutionStatus::Running);
        }
        other => panic!("unexpected error: {other}"),
    }

    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        engine.start_execution(missing, Vec::new()),
        Err(EngineError::ExecutionNotFound(id)) if id == missing
    ));
    assert!(engine.get_execution_status(missing).is_none());
}

#[test]
fn test_task_count_mismatch_uses_actual_count() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let engine = engine(fetcher, 2);
    engine.start_workers().unwrap();

    let id = engine.create_execution("partial", 10, None).unwrap();
    engine.start_execution(id, tasks(&["7203", "6758"])).unwrap();
    let snapshot = engine.wait_for_completion(id, WAIT).unwrap();

    assert_eq!(snapshot.total_tasks, 2);
    assert_eq!(snapshot.status, ExecutionStatus::Completed);
}

#[test]
fn test_empty_execution_completes_immediately() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let engine = engine(fetcher, 1);

    let id = engine.create_execution("partial", 0, None).unwrap();
    engine.start_execution(id, Vec::new()).unwrap();

    let snapshot = engine.get_execution_status(id).unwrap();
    assert_eq!(snapshot.status, ExecutionStatus::Completed);
    assert!(snapshot.end_time.is_some());
}

#[test]
fn test_store_mirrors_execution_and_details() {
    let fetcher =
        Arc::new(ScriptedFetcher::new().always_fail("6758", FetchError::NoData("6758".into())));
    let store = Arc::new(MemoryExecutionStore::new());
    let engine = BatchEngine::builder(fetcher, Arc::new(MemorySaver::new()))
        .config(fast_config(2))
        .retry(fast_retry())
        .store(store.clone())
        .build()
        .unwrap();

    let snapshot = engine
        .run_to_completion("partial", tasks(&["7203", "6758", "9984"]), WAIT)
        .unwrap();
    engine.flush_mirror();

    let db_id = snapshot.db_execution_id.expect("persisted id");
    let record = store.get_execution(db_id).unwrap().unwrap();
    assert_eq!(record.batch_type, "partial");
    assert_eq!(record.parsed_status(), Some(ExecutionStatus::Failed));
    assert_eq!(record.total_stocks, 3);
    assert_eq!(record.processed_stocks, 3);
    assert_eq!(record.successful_stocks, 2);
    assert_eq!(record.failed_stocks, 1);
    assert!(record.start_time.is_some());
    assert!(record.end_time.is_some());

    let details = store.get_details(db_id).unwrap();
    assert_eq!(details.len(), 3);
    let failed: Vec<_> = details.iter().filter(|d| d.status == "failed").collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].stock_code, "6758");
    assert!(failed[0].error_message.is_some());
    assert!(details
        .iter()
        .filter(|d| d.status == "completed")
        .all(|d| d.records_inserted == 2));
}

#[test]
fn test_store_outage_degrades_to_memory() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let engine = BatchEngine::builder(fetcher, Arc::new(MemorySaver::new()))
        .config(fast_config(2))
        .retry(fast_retry())
        .store(Arc::new(DownStore))
        .build()
        .unwrap();

    let snapshot = engine
        .run_to_completion("partial", tasks(&["7203", "6758"]), WAIT)
        .unwrap();

    assert_eq!(snapshot.db_execution_id, None);
    assert_eq!(snapshot.status, ExecutionStatus::Completed);
}

#[test]
fn test_terminal_executions_are_evicted_after_ttl() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let mut config = fast_config(1);
    config.execution_ttl_secs = 0;
    let engine = BatchEngine::builder(fetcher, Arc::new(MemorySaver::new()))
        .config(config)
        .build()
        .unwrap();

    let done = engine
        .run_to_completion("partial", tasks(&["7203"]), WAIT)
        .unwrap();
    let pending = engine.create_execution("partial", 1, None).unwrap();

    // 생성 시점에 이미 만료된 실행이 정리됨
    assert!(engine.get_execution_status(done.execution_id).is_none());
    assert!(engine.get_execution_status(pending).is_some());
    assert_eq!(engine.evict_expired(), 0);
    assert_eq!(engine.list_executions().len(), 1);
}

#[test]
fn test_worker_and_queue_status() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let engine = engine(fetcher, 3);
    assert_eq!(engine.get_worker_status().total_workers, 0);

    engine.start_workers().unwrap();
    let status = engine.get_worker_status();
    assert_eq!(status.total_workers, 3);
    assert!(status.workers.contains_key("worker-0"));
    assert_eq!(engine.get_queue_status().task_queue_max_size, 1000);

    engine.stop_workers();
    engine.stop_workers();
    assert_eq!(engine.get_worker_status().total_workers, 0);
}

#[test]
fn test_shutdown_rejects_new_work() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let engine = engine(fetcher, 1);
    engine.start_workers().unwrap();
    engine.shutdown();

    assert!(engine.is_shutdown());
    assert!(matches!(engine.start_workers(), Err(EngineError::Shutdown)));
    assert!(matches!(
        engine.create_execution("partial", 1, None),
        Err(EngineError::Shutdown)
    ));
}

#[test]
fn test_wait_times_out_while_running() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let engine = engine(fetcher, 1);
    // 워커 없이 시작하면 작업이 큐에 머무름
    let id = engine.create_execution("partial", 1, None).unwrap();
    engine.start_execution(id, tasks(&["7203"])).unwrap();

    assert!(matches!(
        engine.wait_for_completion(id, Duration::from_millis(20)),
        Err(EngineError::WaitTimeout(_))
    ));
    assert_eq!(engine.get_queue_status().task_queue_size, 1);
}

#[test]
fn test_worker_status_readable_while_stopping() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let gate = fetcher.gate("7203");
    let engine = engine(fetcher, 1);
    engine.start_workers().unwrap();

    let id = engine.create_execution("partial", 1, None).unwrap();
    engine.start_execution(id, tasks(&["7203"])).unwrap();
    gate.wait_entered();

    std::thread::scope(|scope| {
        let stopping = scope.spawn(|| engine.stop_workers());

        // 워커가 수집 중에 붙잡혀 있어도 조회는 중지 완료를 기다리지 않음
        let started = std::time::Instant::now();
        assert!(wait_until(|| engine.get_worker_status().total_workers == 0));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!stopping.is_finished());

        gate.open();
        stopping.join().unwrap();
    });

    assert_eq!(engine.get_worker_status().total_workers, 0);
}
