//! 통합 테스트용 가짜 협력자.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use crossbeam::channel::{self, Receiver, Sender};
use kabu_batch::ExecutionSnapshot;
use kabu_core::{
    DetailStatus, ExecutionStatus, FetchError, FetchResult, Interval, OhlcvBar, SaveError,
    SaveResult,
};
use kabu_data::{
    ExecutionDetailRecord, ExecutionRecord, ExecutionStore, Fetcher, SaveSummary, Saver,
    StoreError,
};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub fn bar(symbol: &str, interval: Interval, day: u32) -> OhlcvBar {
    OhlcvBar::new(
        symbol,
        interval,
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        dec!(2500),
        dec!(2550),
        dec!(2480),
        dec!(2520),
        1_000_000,
    )
}

/// 종목별로 실패 순서를 지정할 수 있는 수집기.
///
/// 스크립트가 없는 종목은 바 두 개를 반환합니다.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Vec<FetchError>>>,
    always_fail: Mutex<HashMap<String, FetchError>>,
    calls: Mutex<Vec<String>>,
    gate: Mutex<Option<Gate>>,
}

/// 특정 종목 수집을 해제 신호까지 붙잡아 두는 장치.
pub struct Gate {
    symbol: String,
    entered: Sender<()>,
    release: Receiver<()>,
}

pub struct GateHandle {
    pub entered: Receiver<()>,
    pub release: Sender<()>,
}

impl GateHandle {
    pub fn wait_entered(&self) {
        self.entered
            .recv_timeout(Duration::from_secs(5))
            .expect("gated fetch never started");
    }

    pub fn open(&self) {
        self.release.send(()).unwrap();
    }
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 앞으로 `symbol` 수집이 `errors` 순서대로 실패한 뒤 성공합니다.
    pub fn fail_then_succeed(self, symbol: &str, errors: Vec<FetchError>) -> Self {
        self.scripts.lock().insert(symbol.to_string(), errors);
        self
    }

    pub fn always_fail(self, symbol: &str, error: FetchError) -> Self {
        self.always_fail.lock().insert(symbol.to_string(), error);
        self
    }

    pub fn gate(&self, symbol: &str) -> GateHandle {
        let (entered_tx, entered_rx) = channel::unbounded();
        let (release_tx, release_rx) = channel::unbounded();
        *self.gate.lock() = Some(Gate {
            symbol: symbol.to_string(),
            entered: entered_tx,
            release: release_rx,
        });
        GateHandle {
            entered: entered_rx,
            release: release_tx,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, symbol: &str) -> usize {
        self.calls.lock().iter().filter(|s| s.as_str() == symbol).count()
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        _period: Option<&str>,
    ) -> FetchResult<Vec<OhlcvBar>> {
        self.calls.lock().push(symbol.to_string());

        let gate = {
            let guard = self.gate.lock();
            guard
                .as_ref()
                .filter(|g| g.symbol == symbol)
                .map(|g| (g.entered.clone(), g.release.clone()))
        };
        if let Some((entered, release)) = gate {
            entered.send(()).unwrap();
            release.recv_timeout(Duration::from_secs(5)).unwrap();
        }

        if let Some(err) = self.always_fail.lock().get(symbol) {
            return Err(err.clone());
        }
        if let Some(script) = self.scripts.lock().get_mut(symbol) {
            if !script.is_empty() {
                return Err(script.remove(0));
            }
        }
        Ok(vec![bar(symbol, interval, 4), bar(symbol, interval, 5)])
    }
}

/// 지정 종목에서 DB 오류를 내는 저장기. 나머지는 저장 건수만 셉니다.
#[derive(Default)]
pub struct FlakySaver {
    failing: Mutex<Vec<String>>,
    saved: AtomicUsize,
}

impl FlakySaver {
    pub fn failing_on(symbol: &str) -> Self {
        let saver = Self::default();
        saver.failing.lock().push(symbol.to_string());
        saver
    }

    pub fn saved(&self) -> usize {
        self.saved.load(Ordering::SeqCst)
    }
}

impl Saver for FlakySaver {
    fn save(&self, symbol: &str, _interval: Interval, bars: &[OhlcvBar]) -> SaveResult<SaveSummary> {
        if self.failing.lock().iter().any(|s| s == symbol) {
            return Err(SaveError::Database("connection reset".into()));
        }
        self.saved.fetch_add(bars.len(), Ordering::SeqCst);
        Ok(SaveSummary {
            saved: bars.len(),
            skipped: 0,
        })
    }
}

/// 모든 호출이 실패하는 저장소.
pub struct DownStore;

impl ExecutionStore for DownStore {
    fn create_execution(&self, _: &str, _: i32, _: ExecutionStatus) -> kabu_data::Result<i64> {
        Err(StoreError::Unavailable("db down".into()))
    }

    fn update_execution_status(
        &self,
        _: i64,
        _: ExecutionStatus,
        _: Option<DateTime<Utc>>,
    ) -> kabu_data::Result<()> {
        Err(StoreError::Unavailable("db down".into()))
    }

    fn update_execution_progress(&self, _: i64, _: i32, _: i32, _: i32) -> kabu_data::Result<()> {
        Err(StoreError::Unavailable("db down".into()))
    }

    fn complete_execution(
        &self,
        _: i64,
        _: ExecutionStatus,
        _: DateTime<Utc>,
        _: Option<&str>,
    ) -> kabu_data::Result<()> {
        Err(StoreError::Unavailable("db down".into()))
    }

    fn create_detail(&self, _: i64, _: &str) -> kabu_data::Result<i64> {
        Err(StoreError::Unavailable("db down".into()))
    }

    fn update_detail(
        &self,
        _: i64,
        _: DetailStatus,
        _: i32,
        _: Option<&str>,
    ) -> kabu_data::Result<()> {
        Err(StoreError::Unavailable("db down".into()))
    }

    fn get_execution(&self, _: i64) -> kabu_data::Result<Option<ExecutionRecord>> {
        Err(StoreError::Unavailable("db down".into()))
    }

    fn list_executions(
        &self,
        _: i64,
        _: i64,
        _: Option<ExecutionStatus>,
    ) -> kabu_data::Result<Vec<ExecutionRecord>> {
        Err(StoreError::Unavailable("db down".into()))
    }

    fn get_details(&self, _: i64) -> kabu_data::Result<Vec<ExecutionDetailRecord>> {
        Err(StoreError::Unavailable("db down".into()))
    }
}

/// 조건이 참이 될 때까지 최대 5초 기다립니다.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// 진행 콜백 관찰 기록.
#[derive(Default)]
pub struct Observations {
    pub snapshots: Mutex<Vec<ExecutionSnapshot>>,
}
