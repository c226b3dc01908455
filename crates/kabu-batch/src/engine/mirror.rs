//! 영속 저장소 미러.
//!
//! 엔진의 임계 구역 안에서는 명령을 채널에 넣기만 하고, 실제 저장소 호출은
//! 전용 스레드가 순서대로 수행합니다. 같은 실행에 대한 명령은 결정된 순서
//! 그대로 적용되며, 종료 기록 이후의 비종료 상태 갱신은 버립니다.
//!
//! 저장소 오류는 로그만 남기고 엔진으로 전파하지 않습니다.

use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender};
use kabu_core::{DetailStatus, ExecutionStatus};
use kabu_data::ExecutionStore;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// 미러 명령.
#[derive(Debug)]
pub(crate) enum MirrorCommand {
    Status {
        db_id: i64,
        status: ExecutionStatus,
        start_time: Option<DateTime<Utc>>,
    },
    Progress {
        db_id: i64,
        processed: i32,
        successful: i32,
        failed: i32,
    },
    Complete {
        db_id: i64,
        status: ExecutionStatus,
        end_time: DateTime<Utc>,
        error_message: Option<String>,
    },
    DetailStarted {
        db_id: i64,
        task_id: Uuid,
        symbol: String,
    },
    DetailFinished {
        task_id: Uuid,
        status: DetailStatus,
        records_inserted: i32,
        error_message: Option<String>,
    },
    /// 엔진 메모리에서 제거된 실행의 추적 상태를 버립니다.
    Forget {
        db_id: i64,
    },
    Flush(Sender<()>),
    Shutdown,
}

/// 미러 스레드 핸들.
pub(crate) struct Mirror {
    tx: Sender<MirrorCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Mirror {
    pub(crate) fn spawn(store: Arc<dyn ExecutionStore>) -> std::io::Result<Self> {
        let (tx, rx) = channel::unbounded();
        let handle = std::thread::Builder::new()
            .name("kabu-mirror".to_string())
            .spawn(move || MirrorActor::new(store).run(rx))?;
        Ok(Self {
            tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// 명령을 넣습니다. 블록하지 않습니다.
    pub(crate) fn send(&self, command: MirrorCommand) {
        if self.tx.send(command).is_err() {
            warn!("미러 스레드가 종료되어 명령을 버립니다");
        }
    }

    /// 지금까지 넣은 명령이 모두 적용될 때까지 기다립니다.
    pub(crate) fn flush(&self) {
        let (ack_tx, ack_rx) = channel::bounded(1);
        if self.tx.send(MirrorCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// 남은 명령을 적용한 뒤 스레드를 종료합니다.
    pub(crate) fn shutdown(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        let _ = self.tx.send(MirrorCommand::Shutdown);
        if handle.join().is_err() {
            error!("미러 스레드가 패닉으로 종료됨");
        }
    }
}

struct MirrorActor {
    store: Arc<dyn ExecutionStore>,
    /// task_id -> (db 실행 ID, 상세 ID)
    details: HashMap<Uuid, (i64, i64)>,
    finished: HashSet<i64>,
}

impl MirrorActor {
    fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self {
            store,
            details: HashMap::new(),
            finished: HashSet::new(),
        }
    }

    fn run(mut self, rx: Receiver<MirrorCommand>) {
        for command in rx.iter() {
            match command {
                MirrorCommand::Flush(ack) => {
                    let _ = ack.send(());
                }
                MirrorCommand::Shutdown => break,
                other => self.apply(other),
            }
        }
        debug!("미러 스레드 종료");
    }

    fn apply(&mut self, command: MirrorCommand) {
        let result = match command {
            MirrorCommand::Status {
                db_id,
                status,
                start_time,
            } => {
                if self.finished.contains(&db_id) {
                    debug!(db_id, status = %status, "종료된 실행의 상태 갱신 무시");
                    return;
                }
                self.store.update_execution_status(db_id, status, start_time)
            }
            MirrorCommand::Progress {
                db_id,
                processed,
                successful,
                failed,
            } => self
                .store
                .update_execution_progress(db_id, processed, successful, failed),
            MirrorCommand::Complete {
                db_id,
                status,
                end_time,
                error_message,
            } => {
                if !self.finished.insert(db_id) {
                    return;
                }
                self.store
                    .complete_execution(db_id, status, end_time, error_message.as_deref())
            }
            MirrorCommand::DetailStarted {
                db_id,
                task_id,
                symbol,
            } => self.store.create_detail(db_id, &symbol).map(|detail_id| {
                self.details.insert(task_id, (db_id, detail_id));
            }),
            MirrorCommand::DetailFinished {
                task_id,
                status,
                records_inserted,
                error_message,
            } => match self.details.remove(&task_id) {
                Some((_, detail_id)) => self.store.update_detail(
                    detail_id,
                    status,
                    records_inserted,
                    error_message.as_deref(),
                ),
                None => return,
            },
            MirrorCommand::Forget { db_id } => {
                self.finished.remove(&db_id);
                self.details.retain(|_, (owner, _)| *owner != db_id);
                return;
            }
            MirrorCommand::Flush(_) | MirrorCommand::Shutdown => return,
        };

        if let Err(e) = result {
            error!(error = %e, "실행 기록 저장 실패 (메모리 집계는 계속 유지)");
        }
    }
}
