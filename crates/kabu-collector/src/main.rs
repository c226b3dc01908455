//! Standalone collector CLI.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use kabu_batch::{BatchEngine, BatchTask, BulkDataService, EngineError, ExecutionSnapshot, ProgressCallback};
use kabu_collector::{build_runtime, parse_symbols, Collaborators, CollectionStats, CollectorConfig};
use kabu_core::{init_logging, ExecutionStatus, Interval, LogConfig};
use kabu_data::ExecutionStore;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "kabu-collector")]
#[command(about = "Kabu bulk stock data collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (기본: config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error). 설정 파일 값보다 우선
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Args)]
struct SymbolInput {
    /// 수집할 종목 (쉼표로 구분, 예: "7203,6758.T")
    #[arg(long, conflicts_with = "file")]
    symbols: Option<String>,

    /// 종목 목록 파일 (한 줄에 한 종목)
    #[arg(long)]
    file: Option<PathBuf>,
}

impl SymbolInput {
    fn resolve(&self) -> anyhow::Result<Vec<String>> {
        match (&self.symbols, &self.file) {
            (Some(raw), _) => {
                let symbols = parse_symbols(raw);
                anyhow::ensure!(!symbols.is_empty(), "--symbols 에 종목이 없습니다");
                Ok(symbols)
            }
            (None, Some(path)) => Ok(kabu_batch::bulk::load_symbol_list(path)?),
            (None, None) => anyhow::bail!("--symbols 또는 --file 중 하나가 필요합니다"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// 호출 단위 병렬 수집 (완료까지 대기)
    Bulk {
        #[command(flatten)]
        input: SymbolInput,

        /// 시간축 (1m, 5m, 15m, 30m, 1h, 1d, 1wk, 1mo)
        #[arg(long, default_value = "1d")]
        interval: Interval,

        /// 조회 기간 (예: 1y, max). 생략 시 시간축 권장값
        #[arg(long)]
        period: Option<String>,

        /// 병렬 스레드 수 (설정값 대신 사용)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// 배치 엔진으로 실행하고 진행 상황을 추적
    Batch {
        #[command(flatten)]
        input: SymbolInput,

        #[arg(long, default_value = "1d")]
        interval: Interval,

        #[arg(long)]
        period: Option<String>,

        /// 배치 종류 (예: all_stocks, partial)
        #[arg(long, default_value = "partial")]
        batch_type: String,

        /// 최대 대기 시간 (초). 초과 시 실행을 취소합니다
        #[arg(long, default_value_t = 3600)]
        timeout_secs: u64,
    },

    /// 샘플 종목 하나로 전체 소요 시간 추정
    Estimate {
        /// 대상 종목 수
        #[arg(long)]
        count: usize,

        #[arg(long, default_value = "1d")]
        interval: Interval,
    },

    /// 저장된 배치 실행 기록 조회
    History {
        #[arg(long, default_value_t = 20)]
        limit: i64,

        /// 상태 필터 (pending, running, paused, completed, failed, cancelled)
        #[arg(long)]
        status: Option<ExecutionStatus>,
    },
}

#[derive(Serialize)]
struct BatchReport {
    execution: ExecutionSnapshot,
    error_report: kabu_batch::ErrorReport,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = CollectorConfig::from_env(cli.config.clone())?;

    let mut log_config = LogConfig::from_settings(&config.app.logging);
    if let Some(level) = &cli.log_level {
        log_config.level = level.clone();
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("logging init failed: {e}"))?;

    tracing::info!(config = %config.config_path.display(), "Kabu Collector 시작");

    let runtime = build_runtime()?;
    let collaborators = Collaborators::build(&runtime, &config)?;

    match cli.command {
        Commands::Bulk {
            input,
            interval,
            period,
            workers,
        } => {
            let symbols = input.resolve()?;
            let mut bulk_config = config.app.bulk.clone();
            if let Some(workers) = workers {
                anyhow::ensure!(workers > 0, "--workers 는 1 이상이어야 합니다");
                bulk_config.max_workers = workers;
            }

            let service = BulkDataService::new(
                collaborators.fetcher.clone(),
                collaborators.saver.clone(),
                bulk_config,
            );
            let summary =
                service.fetch_multiple_stocks(&symbols, interval, period.as_deref(), None)?;

            CollectionStats::from_bulk(&summary).log_summary("일괄 수집");
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Batch {
            input,
            interval,
            period,
            batch_type,
            timeout_secs,
        } => {
            let symbols = input.resolve()?;
            let tasks = BatchTask::for_symbols(symbols.iter(), interval, period.as_deref());

            let engine = BatchEngine::builder(
                collaborators.fetcher.clone(),
                collaborators.saver.clone(),
            )
            .config(config.app.engine.clone())
            .retry(config.app.retry.clone())
            .store(collaborators.store.clone())
            .build()?;
            engine.start_workers()?;

            let callback: ProgressCallback = Arc::new(|snapshot: &ExecutionSnapshot| {
                let processed = snapshot.processed_tasks();
                if processed % 10 == 0 || processed == snapshot.total_tasks {
                    tracing::info!(
                        execution_id = %snapshot.execution_id,
                        status = %snapshot.status,
                        processed,
                        total = snapshot.total_tasks,
                        progress = format!("{:.1}%", snapshot.progress_percentage),
                        "배치 진행"
                    );
                }
            });

            let execution_id = engine.create_execution(&batch_type, tasks.len(), Some(callback))?;
            engine.start_execution(execution_id, tasks)?;

            let snapshot = match engine
                .wait_for_completion(execution_id, Duration::from_secs(timeout_secs))
            {
                Ok(snapshot) => snapshot,
                Err(EngineError::WaitTimeout(_)) => {
                    tracing::warn!(execution_id = %execution_id, timeout_secs, "제한 시간 초과 - 실행을 취소합니다");
                    engine.cancel_execution(execution_id)?;
                    engine
                        .get_execution_status(execution_id)
                        .context("execution disappeared after cancel")?
                }
                Err(e) => return Err(e.into()),
            };

            engine.flush_mirror();
            let total_records = match snapshot.db_execution_id {
                Some(db_id) => collaborators
                    .store
                    .get_details(db_id)
                    .map(|details| {
                        details
                            .iter()
                            .map(|d| usize::try_from(d.records_inserted).unwrap_or(0))
                            .sum::<usize>()
                    })
                    .unwrap_or(0),
                None => 0,
            };
            let report = BatchReport {
                error_report: engine.error_handler().generate_error_report(),
                execution: snapshot,
            };
            engine.shutdown();

            CollectionStats::from_execution(&report.execution, total_records).log_summary("배치 수집");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Estimate { count, interval } => {
            let service = BulkDataService::new(
                collaborators.fetcher.clone(),
                collaborators.saver.clone(),
                config.app.bulk.clone(),
            );
            let estimate = service.estimate_completion_time(count, interval);
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
        Commands::History { limit, status } => {
            if !collaborators.persistent {
                tracing::warn!("database.url 미설정 - 이 프로세스의 메모리 기록만 조회됩니다");
            }
            let records = collaborators.store.list_executions(limit, 0, status)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    tracing::info!("Kabu Collector 종료");
    Ok(())
}
