//! 협력자 구성.
//!
//! 엔진과 일괄 수집 경로는 OS 스레드에서 동작하고, 비동기 클라이언트는
//! 별도 tokio 런타임의 `Handle`로 구동합니다. DB URL이 없으면 메모리 구현을 씁니다.

use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use kabu_data::{
    Database, ExecutionStore, Fetcher, MemoryExecutionStore, MemorySaver, PgExecutionStore,
    PgOhlcvSaver, Saver, YahooFetcher,
};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{info, warn};

/// CLI가 엔진에 넘기는 협력자 묶음.
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub saver: Arc<dyn Saver>,
    pub store: Arc<dyn ExecutionStore>,
    /// PostgreSQL 저장소 사용 여부
    pub persistent: bool,
}

/// 클라이언트 구동용 멀티스레드 런타임.
pub fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .thread_name("kabu-io")
        .enable_all()
        .build()
        .map_err(CollectorError::Runtime)
}

impl Collaborators {
    pub fn build(runtime: &Runtime, config: &CollectorConfig) -> Result<Self> {
        let handle = runtime.handle().clone();
        let fetcher = YahooFetcher::new(handle.clone())
            .map_err(|e| CollectorError::DataSource(e.to_string()))?;

        if !config.has_database() {
            warn!("database.url 미설정 - 메모리 저장소로 실행합니다");
            return Ok(Self {
                fetcher: Arc::new(fetcher),
                saver: Arc::new(MemorySaver::new()),
                store: Arc::new(MemoryExecutionStore::new()),
                persistent: false,
            });
        }

        let database = runtime.block_on(async {
            let database = Database::connect(&config.app.database).await?;
            database.migrate().await?;
            Ok::<_, kabu_data::StoreError>(database)
        })?;
        info!("PostgreSQL 저장소 사용");
        Ok(Self {
            fetcher: Arc::new(fetcher),
            saver: Arc::new(PgOhlcvSaver::new(database.pool().clone(), handle.clone())),
            store: Arc::new(PgExecutionStore::new(database.pool().clone(), handle)),
            persistent: true,
        })
    }
}
