//! 수집 엔진의 외부 협력자.
//!
//! 이 crate는 다음을 제공합니다:
//! - `Fetcher`: 종목 OHLCV 데이터 수집 (Yahoo Finance 구현)
//! - `Saver`: `(symbol, timestamp)` 키 upsert 저장 (PostgreSQL / 메모리 구현)
//! - `ExecutionStore`: 배치 실행 및 종목별 상세 레코드 영속화
//!
//! 엔진은 OS 스레드에서 동작하므로 모든 트레이트는 동기 인터페이스입니다.
//! 비동기 클라이언트(`yahoo_finance_api`, `sqlx`)를 쓰는 구현체는
//! `tokio::runtime::Handle`을 보관하고 호출 스레드에서 `block_on`합니다.

pub mod database;
pub mod error;
pub mod fetcher;
pub mod saver;
pub mod store;

pub use database::Database;
pub use error::{Result, StoreError};
pub use fetcher::{Fetcher, YahooFetcher};
pub use saver::{MemorySaver, PgOhlcvSaver, SaveSummary, Saver};
pub use store::{
    ExecutionDetailRecord, ExecutionRecord, ExecutionStore, MemoryExecutionStore,
    PgExecutionStore,
};
