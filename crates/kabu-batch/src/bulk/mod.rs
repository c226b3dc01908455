//! 단순 일괄 수집 경로.
//!
//! 영속 기록이나 실행 레지스트리 없이 호출 한 번에 종목 목록을 병렬 처리하고
//! 요약을 돌려줍니다. 장기 실행/추적이 필요하면 [`crate::BatchEngine`]을 사용합니다.

mod service;
mod tracker;

pub use service::{load_symbol_list, BulkDataService, CompletionEstimate, StockFetchResult};
pub use tracker::{BulkSummary, ErrorDetail, ProgressInfo, ProgressTracker, MAX_ERROR_DETAILS};
