//! 메모리 실행 기록 저장소.
//!
//! DB 없이 엔진을 실행하거나 테스트에서 영속 레코드를 검증할 때 사용합니다.

use super::{ExecutionDetailRecord, ExecutionRecord, ExecutionStore};
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use kabu_core::{DetailStatus, ExecutionStatus};
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Default)]
struct Tables {
    next_execution_id: i64,
    next_detail_id: i64,
    executions: BTreeMap<i64, ExecutionRecord>,
    details: BTreeMap<i64, ExecutionDetailRecord>,
}

/// 메모리 저장소.
#[derive(Default)]
pub struct MemoryExecutionStore {
    tables: Mutex<Tables>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 실행 레코드 수.
    pub fn execution_count(&self) -> usize {
        self.tables.lock().executions.len()
    }

    fn with_execution<F>(&self, id: i64, f: F) -> Result<()>
    where
        F: FnOnce(&mut ExecutionRecord),
    {
        let mut tables = self.tables.lock();
        let record = tables
            .executions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("batch_executions id={}", id)))?;
        f(record);
        Ok(())
    }
}

impl ExecutionStore for MemoryExecutionStore {
    fn create_execution(
        &self,
        batch_type: &str,
        total_stocks: i32,
        status: ExecutionStatus,
    ) -> Result<i64> {
        let mut tables = self.tables.lock();
        tables.next_execution_id += 1;
        let id = tables.next_execution_id;
        tables.executions.insert(
            id,
            ExecutionRecord {
                id,
                batch_type: batch_type.to_string(),
                status: status.as_str().to_string(),
                total_stocks,
                processed_stocks: 0,
                successful_stocks: 0,
                failed_stocks: 0,
                start_time: None,
                end_time: None,
                error_message: None,
                created_at: Some(Utc::now()),
            },
        );
        Ok(id)
    }

    fn update_execution_status(
        &self,
        id: i64,
        status: ExecutionStatus,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.with_execution(id, |r| {
            r.status = status.as_str().to_string();
            if start_time.is_some() {
                r.start_time = start_time;
            }
        })
    }

    fn update_execution_progress(
        &self,
        id: i64,
        processed: i32,
        successful: i32,
        failed: i32,
    ) -> Result<()> {
        self.with_execution(id, |r| {
            r.processed_stocks = processed;
            r.successful_stocks = successful;
            r.failed_stocks = failed;
        })
    }

    fn complete_execution(
        &self,
        id: i64,
        status: ExecutionStatus,
        end_time: DateTime<Utc>,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.with_execution(id, |r| {
            r.status = status.as_str().to_string();
            r.end_time = Some(end_time);
            if let Some(msg) = error_message {
                r.error_message = Some(msg.to_string());
            }
        })
    }

    fn create_detail(&self, execution_id: i64, stock_code: &str) -> Result<i64> {
        let mut tables = self.tables.lock();
        if !tables.executions.contains_key(&execution_id) {
            return Err(StoreError::NotFound(format!(
                "batch_executions id={}",
                execution_id
            )));
        }
        tables.next_detail_id += 1;
        let id = tables.next_detail_id;
        let now = Utc::now();
        tables.details.insert(
            id,
            ExecutionDetailRecord {
                id,
                batch_execution_id: execution_id,
                stock_code: stock_code.to_string(),
                status: DetailStatus::Processing.as_str().to_string(),
                start_time: Some(now),
                end_time: None,
                error_message: None,
                records_inserted: 0,
                created_at: Some(now),
            },
        );
        Ok(id)
    }

    fn update_detail(
        &self,
        detail_id: i64,
        status: DetailStatus,
        records_inserted: i32,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut tables = self.tables.lock();
        let detail = tables
            .details
            .get_mut(&detail_id)
            .ok_or_else(|| StoreError::NotFound(format!("batch_execution_details id={}", detail_id)))?;
        detail.status = status.as_str().to_string();
        detail.records_inserted = records_inserted;
        detail.error_message = error_message.map(str::to_string);
        detail.end_time = Some(Utc::now());
        Ok(())
    }

    fn get_execution(&self, id: i64) -> Result<Option<ExecutionRecord>> {
        Ok(self.tables.lock().executions.get(&id).cloned())
    }

    fn list_executions(
        &self,
        limit: i64,
        offset: i64,
        status: Option<ExecutionStatus>,
    ) -> Result<Vec<ExecutionRecord>> {
        let tables = self.tables.lock();
        Ok(tables
            .executions
            .values()
            .rev()
            .filter(|r| status.map_or(true, |s| r.status == s.as_str()))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    fn get_details(&self, execution_id: i64) -> Result<Vec<ExecutionDetailRecord>> {
        Ok(self
            .tables
            .lock()
            .details
            .values()
            .filter(|d| d.batch_execution_id == execution_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_lifecycle_rows() {
        let store = MemoryExecutionStore::new();
        let id = store
            .create_execution("partial", 3, ExecutionStatus::Pending)
            .unwrap();

        let started = Utc::now();
        store
            .update_execution_status(id, ExecutionStatus::Running, Some(started))
            .unwrap();
        store.update_execution_progress(id, 3, 2, 1).unwrap();
        store
            .complete_execution(id, ExecutionStatus::Failed, Utc::now(), None)
            .unwrap();

        let record = store.get_execution(id).unwrap().unwrap();
        assert_eq!(record.status, "failed");
        assert_eq!(record.start_time, Some(started));
        assert_eq!(record.processed_stocks, 3);
        assert_eq!(record.failed_stocks, 1);
        assert!(record.end_time.is_some());
    }

    #[test]
    fn test_detail_rows() {
        let store = MemoryExecutionStore::new();
        let id = store
            .create_execution("partial", 1, ExecutionStatus::Running)
            .unwrap();
        let detail = store.create_detail(id, "7203").unwrap();
        store
            .update_detail(detail, DetailStatus::Completed, 250, None)
            .unwrap();

        let details = store.get_details(id).unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].status, "completed");
        assert_eq!(details[0].records_inserted, 250);

        assert!(store.create_detail(999, "7203").is_err());
    }

    #[test]
    fn test_list_executions_filters_and_pages() {
        let store = MemoryExecutionStore::new();
        for _ in 0..3 {
            store
                .create_execution("all_stocks", 10, ExecutionStatus::Pending)
                .unwrap();
        }
        let done = store
            .create_execution("partial", 1, ExecutionStatus::Pending)
            .unwrap();
        store
            .complete_execution(done, ExecutionStatus::Completed, Utc::now(), None)
            .unwrap();

        let all = store.list_executions(10, 0, None).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].id, done);

        let page = store.list_executions(2, 1, None).unwrap();
        assert_eq!(page.len(), 2);

        let completed = store
            .list_executions(10, 0, Some(ExecutionStatus::Completed))
            .unwrap();
        assert_eq!(completed.len(), 1);
    }
}
