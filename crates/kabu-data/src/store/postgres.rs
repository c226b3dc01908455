//! PostgreSQL 실행 기록 저장소.

use super::{ExecutionDetailRecord, ExecutionRecord, ExecutionStore};
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use kabu_core::{DetailStatus, ExecutionStatus};
use sqlx::postgres::PgPool;
use tokio::runtime::Handle;
use tracing::{debug, instrument};

const EXECUTION_COLUMNS: &str = r#"
    id::bigint AS id, batch_type, status,
    total_stocks, COALESCE(processed_stocks, 0) AS processed_stocks,
    COALESCE(successful_stocks, 0) AS successful_stocks,
    COALESCE(failed_stocks, 0) AS failed_stocks,
    start_time, end_time, error_message, created_at
"#;

const DETAIL_COLUMNS: &str = r#"
    id::bigint AS id, batch_execution_id::bigint AS batch_execution_id,
    stock_code, status, start_time, end_time, error_message,
    COALESCE(records_inserted, 0) AS records_inserted, created_at
"#;

/// `batch_executions` / `batch_execution_details` 테이블 저장소.
///
/// 호출마다 트랜잭션 하나를 열고 커밋합니다.
#[derive(Clone)]
pub struct PgExecutionStore {
    pool: PgPool,
    runtime: Handle,
}

impl PgExecutionStore {
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self { pool, runtime }
    }
}

impl ExecutionStore for PgExecutionStore {
    #[instrument(skip(self))]
    fn create_execution(
        &self,
        batch_type: &str,
        total_stocks: i32,
        status: ExecutionStatus,
    ) -> Result<i64> {
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            let (id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO batch_executions
                    (batch_type, status, total_stocks, processed_stocks, successful_stocks, failed_stocks, start_time)
                VALUES ($1, $2, $3, 0, 0, 0, NULL)
                RETURNING id::bigint
                "#,
            )
            .bind(batch_type)
            .bind(status.as_str())
            .bind(total_stocks)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;

            debug!(id, batch_type, "batch_executions 레코드 생성");
            Ok::<_, StoreError>(id)
        })
    }

    fn update_execution_status(
        &self,
        id: i64,
        status: ExecutionStatus,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                r#"
                UPDATE batch_executions
                SET status = $2, start_time = COALESCE($3, start_time)
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(status.as_str())
            .bind(start_time)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<_, StoreError>(())
        })
    }

    fn update_execution_progress(
        &self,
        id: i64,
        processed: i32,
        successful: i32,
        failed: i32,
    ) -> Result<()> {
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                r#"
                UPDATE batch_executions
                SET processed_stocks = $2, successful_stocks = $3, failed_stocks = $4
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(processed)
            .bind(successful)
            .bind(failed)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<_, StoreError>(())
        })
    }

    fn complete_execution(
        &self,
        id: i64,
        status: ExecutionStatus,
        end_time: DateTime<Utc>,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                r#"
                UPDATE batch_executions
                SET status = $2, end_time = $3, error_message = COALESCE($4, error_message)
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(status.as_str())
            .bind(end_time)
            .bind(error_message)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<_, StoreError>(())
        })
    }

    fn create_detail(&self, execution_id: i64, stock_code: &str) -> Result<i64> {
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            let (id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO batch_execution_details
                    (batch_execution_id, stock_code, status, start_time, records_inserted)
                VALUES ($1, $2, $3, NOW(), 0)
                RETURNING id::bigint
                "#,
            )
            .bind(execution_id)
            .bind(stock_code)
            .bind(DetailStatus::Processing.as_str())
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<_, StoreError>(id)
        })
    }

    fn update_detail(
        &self,
        detail_id: i64,
        status: DetailStatus,
        records_inserted: i32,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                r#"
                UPDATE batch_execution_details
                SET status = $2, records_inserted = $3, error_message = $4, end_time = NOW()
                WHERE id = $1
                "#,
            )
            .bind(detail_id)
            .bind(status.as_str())
            .bind(records_inserted)
            .bind(error_message)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<_, StoreError>(())
        })
    }

    fn get_execution(&self, id: i64) -> Result<Option<ExecutionRecord>> {
        let sql = format!("SELECT {EXECUTION_COLUMNS} FROM batch_executions WHERE id = $1");
        self.runtime.block_on(async {
            let record = sqlx::query_as::<_, ExecutionRecord>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok::<_, StoreError>(record)
        })
    }

    fn list_executions(
        &self,
        limit: i64,
        offset: i64,
        status: Option<ExecutionStatus>,
    ) -> Result<Vec<ExecutionRecord>> {
        let sql = format!(
            r#"
            SELECT {EXECUTION_COLUMNS} FROM batch_executions
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC NULLS LAST, id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        self.runtime.block_on(async {
            let records = sqlx::query_as::<_, ExecutionRecord>(&sql)
                .bind(status.map(|s| s.as_str()))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
            Ok::<_, StoreError>(records)
        })
    }

    fn get_details(&self, execution_id: i64) -> Result<Vec<ExecutionDetailRecord>> {
        let sql = format!(
            "SELECT {DETAIL_COLUMNS} FROM batch_execution_details WHERE batch_execution_id = $1 ORDER BY id"
        );
        self.runtime.block_on(async {
            let records = sqlx::query_as::<_, ExecutionDetailRecord>(&sql)
                .bind(execution_id)
                .fetch_all(&self.pool)
                .await?;
            Ok::<_, StoreError>(records)
        })
    }
}
