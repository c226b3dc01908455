//! OHLCV 데이터 저장기.
//!
//! 저장은 `(symbol, timestamp)` 키 기준으로 멱등이어야 합니다.
//! 재시도로 같은 바가 다시 들어와도 중복 삽입되지 않고 `skipped`로 집계됩니다.

use chrono::{DateTime, NaiveDate, Utc};
use kabu_core::{Interval, OhlcvBar, SaveError, SaveResult};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use std::collections::BTreeMap;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// 저장 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSummary {
    /// 새로 저장된 레코드 수
    pub saved: usize,
    /// 이미 존재해서 건너뛴 레코드 수
    pub skipped: usize,
}

impl SaveSummary {
    pub fn total(&self) -> usize {
        self.saved + self.skipped
    }
}

/// OHLCV 저장 인터페이스.
pub trait Saver: Send + Sync {
    fn save(&self, symbol: &str, interval: Interval, bars: &[OhlcvBar]) -> SaveResult<SaveSummary>;
}

fn validate_all(bars: &[OhlcvBar]) -> SaveResult<()> {
    for bar in bars {
        bar.validate()
            .map_err(|e| SaveError::InvalidRecord(format!("{}: {}", bar.symbol, e)))?;
    }
    Ok(())
}

/// 청크당 최대 행 수.
const CHUNK_SIZE: usize = 500;

/// PostgreSQL 저장기.
///
/// 시간축별 `stocks_<interval>` 테이블에 UNNEST 일괄 삽입합니다.
/// 일봉 이상은 `(symbol, date)`, 일중 데이터는 `(symbol, datetime)`이 고유 키입니다.
#[derive(Clone)]
pub struct PgOhlcvSaver {
    pool: PgPool,
    runtime: Handle,
}

impl PgOhlcvSaver {
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self { pool, runtime }
    }

    async fn save_async(
        &self,
        symbol: &str,
        interval: Interval,
        bars: &[OhlcvBar],
    ) -> SaveResult<SaveSummary> {
        let table = interval.table_name();
        let key_column = if interval.is_intraday() {
            "datetime"
        } else {
            "date"
        };
        let key_type = if interval.is_intraday() {
            "timestamptz"
        } else {
            "date"
        };
        let sql = format!(
            r#"
            INSERT INTO {table} (symbol, {key_column}, open, high, low, close, volume)
            SELECT * FROM UNNEST(
                $1::text[], $2::{key_type}[],
                $3::numeric[], $4::numeric[], $5::numeric[], $6::numeric[], $7::bigint[]
            )
            ON CONFLICT (symbol, {key_column}) DO NOTHING
            "#
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SaveError::Database(e.to_string()))?;

        let mut saved = 0usize;
        for chunk in bars.chunks(CHUNK_SIZE) {
            let symbols: Vec<&str> = chunk.iter().map(|_| symbol).collect();
            let opens: Vec<Decimal> = chunk.iter().map(|b| b.open).collect();
            let highs: Vec<Decimal> = chunk.iter().map(|b| b.high).collect();
            let lows: Vec<Decimal> = chunk.iter().map(|b| b.low).collect();
            let closes: Vec<Decimal> = chunk.iter().map(|b| b.close).collect();
            let volumes: Vec<i64> = chunk.iter().map(|b| b.volume).collect();

            let query = sqlx::query(&sql).bind(&symbols);
            let query = if interval.is_intraday() {
                let times: Vec<DateTime<Utc>> = chunk.iter().map(|b| b.timestamp).collect();
                query.bind(times)
            } else {
                let dates: Vec<NaiveDate> = chunk.iter().map(|b| b.trade_date()).collect();
                query.bind(dates)
            };

            let result = query
                .bind(&opens)
                .bind(&highs)
                .bind(&lows)
                .bind(&closes)
                .bind(&volumes)
                .execute(&mut *tx)
                .await
                .map_err(|e| SaveError::Database(e.to_string()))?;

            saved += result.rows_affected() as usize;
        }

        tx.commit()
            .await
            .map_err(|e| SaveError::Transaction(e.to_string()))?;

        Ok(SaveSummary {
            saved,
            skipped: bars.len().saturating_sub(saved),
        })
    }
}

impl Saver for PgOhlcvSaver {
    fn save(&self, symbol: &str, interval: Interval, bars: &[OhlcvBar]) -> SaveResult<SaveSummary> {
        if bars.is_empty() {
            return Ok(SaveSummary::default());
        }
        validate_all(bars)?;

        let summary = self
            .runtime
            .block_on(self.save_async(symbol, interval, bars))?;

        info!(
            symbol,
            table = interval.table_name(),
            saved = summary.saved,
            skipped = summary.skipped,
            "OHLCV 저장 완료"
        );
        Ok(summary)
    }
}

/// 메모리 저장기.
///
/// DB 없이 수집만 검증할 때와 테스트에서 사용합니다.
#[derive(Default)]
pub struct MemorySaver {
    bars: Mutex<BTreeMap<(String, Interval, DateTime<Utc>), OhlcvBar>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 전체 바 수.
    pub fn len(&self) -> usize {
        self.bars.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.lock().is_empty()
    }

    /// 종목의 저장된 바 수 (모든 시간축 합계).
    pub fn count_for(&self, symbol: &str) -> usize {
        self.bars
            .lock()
            .keys()
            .filter(|(s, _, _)| s == symbol)
            .count()
    }
}

impl Saver for MemorySaver {
    fn save(&self, symbol: &str, interval: Interval, bars: &[OhlcvBar]) -> SaveResult<SaveSummary> {
        validate_all(bars)?;

        let mut store = self.bars.lock();
        let mut summary = SaveSummary::default();
        for bar in bars {
            let key = (symbol.to_string(), interval, bar.timestamp);
            if store.contains_key(&key) {
                summary.skipped += 1;
            } else {
                store.insert(key, bar.clone());
                summary.saved += 1;
            }
        }

        debug!(symbol, saved = summary.saved, skipped = summary.skipped, "메모리 저장");
        Ok(summary)
    }
}
