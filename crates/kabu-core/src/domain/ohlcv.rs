//! OHLCV 바 데이터.
//!
//! 수집기(`Fetcher`)가 반환하고 저장기(`Saver`)가 `(symbol, timestamp)` 키로
//! upsert하는 단위 레코드입니다.

use crate::types::Interval;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV 바 한 개.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    /// 종목 코드 (저장 형식, 예: "7203.T")
    pub symbol: String,
    /// 시간축
    pub interval: Interval,
    /// 바 시작 시각
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: i64,
}

impl OhlcvBar {
    /// 새 바를 생성합니다.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 일봉 이상 테이블의 date 키.
    pub fn trade_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// 바 범위(고가 - 저가)를 반환합니다.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// 가격 데이터 정합성을 검사합니다.
    ///
    /// 음수 가격, 음수 거래량, `high < low`를 거부합니다.
    pub fn validate(&self) -> Result<(), String> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| p.is_sign_negative()) {
            return Err(format!("negative price at {}", self.timestamp));
        }
        if self.high < self.low {
            return Err(format!(
                "high < low at {} ({} < {})",
                self.timestamp, self.high, self.low
            ));
        }
        if self.volume < 0 {
            return Err(format!("negative volume at {}", self.timestamp));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn bar(high: Decimal, low: Decimal) -> OhlcvBar {
        OhlcvBar::new(
            "7203.T",
            Interval::D1,
            Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap(),
            dec!(2500),
            high,
            low,
            dec!(2520),
            1_000_000,
        )
    }

    #[test]
    fn test_valid_bar() {
        let b = bar(dec!(2550), dec!(2480));
        assert!(b.validate().is_ok());
        assert_eq!(b.range(), dec!(70));
        assert_eq!(b.trade_date(), NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let b = bar(dec!(2400), dec!(2480));
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut b = bar(dec!(2550), dec!(2480));
        b.close = dec!(-1);
        assert!(b.validate().is_err());
    }
}
