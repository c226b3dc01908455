//! 주가 데이터 수집기.
//!
//! `Fetcher`는 한 종목의 OHLCV 바를 가져오는 동기 인터페이스입니다.
//! 실패는 항상 분류 태그가 붙은 `FetchError`로 반환됩니다.

use chrono::{TimeZone, Utc};
use kabu_core::{format_for_yahoo, FetchError, FetchResult, Interval, OhlcvBar};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};
use yahoo_finance_api::YahooError;

/// OHLCV 데이터 수집 인터페이스.
pub trait Fetcher: Send + Sync {
    /// 종목의 OHLCV 바를 시간순으로 반환합니다.
    ///
    /// `period`가 없으면 시간축별 권장 기간을 사용합니다.
    fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        period: Option<&str>,
    ) -> FetchResult<Vec<OhlcvBar>>;
}

/// 기본 요청 타임아웃.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Yahoo Finance 수집기.
///
/// `yahoo_finance_api`는 async이므로 보관한 런타임 핸들로 `block_on`합니다.
/// 런타임 워커 스레드 안에서 호출하면 패닉하므로 OS 스레드에서만 사용해야 합니다.
pub struct YahooFetcher {
    connector: yahoo_finance_api::YahooConnector,
    runtime: Handle,
    timeout: Duration,
}

impl YahooFetcher {
    /// 새 수집기를 생성합니다.
    pub fn new(runtime: Handle) -> FetchResult<Self> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| FetchError::Unavailable(format!("Yahoo Finance 연결 실패: {}", e)))?;
        Ok(Self {
            connector,
            runtime,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// 요청 타임아웃을 설정합니다.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch_async(
        &self,
        yahoo_symbol: &str,
        interval: Interval,
        period: &str,
    ) -> FetchResult<Vec<OhlcvBar>> {
        let response = self
            .connector
            .get_quote_range(yahoo_symbol, interval.as_str(), period)
            .await
            .map_err(|e| map_yahoo_error(yahoo_symbol, e))?;

        let quotes = response
            .quotes()
            .map_err(|e| map_yahoo_error(yahoo_symbol, e))?;

        if quotes.is_empty() {
            return Err(FetchError::NoData(format!(
                "{} ({}, {})",
                yahoo_symbol, interval, period
            )));
        }

        let total = quotes.len();
        let bars: Vec<OhlcvBar> = quotes
            .iter()
            .filter_map(|q| {
                bar_from_quote(
                    yahoo_symbol,
                    interval,
                    q.timestamp as i64,
                    [q.open, q.high, q.low, q.close],
                    q.volume,
                )
            })
            .collect();

        if bars.is_empty() {
            return Err(FetchError::NoData(format!(
                "{}: {} quotes, none convertible",
                yahoo_symbol, total
            )));
        }
        if bars.len() < total {
            debug!(
                symbol = yahoo_symbol,
                dropped = total - bars.len(),
                "변환 불가 quote 제외"
            );
        }

        for bar in &bars {
            bar.validate()
                .map_err(|e| FetchError::InvalidData(format!("{}: {}", yahoo_symbol, e)))?;
        }

        Ok(bars)
    }
}

impl Fetcher for YahooFetcher {
    fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        period: Option<&str>,
    ) -> FetchResult<Vec<OhlcvBar>> {
        if symbol.trim().is_empty() {
            return Err(FetchError::InvalidSymbol("empty symbol".to_string()));
        }

        let yahoo_symbol = format_for_yahoo(symbol);
        let period = period.unwrap_or_else(|| interval.recommended_period());

        debug!(symbol = %yahoo_symbol, interval = %interval, period, "Yahoo Finance 조회");

        let result = self
            .runtime
            .block_on(tokio::time::timeout(
                self.timeout,
                self.fetch_async(&yahoo_symbol, interval, period),
            ))
            .map_err(|_| FetchError::Timeout(format!("{} after {:?}", yahoo_symbol, self.timeout)))
            .and_then(|r| r);

        if let Err(e) = &result {
            warn!(symbol = %yahoo_symbol, error = %e, "수집 실패");
        }
        result
    }
}

/// Yahoo 커넥터 에러를 분류된 `FetchError`로 변환합니다.
///
/// 요청 한도와 연결 장애, 세션(cookie/crumb) 실패는 일시적,
/// 빈 결과와 응답 형식 문제는 영구적으로 분류됩니다.
fn map_yahoo_error(symbol: &str, err: YahooError) -> FetchError {
    let message = format!("{}: {}", symbol, err);
    match err {
        YahooError::TooManyRequests { .. } => FetchError::RateLimited(message),
        YahooError::Unauthorized { .. } => FetchError::Http {
            status: 401,
            message,
        },
        YahooError::FetchFailed(detail) => match status_from_detail(&detail.to_string()) {
            Some(status) => FetchError::Http {
                status,
                message: format!("{}: {}", symbol, detail),
            },
            None => FetchError::Network(format!("{}: {}", symbol, detail)),
        },
        YahooError::ApiError { .. } => FetchError::InvalidSymbol(message),
        YahooError::NoResult { .. } | YahooError::NoQuotes { .. } => FetchError::NoData(message),
        YahooError::DeserializeFailed { .. } | YahooError::DataInconsistency { .. } => {
            FetchError::InvalidData(message)
        }
        YahooError::ConnectionFailed { .. } | YahooError::NoResponse { .. } => {
            FetchError::Network(message)
        }
        YahooError::NoCookies { .. }
        | YahooError::InvalidCookie { .. }
        | YahooError::InvalidCrumb { .. } => FetchError::Unavailable(message),
        #[allow(unreachable_patterns)]
        _ => FetchError::InvalidData(message),
    }
}

/// 실패 상세 문자열 앞머리의 HTTP 상태 코드 ("404 Not Found" 등).
fn status_from_detail(detail: &str) -> Option<u16> {
    let code: String = detail
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match code.parse::<u16>() {
        Ok(status) if code.len() == 3 && (100..600).contains(&status) => Some(status),
        _ => None,
    }
}

/// f64를 Decimal로 변환 후 소수점 4자리로 반올림.
fn round_decimal_from_f64(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(4))
}

/// Yahoo quote 한 건을 바로 변환합니다.
///
/// 가격이 NaN/무한대이거나 시각이 범위를 벗어나면 `None`.
fn bar_from_quote(
    symbol: &str,
    interval: Interval,
    timestamp: i64,
    [open, high, low, close]: [f64; 4],
    volume: u64,
) -> Option<OhlcvBar> {
    let timestamp = Utc.timestamp_opt(timestamp, 0).single()?;
    Some(OhlcvBar::new(
        symbol,
        interval,
        timestamp,
        round_decimal_from_f64(open)?,
        round_decimal_from_f64(high)?,
        round_decimal_from_f64(low)?,
        round_decimal_from_f64(close)?,
        i64::try_from(volume).unwrap_or(i64::MAX),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kabu_core::{Classify, ErrorCategory};
    use rust_decimal_macros::dec;

    #[test]
    fn test_bar_from_quote_rounds_prices() {
        let bar = bar_from_quote(
            "7203.T",
            Interval::D1,
            1_704_326_400,
            [2500.123456, 2550.0, 2480.5, 2520.0],
            1_200_000,
        )
        .unwrap();

        assert_eq!(bar.open, dec!(2500.1235));
        assert_eq!(bar.low, dec!(2480.5));
        assert_eq!(bar.volume, 1_200_000);
        assert_eq!(bar.timestamp.timestamp(), 1_704_326_400);
    }

    #[test]
    fn test_bar_from_quote_rejects_nan() {
        assert!(bar_from_quote(
            "7203.T",
            Interval::D1,
            1_704_326_400,
            [f64::NAN, 1.0, 1.0, 1.0],
            0
        )
        .is_none());
    }

    #[test]
    fn test_status_from_detail() {
        assert_eq!(status_from_detail("404 Not Found"), Some(404));
        assert_eq!(status_from_detail(" 503 Service Unavailable"), Some(503));
        assert_eq!(status_from_detail("connection reset"), None);
        assert_eq!(status_from_detail("12345"), None);
    }

    #[test]
    fn test_yahoo_fetch_failure_keeps_status() {
        let err = map_yahoo_error("7203.T", YahooError::FetchFailed("404 Not Found".to_string()));
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.category(), ErrorCategory::Permanent);

        let err = map_yahoo_error(
            "7203.T",
            YahooError::FetchFailed("503 Service Unavailable".to_string()),
        );
        assert_eq!(err.category(), ErrorCategory::Temporary);
    }

    #[test]
    fn test_yahoo_rate_limit_is_temporary() {
        let err = map_yahoo_error("7203.T", YahooError::TooManyRequests("slow down".to_string()));
        assert!(matches!(err, FetchError::RateLimited(_)));
        assert_eq!(err.category(), ErrorCategory::Temporary);
    }

    #[test]
    fn test_yahoo_empty_and_malformed_are_permanent() {
        let err = map_yahoo_error("0000.T", YahooError::EmptyDataSet);
        assert!(matches!(err, FetchError::NoData(_)));
        assert_eq!(err.category(), ErrorCategory::Permanent);

        let err = map_yahoo_error("7203.T", YahooError::InvalidJson);
        assert!(matches!(err, FetchError::InvalidData(_)));
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }
}
