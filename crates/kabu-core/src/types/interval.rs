//! 주가 데이터 시간축(interval) 정의.
//!
//! Yahoo Finance의 interval 표기(`1m`, `1h`, `1d`, `1wk`, `1mo` 등)와
//! 저장 테이블 매핑, 권장 조회 기간을 제공합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 주가 데이터 시간축.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    /// 1분봉
    #[serde(rename = "1m")]
    M1,
    /// 5분봉
    #[serde(rename = "5m")]
    M5,
    /// 15분봉
    #[serde(rename = "15m")]
    M15,
    /// 30분봉
    #[serde(rename = "30m")]
    M30,
    /// 1시간봉
    #[serde(rename = "1h")]
    H1,
    /// 일봉
    #[serde(rename = "1d")]
    D1,
    /// 주봉
    #[serde(rename = "1wk")]
    W1,
    /// 월봉
    #[serde(rename = "1mo")]
    MN1,
}

impl Interval {
    /// 지원하는 모든 시간축 (데이터량이 많은 순).
    pub const ALL: [Interval; 8] = [
        Interval::M1,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::D1,
        Interval::W1,
        Interval::MN1,
    ];

    /// Yahoo Finance interval 문자열로 변환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::D1 => "1d",
            Interval::W1 => "1wk",
            Interval::MN1 => "1mo",
        }
    }

    /// 이 시간축 한 개 바의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Interval::M1 => Duration::from_secs(60),
            Interval::M5 => Duration::from_secs(5 * 60),
            Interval::M15 => Duration::from_secs(15 * 60),
            Interval::M30 => Duration::from_secs(30 * 60),
            Interval::H1 => Duration::from_secs(60 * 60),
            Interval::D1 => Duration::from_secs(24 * 60 * 60),
            Interval::W1 => Duration::from_secs(7 * 24 * 60 * 60),
            Interval::MN1 => Duration::from_secs(30 * 24 * 60 * 60), // 근사값
        }
    }

    /// 기간 미지정 시 사용하는 권장 조회 기간 (Yahoo `range` 표기).
    ///
    /// 분봉은 Yahoo 측 보존 기간 제한 때문에 짧게 잡습니다.
    pub fn recommended_period(&self) -> &'static str {
        match self {
            Interval::M1 => "7d",
            Interval::M5 | Interval::M15 | Interval::M30 => "60d",
            Interval::H1 => "730d",
            Interval::D1 | Interval::W1 | Interval::MN1 => "max",
        }
    }

    /// 일중(분봉/시간봉) 시간축인지 확인합니다.
    ///
    /// 일중 데이터는 timestamp, 일봉 이상은 date 컬럼에 저장됩니다.
    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Interval::M1 | Interval::M5 | Interval::M15 | Interval::M30 | Interval::H1
        )
    }

    /// 저장 테이블 이름 (`stocks_1d` 등).
    pub fn table_name(&self) -> &'static str {
        match self {
            Interval::M1 => "stocks_1m",
            Interval::M5 => "stocks_5m",
            Interval::M15 => "stocks_15m",
            Interval::M30 => "stocks_30m",
            Interval::H1 => "stocks_1h",
            Interval::D1 => "stocks_1d",
            Interval::W1 => "stocks_1wk",
            Interval::MN1 => "stocks_1mo",
        }
    }

    /// 표시용 이름.
    pub fn display_name(&self) -> &'static str {
        match self {
            Interval::M1 => "1分足",
            Interval::M5 => "5分足",
            Interval::M15 => "15分足",
            Interval::M30 => "30分足",
            Interval::H1 => "1時間足",
            Interval::D1 => "日足",
            Interval::W1 => "週足",
            Interval::MN1 => "月足",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::M1),
            "5m" => Ok(Interval::M5),
            "15m" => Ok(Interval::M15),
            "30m" => Ok(Interval::M30),
            "1h" | "60m" => Ok(Interval::H1),
            "1d" => Ok(Interval::D1),
            "1wk" => Ok(Interval::W1),
            "1mo" => Ok(Interval::MN1),
            _ => Err(format!("Unsupported interval: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_roundtrip_notation() {
        for interval in Interval::ALL {
            assert_eq!(interval.as_str().parse::<Interval>().unwrap(), interval);
        }
        assert_eq!("60m".parse::<Interval>().unwrap(), Interval::H1);
        assert!("2h".parse::<Interval>().is_err());
    }

    #[test]
    fn test_recommended_period() {
        assert_eq!(Interval::M1.recommended_period(), "7d");
        assert_eq!(Interval::M15.recommended_period(), "60d");
        assert_eq!(Interval::H1.recommended_period(), "730d");
        assert_eq!(Interval::D1.recommended_period(), "max");
    }

    #[test]
    fn test_intraday_and_table() {
        assert!(Interval::H1.is_intraday());
        assert!(!Interval::D1.is_intraday());
        assert_eq!(Interval::W1.table_name(), "stocks_1wk");
        assert_eq!(Interval::D1.duration().as_secs(), 86400);
    }

    #[test]
    fn test_interval_serde() {
        let json = serde_json::to_string(&Interval::MN1).unwrap();
        assert_eq!(json, "\"1mo\"");
        let parsed: Interval = serde_json::from_str("\"5m\"").unwrap();
        assert_eq!(parsed, Interval::M5);
    }
}
