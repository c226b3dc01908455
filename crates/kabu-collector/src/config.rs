//! 설정 로드.
//!
//! `.env` → 설정 파일(`KABU_CONFIG`, 기본 `config/default.toml`) → `KABU__*` 환경 변수 순으로
//! 적용하며, `database.url`이 비어 있으면 `DATABASE_URL`을 사용합니다.

use crate::error::{CollectorError, Result};
use kabu_core::AppConfig;
use std::path::PathBuf;

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 실제로 읽은 설정 파일 경로 (없어도 됨)
    pub config_path: PathBuf,
    /// 애플리케이션 설정
    pub app: AppConfig,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env(config_path: Option<PathBuf>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = config_path
            .or_else(|| std::env::var("KABU_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut app =
            AppConfig::load(&config_path).map_err(|e| CollectorError::Config(e.to_string()))?;

        if app.database.url.is_none() {
            app.database.url = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty());
        }

        Ok(Self { config_path, app })
    }

    /// 영속 저장소를 사용할 수 있는지.
    pub fn has_database(&self) -> bool {
        self.app.database.url.is_some()
    }
}

/// `--symbols a,b,c` 인자를 종목 목록으로 분해합니다.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbols() {
        assert_eq!(
            parse_symbols("7203, 6758,,9984.T "),
            vec!["7203", "6758", "9984.T"]
        );
        assert!(parse_symbols(" , ").is_empty());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CollectorConfig::from_env(Some(dir.path().join("none.toml"))).unwrap();
        assert_eq!(config.app.engine.max_workers, 4);
        assert_eq!(config.app.bulk.retry_count, 3);
    }
}
