//! 설정 관리.
//!
//! 엔진, 일괄 수집, 재시도 정책, 데이터베이스, 로깅 설정을 정의합니다.
//! 모든 섹션은 기본값을 가지므로 설정 파일은 바꾸고 싶은 값만 적으면 됩니다.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 환경 변수 오버라이드 접두사 (`KABU__ENGINE__MAX_WORKERS=8`).
pub const ENV_PREFIX: &str = "KABU";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 배치 엔진 설정
    #[serde(default)]
    pub engine: EngineConfig,
    /// 단순 일괄 수집 설정
    #[serde(default)]
    pub bulk: BulkConfig,
    /// 재시도 정책
    #[serde(default)]
    pub retry: RetryConfig,
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 배치 엔진 설정.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 워커 스레드 수
    pub max_workers: usize,
    /// 작업 큐 용량
    pub queue_size: usize,
    /// 워커가 큐를 기다리는 최대 시간 (밀리초)
    pub poll_interval_ms: u64,
    /// 워커 내부 예외 후 대기 시간 (밀리초)
    pub error_cooldown_ms: u64,
    /// 종료 시 워커 join 대기 시간 (밀리초)
    pub stop_timeout_ms: u64,
    /// 종료된 실행 기록을 메모리에 유지하는 시간 (초)
    pub execution_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            queue_size: 1000,
            poll_interval_ms: 100,
            error_cooldown_ms: 1000,
            stop_timeout_ms: 5000,
            execution_ttl_secs: 3600,
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_millis(self.error_cooldown_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn execution_ttl(&self) -> Duration {
        Duration::from_secs(self.execution_ttl_secs)
    }
}

/// 단순 일괄 수집 설정.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BulkConfig {
    /// 호출당 스레드 풀 크기
    pub max_workers: usize,
    /// 종목당 최대 시도 횟수
    pub retry_count: u32,
    /// 첫 재시도 대기 시간 (밀리초). n번째 시도 후 `base * 2^(n-1)` 대기
    pub retry_base_delay_ms: u64,
    /// 소요 시간 추정에 쓰는 샘플 종목
    pub sample_symbol: String,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            retry_count: 3,
            retry_base_delay_ms: 1000,
            sample_symbol: "7203.T".to_string(),
        }
    }
}

impl BulkConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// 재시도 정책 설정.
///
/// n번째 재시도 대기 시간은 `base_delay_ms * backoff_multiplier^(n-1)`입니다.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 최대 재시도 횟수
    pub max_retries: u32,
    /// 첫 재시도 대기 시간 (밀리초)
    pub base_delay_ms: u64,
    /// 지수 백오프 배수
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 접속 URL. 없으면 메모리 저장소로 동작합니다.
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
            connect_timeout_secs: 10,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    /// 값 범위를 검사합니다.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.engine.max_workers == 0 {
            return Err(config::ConfigError::Message(
                "engine.max_workers must be at least 1".to_string(),
            ));
        }
        if self.engine.queue_size == 0 {
            return Err(config::ConfigError::Message(
                "engine.queue_size must be at least 1".to_string(),
            ));
        }
        if self.bulk.max_workers == 0 || self.bulk.retry_count == 0 {
            return Err(config::ConfigError::Message(
                "bulk.max_workers and bulk.retry_count must be at least 1".to_string(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(config::ConfigError::Message(
                "retry.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }
        Ok(())
    }
}
