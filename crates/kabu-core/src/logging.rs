//! 수집기 프로세스의 tracing 구독자 구성.
//!
//! 워커가 OS 스레드로 동작하므로 스레드 이름/ID를 기본으로 기록하고,
//! 배치 단위 span(`batch_span!`)으로 실행 ID와 종목을 이벤트에 붙입니다.
//! 출력 형식은 `pretty`(개발), `json`(로그 수집), `compact` 중 하나입니다.

use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::{
    filter::ParseError,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// 색상 포함 여러 줄 형식
    #[default]
    Pretty,
    /// 이벤트당 JSON 한 줄
    Json,
    /// 간결한 한 줄 형식
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!("Unknown log format: {}", other)),
        }
    }
}

/// 로깅 초기화 에러.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// 레벨 필터 문자열 해석 실패
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    /// 전역 구독자가 이미 설정됨
    #[error("subscriber already installed: {0}")]
    Init(#[from] TryInitError),
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 필터 지시어 (예: "info", "kabu_batch=debug")
    pub level: String,
    pub format: LogFormat,
    /// span 생성/종료 이벤트 기록 여부
    pub with_span_events: bool,
    /// 파일명과 줄 번호 기록 여부
    pub with_file: bool,
    /// 스레드 ID/이름 기록 여부
    pub with_thread_ids: bool,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_span_events: false,
            with_file: false,
            with_thread_ids: true,
            with_target: true,
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// 설정 파일의 `[logging]` 섹션에서 생성합니다.
    ///
    /// 알 수 없는 형식 문자열은 `Pretty`로 대체합니다.
    pub fn from_settings(settings: &crate::config::LoggingConfig) -> Self {
        Self {
            level: settings.level.clone(),
            format: settings.format.parse().unwrap_or_default(),
            ..Default::default()
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.with_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// 설정된 형식의 출력 레이어.
fn output_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_file(config.with_file)
        .with_line_number(config.with_file)
        .with_thread_ids(config.with_thread_ids)
        .with_thread_names(config.with_thread_ids)
        .with_target(config.with_target)
        .with_span_events(config.span_events());

    match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

/// 전역 tracing 구독자를 설치합니다.
///
/// `RUST_LOG`가 설정되어 있으면 `config.level`보다 우선합니다.
///
/// ```no_run
/// use kabu_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("kabu_batch=debug").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output_layer(&config))
        .try_init()?;

    tracing::info!(format = ?config.format, level = %config.level, "로깅 초기화");
    Ok(())
}

/// 배치 컨텍스트 필드가 포함된 span을 생성하는 매크로.
#[macro_export]
macro_rules! batch_span {
    ($name:expr, $execution_id:expr) => {
        tracing::info_span!($name, execution_id = %$execution_id)
    };
    ($name:expr, $execution_id:expr, $symbol:expr) => {
        tracing::info_span!($name, execution_id = %$execution_id, symbol = %$symbol)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("syslog".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new("debug")
            .with_format(LogFormat::Json)
            .with_span_events(true)
            .with_thread_ids(false);

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.span_events(), FmtSpan::NEW | FmtSpan::CLOSE);
        assert!(!config.with_thread_ids);
        assert_eq!(LogConfig::default().span_events(), FmtSpan::NONE);
    }

    #[test]
    fn test_log_config_from_settings() {
        let settings = crate::config::LoggingConfig {
            level: "kabu_batch=debug".to_string(),
            format: "bogus".to_string(),
        };
        let config = LogConfig::from_settings(&settings);
        assert_eq!(config.level, "kabu_batch=debug");
        assert_eq!(config.format, LogFormat::Pretty);
    }
}
