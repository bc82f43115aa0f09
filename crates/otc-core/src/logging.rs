//! tracing 기반 로깅 초기화.
//!
//! 출력 형식:
//! - **pretty**: 개발용 사람이 읽기 쉬운 형식
//! - **json**: 로그 수집기용 JSON 한 줄 형식
//! - **compact**: 간결한 한 줄 형식
//!
//! 레벨은 `RUST_LOG`가 있으면 그것을, 없으면 설정 파일의 `[logging]` 섹션을 따릅니다.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::Registry,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로그 출력 대상.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogTarget {
    #[default]
    Stdout,
    /// CLI처럼 표준 출력이 결과 전용일 때
    Stderr,
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 로그 레벨 필터 (예: "info", "otc_data=debug")
    pub level: String,
    pub format: LogFormat,
    pub target: LogTarget,
    /// span 종료 이벤트 포함 여부 (요청 소요 시간 확인용)
    pub with_span_events: bool,
    /// 파일명과 줄 번호 포함 여부
    pub with_file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            target: LogTarget::Stdout,
            with_span_events: false,
            with_file: false,
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

    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    /// 설정 파일의 `[logging]` 섹션에서 생성합니다.
    ///
    /// `LOG_FORMAT` 환경 변수가 있으면 형식을 덮어씁니다.
    /// 알 수 없는 형식 문자열은 pretty로 처리합니다.
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        let format = std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .or_else(|| settings.format.parse().ok())
            .unwrap_or_default();

        Self {
            level: settings.level.clone(),
            format,
            ..Default::default()
        }
    }
}

/// 주어진 설정으로 전역 subscriber를 설치합니다.
///
/// 이미 설치되어 있으면 에러를 반환합니다.
///
/// ```no_run
/// use otc_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("debug").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    tracing_subscriber::registry()
        .with(build_fmt_layer(&config))
        .with(env_filter)
        .try_init()?;

    tracing::debug!(format = ?config.format, level = %config.level, "Logging initialized");

    Ok(())
}

fn build_fmt_layer(config: &LogConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let span_events = if config.with_span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_file(config.with_file)
        .with_line_number(config.with_file)
        .with_span_events(span_events);

    match (config.format, config.target) {
        (LogFormat::Pretty, LogTarget::Stdout) => base.pretty().boxed(),
        (LogFormat::Pretty, LogTarget::Stderr) => base.pretty().with_writer(std::io::stderr).boxed(),
        (LogFormat::Json, LogTarget::Stdout) => base.json().boxed(),
        (LogFormat::Json, LogTarget::Stderr) => base.json().with_writer(std::io::stderr).boxed(),
        (LogFormat::Compact, LogTarget::Stdout) => base.compact().boxed(),
        (LogFormat::Compact, LogTarget::Stderr) => {
            base.compact().with_writer(std::io::stderr).boxed()
        }
    }
}

/// 캔들 조회 컨텍스트 필드가 포함된 span을 생성하는 매크로.
#[macro_export]
macro_rules! fetch_span {
    ($name:expr, $source:expr) => {
        tracing::info_span!($name, source = %$source)
    };
    ($name:expr, $source:expr, $query:expr) => {
        tracing::info_span!(
            $name,
            source = %$source,
            symbol = %$query.symbol,
            interval = %$query.interval,
            limit = $query.limit
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" COMPACT ".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_from_settings_falls_back_to_pretty() {
        let settings = LoggingConfig {
            level: "debug".to_string(),
            format: "fancy".to_string(),
        };
        let config = LogConfig::from_settings(&settings);
        assert_eq!(config.level, "debug");
        if std::env::var("LOG_FORMAT").is_err() {
            assert_eq!(config.format, LogFormat::Pretty);
        }
    }

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new("warn")
            .with_format(LogFormat::Compact)
            .with_target(LogTarget::Stderr)
            .with_span_events(true);

        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.target, LogTarget::Stderr);
        assert!(config.with_span_events);
    }
}
