//! 설정 관리.
//!
//! 설정은 다음 순서로 병합됩니다 (뒤가 우선):
//! 1. 코드 기본값 (및 구버전 환경 변수 `PO_SVC_TOKEN`, `PO_UPSTREAM_URL`)
//! 2. TOML 설정 파일 (`OTC_CONFIG` 또는 `config/default.toml`)
//! 3. `OTC_` 접두사 환경 변수 (예: `OTC_SOURCE__KIND=proxy`)
//!
//! 토큰, API 키, 비밀번호는 `SecretString`으로 보관되며 로그에 출력되지 않습니다.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::str::FromStr;

use crate::domain::CandleFieldStyle;
use crate::types::{Interval, IntervalPolicy, LimitPolicy, SymbolPolicy};

/// 설정 파일 경로 환경 변수.
pub const CONFIG_PATH_ENV: &str = "OTC_CONFIG";

/// 기본 설정 파일 (확장자 제외).
const DEFAULT_CONFIG_FILE: &str = "config/default";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 접근 토큰 설정
    pub auth: AuthConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 심볼 허용 목록
    pub symbols: SymbolsConfig,
    /// 캔들 요청 기본값
    pub candles: CandlesConfig,
    /// 결과 캐시 설정
    pub cache: CacheConfig,
    /// 캔들 소스 설정
    pub source: SourceConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// HTTP 요청 전체 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// CORS 허용 Origin (비어 있으면 모두 허용)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 90,
            cors_origins: Vec::new(),
        }
    }
}

/// 접근 토큰 설정.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// 서비스 토큰. 없으면 보호된 엔드포인트는 500을 반환합니다.
    #[serde(deserialize_with = "deserialize_secret")]
    pub token: Option<SecretString>,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
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

/// 심볼 설정.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SymbolsConfig {
    /// 허용 심볼 목록 (비어 있으면 `XXXYYY_OTC` 형식 규칙 적용)
    pub allow_list: Vec<String>,
}

impl SymbolsConfig {
    pub fn policy(&self) -> SymbolPolicy {
        if self.allow_list.is_empty() {
            SymbolPolicy::pattern_only()
        } else {
            SymbolPolicy::with_allow_list(&self.allow_list)
        }
    }
}

/// 캔들 요청 기본값.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CandlesConfig {
    /// 간격 미지정 시 기본 간격
    pub default_interval: Interval,
    /// 인식할 수 없는 간격 대체값 (기본: 사용 안 함)
    pub interval_fallback: Option<Interval>,
    /// 개수 미지정 시 기본 개수
    pub default_limit: usize,
    /// 최대 개수 (초과 요청은 잘림)
    pub max_limit: usize,
    /// 응답 필드 이름 형태
    pub field_style: CandleFieldStyle,
}

impl Default for CandlesConfig {
    fn default() -> Self {
        let limits = LimitPolicy::default();
        Self {
            default_interval: Interval::M1,
            interval_fallback: None,
            default_limit: limits.default,
            max_limit: limits.max,
            field_style: CandleFieldStyle::Verbose,
        }
    }
}

impl CandlesConfig {
    pub fn interval_policy(&self) -> IntervalPolicy {
        IntervalPolicy {
            default: self.default_interval,
            fallback: self.interval_fallback,
        }
    }

    pub fn limit_policy(&self) -> LimitPolicy {
        LimitPolicy::new(self.default_limit, self.max_limit)
    }
}

/// 결과 캐시 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 캐시 TTL (밀리초)
    pub ttl_ms: u64,
    /// 만료 항목 일괄 정리 주기 (초, 0이면 비활성)
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 2_000,
            sweep_interval_secs: 30,
        }
    }
}

/// 캔들 소스 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// 결정적 모의 데이터
    #[default]
    Mock,
    /// 외부 캔들 서비스 위임
    Proxy,
    /// 금융 시계열 API
    TimeSeries,
    /// 브라우저 자동화
    Browser,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Mock => "mock",
            SourceKind::Proxy => "proxy",
            SourceKind::TimeSeries => "time_series",
            SourceKind::Browser => "browser",
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "mock" => Ok(SourceKind::Mock),
            "proxy" | "upstream" => Ok(SourceKind::Proxy),
            "time_series" | "timeseries" | "api" => Ok(SourceKind::TimeSeries),
            "browser" | "scraper" => Ok(SourceKind::Browser),
            other => Err(format!("Invalid source kind: {}", other)),
        }
    }
}

/// 캔들 소스 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// 사용할 소스
    pub kind: SourceKind,
    /// 시도별 타임아웃 (초, 미지정 시 소스 기본값)
    pub attempt_timeout_secs: Option<u64>,
    /// 전체 타임아웃 (초, 미지정 시 소스 기본값)
    pub overall_timeout_secs: Option<u64>,
    /// 최대 시도 횟수 (1이면 재시도 없음)
    pub max_attempts: u32,
    /// 재시도 간 대기 (밀리초)
    pub retry_backoff_ms: u64,
    pub proxy: ProxySourceConfig,
    pub time_series: TimeSeriesSourceConfig,
    pub browser: BrowserSourceConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Mock,
            attempt_timeout_secs: None,
            overall_timeout_secs: None,
            max_attempts: 3,
            retry_backoff_ms: 500,
            proxy: ProxySourceConfig::default(),
            time_series: TimeSeriesSourceConfig::default(),
            browser: BrowserSourceConfig::default(),
        }
    }
}

/// 외부 캔들 서비스 설정.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProxySourceConfig {
    /// `{base_url}/candles`를 호출합니다
    pub base_url: Option<String>,
}

/// 시계열 API 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeSeriesSourceConfig {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    /// `limit`에 더해 요청할 여유 개수
    pub output_margin: usize,
}

impl Default for TimeSeriesSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twelvedata.com".to_string(),
            api_key: None,
            output_margin: 10,
        }
    }
}

/// 브라우저 자동화 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSourceConfig {
    /// WebDriver 엔드포인트 (예: `http://localhost:9515`)
    pub webdriver_url: Option<String>,
    /// 로그인 페이지
    pub login_url: String,
    /// 차트 페이지 템플릿 (`{symbol}`, `{interval}` 치환)
    pub chart_url_template: String,
    pub email: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    pub headless: bool,
    pub selectors: BrowserSelectors,
    /// 페이지에서 캔들 배열을 반환하는 스크립트 (`arguments[0]` = limit)
    pub extract_script: String,
    /// 단계별 타임아웃 (초)
    pub phase_timeout_secs: u64,
}

impl Default for BrowserSourceConfig {
    fn default() -> Self {
        Self {
            webdriver_url: None,
            login_url: "https://pocketoption.com/en/login/".to_string(),
            chart_url_template: "https://pocketoption.com/en/cabinet/demo-quick-high-low/?symbol={symbol}&interval={interval}".to_string(),
            email: None,
            password: None,
            headless: true,
            selectors: BrowserSelectors::default(),
            extract_script: DEFAULT_EXTRACT_SCRIPT.to_string(),
            phase_timeout_secs: 20,
        }
    }
}

/// 로그인 폼 CSS 선택자.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSelectors {
    pub email_input: String,
    pub password_input: String,
    pub submit_button: String,
    /// 로그인 상태에서만 존재하는 요소
    pub authenticated_marker: String,
}

impl Default for BrowserSelectors {
    fn default() -> Self {
        Self {
            email_input: "input[name='email']".to_string(),
            password_input: "input[name='password']".to_string(),
            submit_button: "button[type='submit']".to_string(),
            authenticated_marker: ".user-avatar, .js-balance".to_string(),
        }
    }
}

/// 기본 추출 스크립트.
///
/// 페이지의 차트 객체에서 캔들 배열을 읽습니다. 실제 사이트 구조에 맞게
/// `source.browser.extract_script`로 교체해야 합니다.
const DEFAULT_EXTRACT_SCRIPT: &str = r#"
const limit = arguments[0];
const store = window.__otcCandles || (window.chart && window.chart.candles) || [];
return Array.from(store).slice(-limit);
"#;

/// 비어 있지 않은 문자열을 `SecretString`으로 역직렬화합니다.
fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .filter(|s| !s.trim().is_empty())
        .map(|s| SecretString::new(s.into())))
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// `path`가 없으면 `config/default.toml`을 선택적으로 읽습니다.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let builder = Self::base_builder()?;
        let builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        Self::finish(builder)
    }

    /// `OTC_CONFIG` 환경 변수 또는 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(Some(Path::new(path.trim()))),
            _ => Self::load(None),
        }
    }

    fn base_builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?;

        // 구버전 배포의 환경 변수는 가장 낮은 우선순위로 반영
        if let Ok(token) = std::env::var("PO_SVC_TOKEN") {
            builder = builder.set_default("auth.token", token)?;
        }
        if let Ok(url) = std::env::var("PO_UPSTREAM_URL") {
            builder = builder.set_default("source.proxy.base_url", url)?;
        }
        Ok(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config = builder
            .add_source(
                config::Environment::with_prefix("OTC")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("symbols.allow_list")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?;

        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// 설정 값 범위를 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candles.max_limit == 0 {
            return Err(ConfigError::Message(
                "candles.max_limit must be at least 1".to_string(),
            ));
        }
        if self.cache.ttl_ms == 0 {
            return Err(ConfigError::Message(
                "cache.ttl_ms must be positive".to_string(),
            ));
        }
        if self.source.max_attempts == 0 {
            return Err(ConfigError::Message(
                "source.max_attempts must be at least 1".to_string(),
            ));
        }
        if let (Some(attempt), Some(overall)) = (
            self.source.attempt_timeout_secs,
            self.source.overall_timeout_secs,
        ) {
            if attempt == 0 || overall < attempt {
                return Err(ConfigError::Message(
                    "source timeouts must satisfy 0 < attempt_timeout_secs <= overall_timeout_secs"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }

    /// 바인딩 주소 문자열.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    #[cfg(test)]
    fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let builder = Self::base_builder()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml));
        Self::finish(builder)
    }
}
