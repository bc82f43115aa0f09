//! W3C WebDriver 클라이언트.
//!
//! chromedriver / geckodriver 등 WebDriver 엔드포인트에 HTTP로 명령을 보냅니다.
//! 선택자, URL, 추출 스크립트는 설정으로 주입됩니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use otc_core::{Interval, Symbol};
use reqwest::{Client, Method};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::session::{BrowserCredentials, BrowserDriver, BrowserSession};
use crate::error::SourceError;
use crate::traits::SourceResult;

/// W3C 요소 참조 키.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// 로그인 완료 확인 간격.
const LOGIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 로그인 완료 확인 최대 횟수.
const LOGIN_POLL_ATTEMPTS: u32 = 20;

/// 페이지 조작 설정.
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub login_url: String,
    /// `{symbol}`, `{interval}` 치환
    pub chart_url_template: String,
    pub email_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
    pub authenticated_selector: String,
    pub extract_script: String,
    pub headless: bool,
}

impl PageSettings {
    pub fn chart_url(&self, symbol: &Symbol, interval: Interval) -> String {
        self.chart_url_template
            .replace("{symbol}", symbol.as_str())
            .replace("{interval}", interval.as_str())
    }
}

/// WebDriver 엔드포인트.
pub struct WebDriverClient {
    base_url: String,
    client: Client,
    settings: Arc<PageSettings>,
}

impl WebDriverClient {
    pub fn new(base_url: impl Into<String>, settings: PageSettings) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SourceError::UpstreamUnavailable(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            settings: Arc::new(settings),
        })
    }

    fn capabilities(&self) -> Value {
        let mut args = vec!["--disable-gpu", "--window-size=1366,900", "--no-sandbox"];
        if self.settings.headless {
            args.push("--headless=new");
        }
        let mut firefox_args = Vec::new();
        if self.settings.headless {
            firefox_args.push("-headless");
        }

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": { "args": args },
                    "moz:firefoxOptions": { "args": firefox_args }
                }
            }
        })
    }
}

#[async_trait]
impl BrowserDriver for WebDriverClient {
    async fn open_session(&self) -> SourceResult<Box<dyn BrowserSession>> {
        let value = send_command(
            &self.client,
            Method::POST,
            &format!("{}/session", self.base_url),
            Some(self.capabilities()),
        )
        .await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SourceError::bad_response(None, "WebDriver did not return a session id", None)
            })?
            .to_string();

        debug!(session_id = %session_id, "WebDriver session created");

        Ok(Box::new(WebDriverSession {
            session_url: format!("{}/session/{}", self.base_url, session_id),
            client: self.client.clone(),
            settings: self.settings.clone(),
        }))
    }
}

/// 열린 WebDriver 세션.
pub struct WebDriverSession {
    session_url: String,
    client: Client,
    settings: Arc<PageSettings>,
}

impl WebDriverSession {
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> SourceResult<Value> {
        send_command(
            &self.client,
            method,
            &format!("{}{}", self.session_url, path),
            body,
        )
        .await
    }

    async fn navigate(&self, url: &str) -> SourceResult<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn find_element(&self, selector: &str) -> SourceResult<String> {
        let value = self
            .command(
                Method::POST,
                "/element",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SourceError::bad_response(None, "WebDriver returned no element reference", None))
    }

    async fn count_elements(&self, selector: &str) -> SourceResult<usize> {
        let value = self
            .command(
                Method::POST,
                "/elements",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        Ok(value.as_array().map(Vec::len).unwrap_or(0))
    }

    async fn type_into(&self, selector: &str, text: &str) -> SourceResult<()> {
        let element = self.find_element(selector).await?;
        self.command(
            Method::POST,
            &format!("/element/{}/clear", element),
            Some(json!({})),
        )
        .await?;
        self.command(
            Method::POST,
            &format!("/element/{}/value", element),
            Some(json!({ "text": text })),
        )
        .await
        .map(|_| ())
    }

    async fn click(&self, selector: &str) -> SourceResult<()> {
        let element = self.find_element(selector).await?;
        self.command(
            Method::POST,
            &format!("/element/{}/click", element),
            Some(json!({})),
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn is_authenticated(&mut self) -> SourceResult<bool> {
        Ok(self
            .count_elements(&self.settings.authenticated_selector)
            .await?
            > 0)
    }

    async fn authenticate(&mut self, credentials: &BrowserCredentials) -> SourceResult<()> {
        self.navigate(&self.settings.login_url).await?;
        self.type_into(&self.settings.email_selector, &credentials.email)
            .await?;
        self.type_into(
            &self.settings.password_selector,
            credentials.password.expose_secret(),
        )
        .await?;
        self.click(&self.settings.submit_selector).await?;

        for _ in 0..LOGIN_POLL_ATTEMPTS {
            if self.is_authenticated().await? {
                debug!("Browser login completed");
                return Ok(());
            }
            tokio::time::sleep(LOGIN_POLL_INTERVAL).await;
        }

        Err(SourceError::AuthenticationFailed(
            "login did not reach an authenticated page".to_string(),
        ))
    }

    async fn open_chart(&mut self, symbol: &Symbol, interval: Interval) -> SourceResult<()> {
        let url = self.settings.chart_url(symbol, interval);
        self.navigate(&url).await
    }

    async fn extract_candles(&mut self, limit: usize) -> SourceResult<Vec<Value>> {
        let value = self
            .command(
                Method::POST,
                "/execute/sync",
                Some(json!({ "script": self.settings.extract_script, "args": [limit] })),
            )
            .await?;

        match value {
            Value::Array(records) => Ok(records),
            Value::Null => Ok(Vec::new()),
            _ => Err(SourceError::bad_response(
                None,
                "extraction script did not return an array",
                None,
            )),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.command(Method::DELETE, "", None).await {
            warn!(error = %e, "Failed to delete WebDriver session");
        }
    }
}

/// WebDriver 명령을 보내고 응답의 `value`를 반환합니다.
///
/// 에러 응답은 W3C 에러 코드만 남기고 스택 트레이스는 버립니다.
async fn send_command(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> SourceResult<Value> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    let payload: Value = serde_json::from_str(&text).map_err(|_| {
        SourceError::bad_response(Some(status.as_u16()), "WebDriver returned non-JSON", None)
    })?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let code = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();

    match code.as_str() {
        "invalid session id" | "session not created" => Err(SourceError::UpstreamUnavailable(
            format!("WebDriver session lost: {}", code),
        )),
        "timeout" | "script timeout" => Err(SourceError::Timeout(format!("WebDriver {}", code))),
        _ => Err(SourceError::bad_response(
            Some(status.as_u16()),
            format!("WebDriver command failed: {}", code),
            None,
        )),
    }
}
