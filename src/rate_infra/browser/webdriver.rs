//! W3C WebDriver backend (chromedriver, geckodriver, selenium).
//!
//! Each launched session is a fresh headless browser process owned by the
//! WebDriver server; `close` deletes it.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use crate::error::{Error, Result};
use crate::rate_infra::browser::{PageDriver, PageSession};

const SELECTOR_PROBE: &str = "return document.querySelector(arguments[0]) !== null;";
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct WebDriverClient {
    client: Client,
    base_url: String,
    user_agent: String,
    poll_interval: Duration,
}

impl WebDriverClient {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>, poll_interval: Duration) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::BrowserLaunch(format!("Failed to create WebDriver client: {}", e)))?;

        Ok(WebDriverClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
            poll_interval,
        })
    }

    fn capabilities(&self) -> Value {
        let args = vec![
            "--headless=new".to_string(),
            "--no-sandbox".to_string(),
            "--disable-setuid-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--lang=zh-TW".to_string(),
            format!("--user-agent={}", self.user_agent),
        ];

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args },
                    "moz:firefoxOptions": { "args": ["-headless"] }
                }
            }
        })
    }
}

#[async_trait]
impl PageDriver for WebDriverClient {
    async fn launch(&self) -> Result<Box<dyn PageSession>> {
        let url = format!("{}/session", self.base_url);
        let value = send_command(&self.client, Method::POST, &url, Some(self.capabilities()), COMMAND_TIMEOUT)
            .await
            .map_err(|e| Error::BrowserLaunch(e.to_string()))?;

        let session_id = value.get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::BrowserLaunch("response carried no sessionId".to_string()))?
            .to_string();

        tracing::debug!(session_id = %session_id, "WebDriver session started");

        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            session_url: format!("{}/session/{}", self.base_url, session_id),
            poll_interval: self.poll_interval,
            open: true,
        }))
    }
}

pub struct WebDriverSession {
    client: Client,
    session_url: String,
    poll_interval: Duration,
    open: bool,
}

impl WebDriverSession {
    async fn command(&self, method: Method, path: &str, body: Option<Value>, timeout: Duration) -> Result<Value> {
        let url = format!("{}/{}", self.session_url, path);
        send_command(&self.client, method, &url, body, timeout).await
    }
}

#[async_trait]
impl PageSession for WebDriverSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let page_load_ms = timeout.as_millis() as u64;
        self.command(Method::POST, "timeouts", Some(json!({ "pageLoad": page_load_ms })), COMMAND_TIMEOUT)
            .await?;

        // Leave the HTTP call some slack beyond the browser's own page load limit.
        self.command(Method::POST, "url", Some(json!({ "url": url })), timeout + Duration::from_secs(5))
            .await
            .map_err(|e| Error::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            let attached = self.evaluate(SELECTOR_PROBE, vec![json!(selector)]).await?;
            if attached.as_bool() == Some(true) {
                return Ok(());
            }
            if Instant::now() + self.poll_interval > deadline {
                return Err(Error::SelectorTimeout {
                    selector: selector.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn evaluate(&mut self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.command(
            Method::POST,
            "execute/sync",
            Some(json!({ "script": script, "args": args })),
            COMMAND_TIMEOUT,
        )
        .await
        .map_err(|e| match e {
            Error::WebDriver(msg) => Error::Evaluation(msg),
            other => other,
        })
    }

    async fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        send_command(&self.client, Method::DELETE, &self.session_url, None, COMMAND_TIMEOUT).await?;
        tracing::debug!(session = %self.session_url, "WebDriver session closed");
        Ok(())
    }
}

/// Send one WebDriver command and unwrap the `value` member of the reply.
async fn send_command(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
    timeout: Duration,
) -> Result<Value> {
    let mut request = client.request(method, url).timeout(timeout);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let payload: Value = response.json().await?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let kind = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
        let message = value.get("message").and_then(Value::as_str).unwrap_or_default();
        return Err(Error::WebDriver(format!("{} ({}): {}", kind, status.as_u16(), message)));
    }

    Ok(value)
}
