//! `BrowserDriver` over the W3C WebDriver wire protocol.
//!
//! Talks JSON over HTTP to chromedriver, geckodriver, safaridriver or a
//! Selenium grid. Every command carries its own request timeout, so no call
//! can block longer than the bound it was given.
//!
//! Sessions are created with `unhandledPromptBehavior: ignore`: native dialogs
//! stay open until the harness deals with them. After each page-affecting
//! command the driver checks for an open alert and hands it to the registered
//! dialog handler.

use base64::Engine;
use reqwest::Method;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::backend::{BrowserDriver, BrowserFactory};
use super::types::{
    BrowserError, BrowserResult, ClickOptions, Dialog, DialogAction, DialogHandler, DialogKind,
    Locator, WaitUntil,
};

/// W3C web element identifier key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735a435d0e";

/// Interval between load-state polls
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Resource count must stay unchanged this long to count as network idle
const NETWORK_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Browser engine requested from the WebDriver endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    /// `browserName` capability understood by the matching driver
    pub fn browser_name(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chrome",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "safari",
        }
    }

    pub fn all() -> [BrowserKind; 3] {
        [BrowserKind::Chromium, BrowserKind::Firefox, BrowserKind::Webkit]
    }

    /// Parse `all` or a comma-separated list of engines, keeping first-seen order
    pub fn parse_list(s: &str) -> Result<Vec<BrowserKind>, String> {
        let mut kinds = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let named = if part.eq_ignore_ascii_case("all") {
                BrowserKind::all().to_vec()
            } else {
                vec![part.parse()?]
            };
            for kind in named {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        if kinds.is_empty() {
            return Err("no browser named".to_string());
        }
        Ok(kinds)
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserKind::Chromium => write!(f, "chromium"),
            BrowserKind::Firefox => write!(f, "firefox"),
            BrowserKind::Webkit => write!(f, "webkit"),
        }
    }
}

impl FromStr for BrowserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" | "safari" => Ok(BrowserKind::Webkit),
            other => Err(format!(
                "unknown browser '{}'. Use: chromium, firefox, or webkit",
                other
            )),
        }
    }
}

/// Configuration for a WebDriver connection
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// Base URL of the WebDriver endpoint
    pub endpoint: String,
    pub browser: BrowserKind,
    pub headless: bool,
    /// Upper bound for commands that take no explicit timeout
    pub command_timeout: Duration,
}

impl WebDriverConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            browser: BrowserKind::default(),
            headless: true,
            command_timeout: Duration::from_secs(30),
        }
    }

    pub fn browser(mut self, browser: BrowserKind) -> Self {
        self.browser = browser;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Capabilities for the `alwaysMatch` block of a new session
    pub fn capabilities(&self) -> Value {
        let mut caps = json!({
            "browserName": self.browser.browser_name(),
            "pageLoadStrategy": "eager",
            "unhandledPromptBehavior": "ignore",
        });
        if self.headless {
            match self.browser {
                BrowserKind::Chromium => {
                    caps["goog:chromeOptions"] = json!({ "args": ["--headless=new", "--disable-gpu"] });
                }
                BrowserKind::Firefox => {
                    caps["moz:firefoxOptions"] = json!({ "args": ["-headless"] });
                }
                // safaridriver has no headless mode
                BrowserKind::Webkit => {}
            }
        }
        caps
    }
}

/// A single WebDriver session driving one page
pub struct WebDriverBrowser {
    http: Client,
    session_url: String,
    session_id: String,
    command_timeout: Duration,
    dialog_handler: Option<DialogHandler>,
    closed: bool,
}

impl WebDriverBrowser {
    /// Create a new session on the endpoint
    pub fn connect(config: &WebDriverConfig) -> BrowserResult<Self> {
        let http = Client::builder().build()?;
        let endpoint = config.endpoint.trim_end_matches('/');

        let created = execute(
            &http,
            Method::POST,
            &format!("{}/session", endpoint),
            Some(json!({ "capabilities": { "alwaysMatch": config.capabilities() } })),
            config.command_timeout,
        )?;
        let session_id = created["sessionId"]
            .as_str()
            .ok_or_else(|| BrowserError::Session("response carried no sessionId".into()))?
            .to_string();

        let browser = Self {
            http,
            session_url: format!("{}/session/{}", endpoint, session_id),
            session_id,
            command_timeout: config.command_timeout,
            dialog_handler: None,
            closed: false,
        };
        browser.command(
            Method::POST,
            "/timeouts",
            Some(json!({
                "pageLoad": config.command_timeout.as_millis() as u64,
                "script": config.command_timeout.as_millis() as u64,
                "implicit": 0,
            })),
            None,
        )?;

        debug!(session = %browser.session_id, browser = %config.browser, "WebDriver session created");
        Ok(browser)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Option<Duration>,
    ) -> BrowserResult<Value> {
        if self.closed {
            return Err(BrowserError::Session("session already closed".into()));
        }
        execute(
            &self.http,
            method,
            &format!("{}{}", self.session_url, path),
            body,
            timeout.unwrap_or(self.command_timeout),
        )
    }

    /// Run an idempotent query, servicing a dialog that blocks it and asking once more
    fn query(&mut self, method: Method, path: &str, body: Option<Value>, timeout: Option<Duration>) -> BrowserResult<Value> {
        let deadline = Instant::now() + timeout.unwrap_or(self.command_timeout);
        match self.command(method.clone(), path, body.clone(), timeout) {
            Err(BrowserError::DialogBlocked(_)) => {
                self.poll_dialog(remaining(deadline))?;
                self.command(method, path, body, remaining(deadline))
            }
            other => other,
        }
    }

    fn element_ids(&mut self, selector: &str) -> BrowserResult<Vec<String>> {
        let found = self.query(
            Method::POST,
            "/elements",
            Some(json!({ "using": "css selector", "value": selector })),
            None,
        )?;
        let ids = found
            .as_array()
            .ok_or_else(|| BrowserError::Protocol("find elements did not return a list".into()))?
            .iter()
            .filter_map(|el| el[ELEMENT_KEY].as_str().map(str::to_string))
            .collect();
        Ok(ids)
    }

    fn resolve(&mut self, locator: &Locator) -> BrowserResult<String> {
        self.element_ids(&locator.selector)?
            .into_iter()
            .nth(locator.index.unwrap_or(0))
            .ok_or_else(|| BrowserError::NotFound(locator.to_string()))
    }

    /// Hand an open alert, if any, to the dialog handler
    fn poll_dialog(&mut self, timeout: Option<Duration>) -> BrowserResult<()> {
        let message = match self.command(Method::GET, "/alert/text", None, timeout) {
            Ok(text) => text.as_str().unwrap_or_default().to_string(),
            Err(_) => return Ok(()),
        };
        let dialog = Dialog {
            kind: DialogKind::Alert,
            message,
        };

        let Some(handler) = self.dialog_handler.as_mut() else {
            return Err(BrowserError::DialogBlocked(dialog.message));
        };
        let path = match (*handler)(&dialog) {
            DialogAction::Dismiss => "/alert/dismiss",
            DialogAction::Accept => "/alert/accept",
        };
        self.command(Method::POST, path, Some(json!({})), timeout)?;
        Ok(())
    }

    /// Run a page-affecting command, then service any dialog it raised.
    ///
    /// A command rejected because a dialog is open is never sent again. Once
    /// the handler has dealt with the dialog the action counts as done.
    fn act(&mut self, method: Method, path: &str, body: Option<Value>, timeout: Option<Duration>) -> BrowserResult<Value> {
        let deadline = Instant::now() + timeout.unwrap_or(self.command_timeout);
        match self.command(method, path, body, timeout) {
            Err(BrowserError::DialogBlocked(_)) => {
                self.poll_dialog(remaining(deadline))?;
                Ok(Value::Null)
            }
            Ok(value) => {
                self.poll_dialog(remaining(deadline))?;
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    fn load_progress(&mut self, timeout: Option<Duration>) -> BrowserResult<(String, u64)> {
        let state = self.query(
            Method::POST,
            "/execute/sync",
            Some(json!({
                "script": "return [document.readyState, performance.getEntriesByType('resource').length];",
                "args": [],
            })),
            timeout,
        )?;
        let ready = state[0].as_str().unwrap_or("loading").to_string();
        Ok((ready, state[1].as_u64().unwrap_or(0)))
    }
}

/// Time left before `deadline`, as a per-request bound
fn remaining(deadline: Instant) -> Option<Duration> {
    Some(deadline.saturating_duration_since(Instant::now()))
}

impl BrowserDriver for WebDriverBrowser {
    fn goto(&mut self, url: &str, wait: WaitUntil, timeout: Duration) -> BrowserResult<()> {
        let started = Instant::now();
        self.act(Method::POST, "/url", Some(json!({ "url": url })), Some(timeout))?;
        self.wait_for_load_state(wait, timeout.saturating_sub(started.elapsed()))
    }

    fn wait_for_load_state(&mut self, wait: WaitUntil, timeout: Duration) -> BrowserResult<()> {
        let deadline = Instant::now() + timeout;
        let mut last_count = None;
        let mut quiet_since = Instant::now();

        loop {
            let (ready, resources) = match self.load_progress(remaining(deadline)) {
                Err(e) if e.is_timeout() => return Err(BrowserError::Timeout(timeout)),
                other => other?,
            };
            let reached = match wait {
                WaitUntil::DomContentLoaded => ready == "interactive" || ready == "complete",
                WaitUntil::Load => ready == "complete",
                WaitUntil::NetworkIdle => {
                    if last_count != Some(resources) {
                        last_count = Some(resources);
                        quiet_since = Instant::now();
                    }
                    ready == "complete" && quiet_since.elapsed() >= NETWORK_QUIET_PERIOD
                }
            };
            if reached {
                return Ok(());
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Err(BrowserError::Timeout(timeout));
            }
            thread::sleep(POLL_INTERVAL.min(left));
        }
    }

    fn current_url(&mut self) -> BrowserResult<String> {
        let url = self.query(Method::GET, "/url", None, None)?;
        Ok(url.as_str().unwrap_or_default().to_string())
    }

    fn count(&mut self, locator: &Locator) -> BrowserResult<usize> {
        Ok(self.element_ids(&locator.selector)?.len())
    }

    fn is_visible(&mut self, locator: &Locator) -> BrowserResult<bool> {
        let id = match self.resolve(locator) {
            Ok(id) => id,
            Err(BrowserError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        match self.query(Method::GET, &format!("/element/{}/displayed", id), None, None) {
            Ok(displayed) => Ok(displayed.as_bool().unwrap_or(false)),
            Err(BrowserError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn fill(&mut self, locator: &Locator, text: &str) -> BrowserResult<()> {
        let id = self.resolve(locator)?;
        self.act(Method::POST, &format!("/element/{}/clear", id), Some(json!({})), None)?;
        self.act(
            Method::POST,
            &format!("/element/{}/value", id),
            Some(json!({ "text": text })),
            None,
        )?;
        Ok(())
    }

    fn clear(&mut self, locator: &Locator) -> BrowserResult<()> {
        let id = self.resolve(locator)?;
        self.act(Method::POST, &format!("/element/{}/clear", id), Some(json!({})), None)?;
        Ok(())
    }

    fn blur(&mut self, locator: &Locator) -> BrowserResult<()> {
        let id = self.resolve(locator)?;
        self.act(
            Method::POST,
            "/execute/sync",
            Some(json!({
                "script": "arguments[0].dispatchEvent(new Event('change', { bubbles: true })); arguments[0].blur();",
                "args": [{ ELEMENT_KEY: id }],
            })),
            None,
        )?;
        Ok(())
    }

    fn input_value(&mut self, locator: &Locator) -> BrowserResult<String> {
        let id = self.resolve(locator)?;
        let value = self.query(Method::GET, &format!("/element/{}/property/value", id), None, None)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn click(&mut self, locator: &Locator, options: ClickOptions) -> BrowserResult<()> {
        let id = self.resolve(locator)?;
        let (path, body) = if options.force {
            // Script clicks skip the driver's occlusion and interactability checks
            (
                "/execute/sync".to_string(),
                json!({ "script": "arguments[0].click();", "args": [{ ELEMENT_KEY: id }] }),
            )
        } else {
            (format!("/element/{}/click", id), json!({}))
        };
        self.act(Method::POST, &path, Some(body), Some(options.timeout))?;
        Ok(())
    }

    fn go_back(&mut self) -> BrowserResult<()> {
        self.act(Method::POST, "/back", Some(json!({})), None)?;
        Ok(())
    }

    fn go_forward(&mut self) -> BrowserResult<()> {
        self.act(Method::POST, "/forward", Some(json!({})), None)?;
        Ok(())
    }

    fn reload(&mut self) -> BrowserResult<()> {
        self.act(Method::POST, "/refresh", Some(json!({})), None)?;
        Ok(())
    }

    fn on_dialog(&mut self, handler: DialogHandler) {
        self.dialog_handler = Some(handler);
    }

    fn screenshot(&mut self) -> BrowserResult<Vec<u8>> {
        let encoded = self.command(Method::GET, "/screenshot", None, None)?;
        let encoded = encoded
            .as_str()
            .ok_or_else(|| BrowserError::Protocol("screenshot was not a string".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| BrowserError::Protocol(format!("screenshot was not base64: {}", e)))
    }

    fn close(&mut self) -> BrowserResult<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.command(Method::DELETE, "", None, None);
        self.closed = true;
        if let Err(e) = &result {
            warn!(session = %self.session_id, error = %e, "Failed to delete WebDriver session");
        }
        result.map(|_| ())
    }

    fn source_type(&self) -> &str {
        "webdriver"
    }
}

/// Opens one WebDriver session per scenario
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    config: WebDriverConfig,
}

impl WebDriverFactory {
    pub fn new(config: WebDriverConfig) -> Self {
        Self { config }
    }
}

impl BrowserFactory for WebDriverFactory {
    fn open(&self) -> BrowserResult<Box<dyn BrowserDriver>> {
        Ok(Box::new(WebDriverBrowser::connect(&self.config)?))
    }
}

/// Send one command and unwrap the W3C `value` envelope
fn execute(
    http: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
    timeout: Duration,
) -> BrowserResult<Value> {
    let mut request = http.request(method, url).timeout(timeout);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().map_err(|e| {
        if e.is_timeout() {
            BrowserError::Timeout(timeout)
        } else {
            BrowserError::Http(e)
        }
    })?;

    let status = response.status();
    let payload: Value = response.json().unwrap_or(Value::Null);
    if !status.is_success() {
        return Err(protocol_error(&payload, timeout));
    }
    Ok(payload.get("value").cloned().unwrap_or(Value::Null))
}

/// Map a W3C error payload onto `BrowserError`
fn protocol_error(payload: &Value, timeout: Duration) -> BrowserError {
    let code = payload["value"]["error"].as_str().unwrap_or("unknown error");
    let message = payload["value"]["message"].as_str().unwrap_or_default().to_string();
    match code {
        "timeout" | "script timeout" => BrowserError::Timeout(timeout),
        "no such element" | "stale element reference" => BrowserError::NotFound(message),
        "unexpected alert open" => BrowserError::DialogBlocked(message),
        "invalid session id" | "session not created" => BrowserError::Session(message),
        _ => BrowserError::Protocol(format!("{}: {}", code, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn start_session(server: &MockServer) -> WebDriverBrowser {
        server.mock(|when, then| {
            when.method(POST).path("/session");
            then.status(200)
                .json_body(json!({ "value": { "sessionId": "abc", "capabilities": {} } }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/session/abc/timeouts");
            then.status(200).json_body(json!({ "value": null }));
        });
        WebDriverBrowser::connect(&WebDriverConfig::new(server.base_url())).unwrap()
    }

    fn no_alert(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/session/abc/alert/text");
            then.status(404).json_body(json!({
                "value": { "error": "no such alert", "message": "" }
            }));
        });
    }

    #[test]
    fn test_browser_kind_parsing() {
        assert_eq!("chrome".parse::<BrowserKind>(), Ok(BrowserKind::Chromium));
        assert_eq!("WebKit".parse::<BrowserKind>(), Ok(BrowserKind::Webkit));
        assert!("netscape".parse::<BrowserKind>().is_err());
    }

    #[test]
    fn test_browser_list_parsing() {
        assert_eq!(BrowserKind::parse_list("all").unwrap(), BrowserKind::all().to_vec());
        assert_eq!(
            BrowserKind::parse_list("firefox, chrome,firefox").unwrap(),
            vec![BrowserKind::Firefox, BrowserKind::Chromium]
        );
        assert!(BrowserKind::parse_list(" , ").is_err());
        assert!(BrowserKind::parse_list("webkit,lynx").is_err());
    }

    #[test]
    fn test_capabilities() {
        let chrome = WebDriverConfig::new("http://localhost:4444").capabilities();
        assert_eq!(chrome["browserName"], "chrome");
        assert_eq!(chrome["unhandledPromptBehavior"], "ignore");
        assert_eq!(chrome["goog:chromeOptions"]["args"][0], "--headless=new");

        let firefox = WebDriverConfig::new("http://localhost:4444")
            .browser(BrowserKind::Firefox)
            .headless(false)
            .capabilities();
        assert_eq!(firefox["browserName"], "firefox");
        assert!(firefox.get("moz:firefoxOptions").is_none());
    }

    #[test]
    fn test_protocol_error_mapping() {
        let err = |code: &str| json!({ "value": { "error": code, "message": "m" } });
        let timeout = Duration::from_millis(500);
        assert!(protocol_error(&err("timeout"), timeout).is_timeout());
        assert!(matches!(
            protocol_error(&err("stale element reference"), timeout),
            BrowserError::NotFound(_)
        ));
        assert!(matches!(
            protocol_error(&err("unexpected alert open"), timeout),
            BrowserError::DialogBlocked(_)
        ));
        assert!(matches!(
            protocol_error(&Value::Null, timeout),
            BrowserError::Protocol(_)
        ));
    }

    #[test]
    fn test_connect_count_and_close() {
        let server = MockServer::start();
        let mut browser = start_session(&server);
        assert_eq!(browser.session_id(), "abc");

        server.mock(|when, then| {
            when.method(POST).path("/session/abc/elements");
            then.status(200).json_body(json!({
                "value": [{ ELEMENT_KEY: "e1" }, { ELEMENT_KEY: "e2" }]
            }));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/session/abc");
            then.status(200).json_body(json!({ "value": null }));
        });

        assert_eq!(browser.count(&Locator::new("button")).unwrap(), 2);
        browser.close().unwrap();
        browser.close().unwrap();
        delete.assert_hits(1);
    }

    #[test]
    fn test_missing_element_is_not_visible() {
        let server = MockServer::start();
        let mut browser = start_session(&server);
        server.mock(|when, then| {
            when.method(POST).path("/session/abc/elements");
            then.status(200).json_body(json!({ "value": [] }));
        });
        assert!(!browser.is_visible(&Locator::new("#gone")).unwrap());
    }

    #[test]
    fn test_forced_click_dismisses_alert() {
        let server = MockServer::start();
        let mut browser = start_session(&server);
        server.mock(|when, then| {
            when.method(POST).path("/session/abc/elements");
            then.status(200)
                .json_body(json!({ "value": [{ ELEMENT_KEY: "e1" }] }));
        });
        let script = server.mock(|when, then| {
            when.method(POST).path("/session/abc/execute/sync");
            then.status(200).json_body(json!({ "value": null }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/session/abc/alert/text");
            then.status(200).json_body(json!({ "value": "XSS" }));
        });
        let dismiss = server.mock(|when, then| {
            when.method(POST).path("/session/abc/alert/dismiss");
            then.status(200).json_body(json!({ "value": null }));
        });

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        browser.on_dialog(Box::new(move |dialog| {
            assert_eq!(dialog.message, "XSS");
            counter.fetch_add(1, Ordering::SeqCst);
            DialogAction::Dismiss
        }));

        browser
            .click(&Locator::new("button").first(), ClickOptions::forced(Duration::from_millis(500)))
            .unwrap();
        script.assert_hits(1);
        dismiss.assert_hits(1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_click_that_raises_alert_is_sent_once() {
        let server = MockServer::start();
        let mut browser = start_session(&server);
        server.mock(|when, then| {
            when.method(POST).path("/session/abc/elements");
            then.status(200)
                .json_body(json!({ "value": [{ ELEMENT_KEY: "e1" }] }));
        });
        let script = server.mock(|when, then| {
            when.method(POST).path("/session/abc/execute/sync");
            then.status(500).json_body(json!({
                "value": { "error": "unexpected alert open", "message": "hi" }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/session/abc/alert/text");
            then.status(200).json_body(json!({ "value": "hi" }));
        });
        let dismiss = server.mock(|when, then| {
            when.method(POST).path("/session/abc/alert/dismiss");
            then.status(200).json_body(json!({ "value": null }));
        });
        browser.on_dialog(Box::new(|_| DialogAction::Dismiss));

        let result = browser.click(
            &Locator::new("button").first(),
            ClickOptions::forced(Duration::from_millis(500)),
        );

        assert!(result.is_ok(), "{:?}", result);
        script.assert_hits(1);
        dismiss.assert_hits(1);
    }

    #[test]
    fn test_query_services_async_alert_and_asks_again() {
        let server = MockServer::start();
        let mut browser = start_session(&server);
        let blocked_once = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&blocked_once);
        // Only the first lookup meets the open alert
        server.mock(|when, then| {
            when.method(POST)
                .path("/session/abc/elements")
                .is_true(move |req| {
                    req.uri().path().ends_with("/elements") && !flag.swap(true, Ordering::SeqCst)
                });
            then.status(500).json_body(json!({
                "value": { "error": "unexpected alert open", "message": "XSS" }
            }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/session/abc/elements");
            then.status(200)
                .json_body(json!({ "value": [{ ELEMENT_KEY: "body" }] }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/session/abc/element/body/displayed");
            then.status(200).json_body(json!({ "value": true }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/session/abc/alert/text");
            then.status(200).json_body(json!({ "value": "XSS" }));
        });
        let dismiss = server.mock(|when, then| {
            when.method(POST).path("/session/abc/alert/dismiss");
            then.status(200).json_body(json!({ "value": null }));
        });
        browser.on_dialog(Box::new(|_| DialogAction::Dismiss));

        let visible = browser.is_visible(&Locator::new("body").first());

        assert!(matches!(visible, Ok(true)), "{:?}", visible);
        assert!(blocked_once.load(Ordering::SeqCst));
        dismiss.assert_hits(1);
    }

    #[test]
    fn test_load_wait_is_bounded_by_its_own_timeout() {
        let server = MockServer::start();
        let mut browser = start_session(&server);
        server.mock(|when, then| {
            when.method(POST).path("/session/abc/execute/sync");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!({ "value": ["complete", 1] }));
        });

        let started = Instant::now();
        let err = browser
            .wait_for_load_state(WaitUntil::Load, Duration::from_millis(300))
            .unwrap_err();

        assert!(matches!(err, BrowserError::Timeout(t) if t == Duration::from_millis(300)));
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[test]
    fn test_unhandled_alert_blocks() {
        let server = MockServer::start();
        let mut browser = start_session(&server);
        server.mock(|when, then| {
            when.method(POST).path("/session/abc/refresh");
            then.status(200).json_body(json!({ "value": null }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/session/abc/alert/text");
            then.status(200).json_body(json!({ "value": "leave page?" }));
        });
        let err = browser.reload().unwrap_err();
        assert!(matches!(err, BrowserError::DialogBlocked(msg) if msg == "leave page?"));
    }

    #[test]
    fn test_load_state_reached() {
        let server = MockServer::start();
        let mut browser = start_session(&server);
        no_alert(&server);
        server.mock(|when, then| {
            when.method(POST).path("/session/abc/url");
            then.status(200).json_body(json!({ "value": null }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/session/abc/execute/sync");
            then.status(200).json_body(json!({ "value": ["complete", 3] }));
        });
        browser
            .goto("http://localhost:3000/", WaitUntil::Load, Duration::from_secs(2))
            .unwrap();
    }

    #[test]
    fn test_load_state_times_out() {
        let server = MockServer::start();
        let mut browser = start_session(&server);
        server.mock(|when, then| {
            when.method(POST).path("/session/abc/execute/sync");
            then.status(200).json_body(json!({ "value": ["loading", 0] }));
        });
        let err = browser
            .wait_for_load_state(WaitUntil::DomContentLoaded, Duration::from_millis(150))
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
