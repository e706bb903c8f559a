use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::browser::{BrowserError, BrowserKind};
use crate::http::HttpError;

/// Result of one attempted fill/click/navigate. Informational only: a failed
/// interaction never fails a scenario by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum InteractionOutcome {
    Succeeded,
    SkippedNotVisible,
    FailedTimedOut,
    /// Any other non-fatal driver error (detached element, blocked page...)
    Failed(String),
}

impl InteractionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, InteractionOutcome::Succeeded)
    }
}

/// Severity of a scenario log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
}

/// A single diagnostic line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Free-form diagnostic log of one scenario.
///
/// Clones share the same buffer, so a dialog handler running inside the driver
/// can write to the scenario's log. Every line is also emitted through `tracing`.
#[derive(Debug, Clone)]
pub struct ScenarioLog {
    scenario: String,
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl ScenarioLog {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            lines: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(scenario = %self.scenario, "{}", message);
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(scenario = %self.scenario, "{}", message);
        self.push(LogLevel::Warn, message);
    }

    fn push(&self, level: LogLevel, message: String) {
        self.lines.lock().push(LogLine {
            at: Utc::now(),
            level,
            message,
        });
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().clone()
    }

    /// Messages only, in order
    pub fn messages(&self) -> Vec<String> {
        self.lines.lock().iter().map(|l| l.message.clone()).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.message.contains(needle))
    }
}

/// Why a scenario failed. Only these surface as scenario failures; everything
/// finer-grained is absorbed inside the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioFailure {
    /// Root container gone or page unresponsive after a chaos sequence
    #[error("liveness violation after {stage}: {detail}")]
    LivenessViolation { stage: String, detail: String },

    /// Backend answered fuzzed input with a 5xx
    #[error("backend fault: {url} answered {status} to fuzzed `{field}`")]
    BackendFault { url: String, field: String, status: u16 },

    /// Backend could not be reached at all
    #[error("backend unreachable at {url}: {detail}")]
    Transport { url: String, detail: String },

    /// A step the scenario cannot proceed without failed
    #[error("{stage} failed: {detail}")]
    Driver { stage: String, detail: String },

    /// Whole-scenario timeout elapsed
    #[error("aborted after {timeout_ms}ms")]
    Aborted { timeout_ms: u64 },

    /// Scenario thread panicked
    #[error("scenario panicked: {detail}")]
    Panicked { detail: String },
}

impl ScenarioFailure {
    pub fn liveness(stage: &str, detail: impl Into<String>) -> Self {
        ScenarioFailure::LivenessViolation {
            stage: stage.to_string(),
            detail: detail.into(),
        }
    }

    pub fn driver(stage: &str, err: &BrowserError) -> Self {
        ScenarioFailure::Driver {
            stage: stage.to_string(),
            detail: err.to_string(),
        }
    }
}

/// Outcome of one scenario, handed to the reporting side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario name
    pub scenario: String,

    /// Engine the scenario ran in; unset for runs without a browser label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserKind>,

    pub passed: bool,

    /// Set when `passed` is false
    pub failure: Option<ScenarioFailure>,

    /// Number of whole-scenario runs (1 + retries used)
    pub attempts: u32,

    pub started_at: DateTime<Utc>,

    pub duration_ms: u64,

    pub log: Vec<LogLine>,

    /// Files written for diagnosis (e.g. failure screenshots)
    pub artifacts: Vec<PathBuf>,
}

impl ScenarioResult {
    pub fn new(
        scenario: &str,
        outcome: Result<(), ScenarioFailure>,
        log: &ScenarioLog,
        started_at: DateTime<Utc>,
    ) -> Self {
        let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
        Self {
            scenario: scenario.to_string(),
            browser: None,
            passed: outcome.is_ok(),
            failure: outcome.err(),
            attempts: 1,
            started_at,
            duration_ms,
            log: log.lines(),
            artifacts: Vec::new(),
        }
    }
}

/// Result type for harness setup operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors raised outside of any single scenario
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("http error: {0}")]
    Http(#[from] HttpError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_clones_share_buffer() {
        let log = ScenarioLog::new("monkey");
        let handle = log.clone();
        handle.info("Alert detected: XSS");
        log.warn("missed click");
        assert_eq!(log.messages(), vec!["Alert detected: XSS", "missed click"]);
        assert_eq!(log.lines()[1].level, LogLevel::Warn);
        assert!(log.contains("XSS"));
    }

    #[test]
    fn test_result_from_failure() {
        let log = ScenarioLog::new("api_fuzzer");
        let failure = ScenarioFailure::BackendFault {
            url: "http://localhost:3000/api/test-endpoint".into(),
            field: "comment".into(),
            status: 500,
        };
        let result = ScenarioResult::new("api_fuzzer", Err(failure.clone()), &log, Utc::now());
        assert!(!result.passed);
        assert_eq!(result.failure, Some(failure));
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn test_failure_serializes_with_kind_tag() {
        let failure = ScenarioFailure::liveness("reload", "root container not visible");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "liveness_violation");
        assert_eq!(json["stage"], "reload");
        assert_eq!(
            failure.to_string(),
            "liveness violation after reload: root container not visible"
        );
    }

    #[test]
    fn test_http_setup_error_converts() {
        let err = HarnessError::from(HttpError::Timeout(std::time::Duration::from_secs(5)));
        assert!(matches!(err, HarnessError::Http(HttpError::Timeout(_))));
        assert_eq!(err.to_string(), "http error: no response within 5s");
    }

    #[test]
    fn test_browser_label_serialized_only_when_set() {
        let log = ScenarioLog::new("navigator");
        let mut result = ScenarioResult::new("navigator", Ok(()), &log, Utc::now());
        assert!(serde_json::to_value(&result).unwrap().get("browser").is_none());

        result.browser = Some(BrowserKind::Firefox);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["browser"], "firefox");
    }

    #[test]
    fn test_outcome_serde() {
        let json = serde_json::to_string(&InteractionOutcome::Failed("detached".into())).unwrap();
        let parsed: InteractionOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, InteractionOutcome::Failed("detached".into()));
        assert!(InteractionOutcome::Succeeded.succeeded());
    }
}
