//! The four chaos scenarios and the plumbing they share.
//!
//! Every scenario observes only coarse liveness signals (root container still
//! visible, status code class) and never business state. Individual
//! interactions go through [`attempt`], which turns driver errors into an
//! [`InteractionOutcome`] instead of propagating them.

pub mod api_fuzzer;
pub mod input_fuzzer;
pub mod monkey;
pub mod navigator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::browser::{BrowserDriver, BrowserResult, DialogAction, Locator};
use crate::config::ChaosConfig;
use crate::harness::{InteractionOutcome, ScenarioFailure, ScenarioLog};
use crate::payload::PayloadCatalog;

pub use api_fuzzer::{ApiFuzzer, ApiProbe};
pub use input_fuzzer::{FieldProbe, FieldRole, FieldStep, InputFuzzer};
pub use monkey::{Monkey, MonkeyTally};
pub use navigator::{HistoryStep, Navigator};

/// Identifies a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    InputFuzzer,
    Monkey,
    Navigator,
    ApiFuzzer,
}

impl ScenarioKind {
    pub fn all() -> [ScenarioKind; 4] {
        [
            ScenarioKind::InputFuzzer,
            ScenarioKind::Monkey,
            ScenarioKind::Navigator,
            ScenarioKind::ApiFuzzer,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::InputFuzzer => "input_fuzzer",
            ScenarioKind::Monkey => "monkey",
            ScenarioKind::Navigator => "navigator",
            ScenarioKind::ApiFuzzer => "api_fuzzer",
        }
    }

    /// Human-readable title used in reports
    pub fn title(&self) -> &'static str {
        match self {
            ScenarioKind::InputFuzzer => "The Fuzzer: input validation (SQLi, XSS, garbage)",
            ScenarioKind::Monkey => "The Monkey: random interactions",
            ScenarioKind::Navigator => "The Navigator: rapid back/forward navigation",
            ScenarioKind::ApiFuzzer => "API fuzzing: sending garbage data",
        }
    }

    pub fn needs_browser(&self) -> bool {
        !matches!(self, ScenarioKind::ApiFuzzer)
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "input_fuzzer" | "fuzzer" | "inputs" => Ok(ScenarioKind::InputFuzzer),
            "monkey" => Ok(ScenarioKind::Monkey),
            "navigator" | "navigation" => Ok(ScenarioKind::Navigator),
            "api_fuzzer" | "api" => Ok(ScenarioKind::ApiFuzzer),
            other => Err(format!(
                "unknown scenario '{}'. Use: input_fuzzer, monkey, navigator, or api_fuzzer",
                other
            )),
        }
    }
}

/// Read-only inputs plus the log of one scenario run
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    pub config: Arc<ChaosConfig>,
    pub payloads: Arc<PayloadCatalog>,
    pub log: ScenarioLog,
}

impl ScenarioContext {
    pub fn new(kind: ScenarioKind, config: Arc<ChaosConfig>, payloads: Arc<PayloadCatalog>) -> Self {
        Self {
            config,
            payloads,
            log: ScenarioLog::new(kind.name()),
        }
    }

    /// Absolute URL of `path` on the application under test
    pub fn url(&self, path: &str) -> Result<String, ScenarioFailure> {
        self.config.url(path).map_err(|e| ScenarioFailure::Driver {
            stage: "resolve URL".into(),
            detail: e.to_string(),
        })
    }

    /// Root container whose visibility defines liveness
    pub fn root(&self) -> Locator {
        Locator::new(self.config.root_selector.clone()).first()
    }
}

/// Run one browser-driven scenario on a driver owned by the caller
pub fn run_browser_scenario(
    kind: ScenarioKind,
    browser: &mut dyn BrowserDriver,
    ctx: &ScenarioContext,
) -> Result<(), ScenarioFailure> {
    match kind {
        ScenarioKind::InputFuzzer => InputFuzzer::standard().run(browser, ctx),
        ScenarioKind::Monkey => Monkey::from_config(&ctx.config).run(browser, ctx).map(|_| ()),
        ScenarioKind::Navigator => Navigator::standard().run(browser, ctx),
        ScenarioKind::ApiFuzzer => Err(ScenarioFailure::Driver {
            stage: "dispatch".into(),
            detail: "api_fuzzer does not drive a browser".into(),
        }),
    }
}

/// Dismiss every native dialog, logging its message
pub fn install_dialog_handler(browser: &mut dyn BrowserDriver, log: &ScenarioLog) {
    let log = log.clone();
    browser.on_dialog(Box::new(move |dialog| {
        log.info(format!("Alert detected: {}", dialog.message));
        DialogAction::Dismiss
    }));
}

/// Run an exploratory action, absorbing any failure into the outcome
pub fn attempt<F>(log: &ScenarioLog, label: &str, op: F) -> InteractionOutcome
where
    F: FnOnce() -> BrowserResult<()>,
{
    match op() {
        Ok(()) => InteractionOutcome::Succeeded,
        Err(e) if e.is_timeout() => {
            log.warn(format!("{} timed out: {}", label, e));
            InteractionOutcome::FailedTimedOut
        }
        Err(e) => {
            log.warn(format!("{} failed: {}", label, e));
            InteractionOutcome::Failed(e.to_string())
        }
    }
}

/// Like [`attempt`], but skips the action when the target is not visible
pub fn attempt_if_visible<F>(
    browser: &mut dyn BrowserDriver,
    log: &ScenarioLog,
    label: &str,
    target: &Locator,
    op: F,
) -> InteractionOutcome
where
    F: FnOnce(&mut dyn BrowserDriver) -> BrowserResult<()>,
{
    match browser.is_visible(target) {
        Ok(true) => attempt(log, label, || op(browser)),
        Ok(false) => InteractionOutcome::SkippedNotVisible,
        Err(e) => attempt(log, label, || Err(e)),
    }
}

/// Fail the scenario unless the root container is still visible
pub fn check_liveness(
    browser: &mut dyn BrowserDriver,
    ctx: &ScenarioContext,
    stage: &str,
) -> Result<(), ScenarioFailure> {
    let root = ctx.root();
    match browser.is_visible(&root) {
        Ok(true) => Ok(()),
        Ok(false) => Err(ScenarioFailure::liveness(
            stage,
            format!("root container `{}` is not visible", root.selector),
        )),
        Err(e) => Err(ScenarioFailure::liveness(
            stage,
            format!("page unresponsive: {}", e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserError, MockApp, MockBrowser, WaitUntil};
    use std::time::Duration;

    fn context(kind: ScenarioKind) -> ScenarioContext {
        ScenarioContext::new(
            kind,
            Arc::new(ChaosConfig::defaults().fast()),
            Arc::new(PayloadCatalog::standard()),
        )
    }

    #[test]
    fn test_scenario_kind_names_round_trip() {
        for kind in ScenarioKind::all() {
            assert_eq!(kind.name().parse::<ScenarioKind>(), Ok(kind));
        }
        assert_eq!("api".parse::<ScenarioKind>(), Ok(ScenarioKind::ApiFuzzer));
        assert!("gremlin".parse::<ScenarioKind>().is_err());
        assert!(!ScenarioKind::ApiFuzzer.needs_browser());
    }

    #[test]
    fn test_attempt_classifies_errors() {
        let log = ScenarioLog::new("test");
        assert_eq!(attempt(&log, "ok", || Ok(())), InteractionOutcome::Succeeded);
        assert_eq!(
            attempt(&log, "slow", || Err(BrowserError::Timeout(Duration::from_millis(500)))),
            InteractionOutcome::FailedTimedOut
        );
        assert!(matches!(
            attempt(&log, "gone", || Err(BrowserError::NotFound("#x".into()))),
            InteractionOutcome::Failed(_)
        ));
        assert_eq!(log.lines().len(), 2);
    }

    #[test]
    fn test_attempt_if_visible_skips_hidden() {
        let ctx = context(ScenarioKind::Monkey);
        let mut browser = MockBrowser::new(MockApp::demo());
        browser
            .goto("http://localhost:3000/", WaitUntil::Load, Duration::from_secs(1))
            .unwrap();
        let hidden = Locator::new("#drawer-close");
        let outcome = attempt_if_visible(&mut browser, &ctx.log, "click", &hidden, |_| {
            panic!("must not run for a hidden element")
        });
        assert_eq!(outcome, InteractionOutcome::SkippedNotVisible);
    }

    #[test]
    fn test_liveness_on_blank_browser_fails() {
        let ctx = context(ScenarioKind::Navigator);
        let mut browser = MockBrowser::new(MockApp::demo());
        let err = check_liveness(&mut browser, &ctx, "start").unwrap_err();
        assert!(matches!(err, ScenarioFailure::LivenessViolation { .. }));
    }

    #[test]
    fn test_api_fuzzer_is_not_a_browser_scenario() {
        let ctx = context(ScenarioKind::ApiFuzzer);
        let mut browser = MockBrowser::new(MockApp::demo());
        assert!(run_browser_scenario(ScenarioKind::ApiFuzzer, &mut browser, &ctx).is_err());
    }
}
