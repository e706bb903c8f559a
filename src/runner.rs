//! Suite runner: isolation, timeouts and retries around the scenarios.
//!
//! Every scenario run gets its own thread and its own browser session. The
//! runner waits on a channel with the whole-scenario timeout; a run that does
//! not report in time is recorded as aborted and its thread is left to finish
//! on its own (the session closes the browser when it does).
//!
//! `run_matrix` repeats the whole suite once per browser engine and folds the
//! passes into one result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use crate::browser::{BrowserFactory, BrowserKind};
use crate::config::ChaosConfig;
use crate::harness::{ScenarioFailure, ScenarioLog, ScenarioResult};
use crate::http::HttpClient;
use crate::payload::PayloadCatalog;
use crate::scenarios::{ApiFuzzer, ScenarioContext, ScenarioKind, run_browser_scenario};
use crate::session::BrowserSession;

/// Result of a complete suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    /// True only when every scenario passed, in every browser
    pub passed: bool,

    pub base_url: String,

    /// Machine the suite ran on
    pub host: String,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// One entry per scenario and browser, in the requested order
    pub scenarios: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.scenarios.iter().filter(|s| !s.passed)
    }

    /// One line per scenario, for terminal output
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for scenario in &self.scenarios {
            let status = if scenario.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!("{} {}", status, scenario.scenario));
            if let Some(browser) = scenario.browser {
                out.push_str(&format!(" [{}]", browser));
            }
            out.push_str(&format!(
                " ({} attempt(s), {}ms)",
                scenario.attempts, scenario.duration_ms
            ));
            if let Some(failure) = &scenario.failure {
                out.push_str(&format!(": {}", failure));
            }
            out.push('\n');
        }
        let failed = self.failures().count();
        out.push_str(&format!(
            "{} passed, {} failed against {}",
            self.scenarios.len() - failed,
            failed,
            self.base_url
        ));
        out
    }

    /// Fold a later pass into this one
    pub fn absorb(&mut self, other: SuiteResult) {
        self.passed &= other.passed;
        self.finished_at = self.finished_at.max(other.finished_at);
        self.scenarios.extend(other.scenarios);
    }
}

/// Run the whole suite once per browser, each pass on a runner built for that
/// browser. An empty `browsers` falls back to the default engine, unlabelled.
pub fn run_matrix<F>(browsers: &[BrowserKind], kinds: &[ScenarioKind], runner_for: F) -> SuiteResult
where
    F: Fn(BrowserKind) -> SuiteRunner,
{
    let mut passes = browsers
        .iter()
        .map(|&browser| runner_for(browser).with_browser(browser).run(kinds));
    let first = passes
        .next()
        .unwrap_or_else(|| runner_for(BrowserKind::default()).run(kinds));
    passes.fold(first, |mut merged, pass| {
        merged.absorb(pass);
        merged
    })
}

/// What one scenario run reports back over the channel
struct Execution {
    outcome: Result<(), ScenarioFailure>,
    artifacts: Vec<PathBuf>,
}

/// Runs scenarios against shared, read-only inputs
#[derive(Clone)]
pub struct SuiteRunner {
    config: Arc<ChaosConfig>,
    payloads: Arc<PayloadCatalog>,
    browsers: Arc<dyn BrowserFactory>,
    http: Arc<dyn HttpClient>,
    /// Label stamped on every result
    browser: Option<BrowserKind>,
}

impl SuiteRunner {
    pub fn new(config: ChaosConfig, browsers: Arc<dyn BrowserFactory>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            config: Arc::new(config),
            payloads: Arc::new(PayloadCatalog::standard()),
            browsers,
            http,
            browser: None,
        }
    }

    /// Label every result with the engine `browsers` opens
    pub fn with_browser(mut self, browser: BrowserKind) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn config(&self) -> &ChaosConfig {
        &self.config
    }

    /// Run `kinds`, at most `workers` at a time
    pub fn run(&self, kinds: &[ScenarioKind]) -> SuiteResult {
        let started_at = Utc::now();
        tracing::info!(
            scenarios = kinds.len(),
            browser = ?self.browser,
            workers = self.config.workers,
            base_url = %self.config.base_url,
            "starting chaos suite"
        );

        let mut scenarios = Vec::with_capacity(kinds.len());
        for batch in kinds.chunks(self.config.workers.max(1)) {
            thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|&kind| (kind, scope.spawn(move || self.run_scenario(kind))))
                    .collect();
                for (kind, handle) in handles {
                    scenarios.push(handle.join().unwrap_or_else(|payload| {
                        let log = ScenarioLog::new(kind.name());
                        let failure = ScenarioFailure::Panicked {
                            detail: panic_message(payload.as_ref()),
                        };
                        let mut result = ScenarioResult::new(kind.name(), Err(failure), &log, Utc::now());
                        result.browser = self.browser;
                        result
                    }));
                }
            });
        }

        let passed = scenarios.iter().all(|s| s.passed);
        let result = SuiteResult {
            passed,
            base_url: self.config.base_url.clone(),
            host: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
            started_at,
            finished_at: Utc::now(),
            scenarios,
        };
        tracing::info!(passed = result.passed, failed = result.failures().count(), "chaos suite finished");
        result
    }

    /// Run one scenario, re-running the whole of it on failure up to `retries` times
    pub fn run_scenario(&self, kind: ScenarioKind) -> ScenarioResult {
        let started_at = Utc::now();
        let ctx = ScenarioContext::new(kind, Arc::clone(&self.config), Arc::clone(&self.payloads));
        let max_attempts = self.config.retries + 1;
        let mut artifacts = Vec::new();
        let mut attempt = 1;

        loop {
            let execution = self.run_once(kind, &ctx, attempt);
            artifacts.extend(execution.artifacts);
            match execution.outcome {
                Err(failure) if attempt < max_attempts => {
                    ctx.log.warn(format!(
                        "Attempt {}/{} failed ({}), re-running scenario",
                        attempt, max_attempts, failure
                    ));
                    attempt += 1;
                }
                outcome => {
                    let mut result = ScenarioResult::new(kind.name(), outcome, &ctx.log, started_at);
                    result.browser = self.browser;
                    result.attempts = attempt;
                    result.artifacts = artifacts;
                    tracing::info!(
                        scenario = kind.name(),
                        browser = ?self.browser,
                        passed = result.passed,
                        attempts = attempt,
                        "scenario finished"
                    );
                    return result;
                }
            }
        }
    }

    /// One bounded run on a dedicated thread
    fn run_once(&self, kind: ScenarioKind, ctx: &ScenarioContext, attempt: u32) -> Execution {
        let timeout = self.config.scenario_timeout;
        let (tx, rx) = mpsc::channel();
        let worker_ctx = ctx.clone();
        let browsers = Arc::clone(&self.browsers);
        let http = Arc::clone(&self.http);

        let spawned = thread::Builder::new()
            .name(format!("chaos-{}", kind))
            .spawn(move || {
                let execution = execute(kind, browsers.as_ref(), http.as_ref(), &worker_ctx, attempt);
                // The receiver is gone if the run was already aborted
                let _ = tx.send(execution);
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                return Execution {
                    outcome: Err(ScenarioFailure::Driver {
                        stage: "spawn scenario thread".into(),
                        detail: e.to_string(),
                    }),
                    artifacts: Vec::new(),
                };
            }
        };

        match rx.recv_timeout(timeout) {
            Ok(execution) => execution,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                ctx.log.warn(format!("Scenario exceeded {:?}, aborting", timeout));
                Execution {
                    outcome: Err(ScenarioFailure::Aborted {
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                    artifacts: Vec::new(),
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                let detail = match handle.join() {
                    Err(payload) => panic_message(payload.as_ref()),
                    Ok(()) => "scenario thread exited without reporting".to_string(),
                };
                ctx.log.warn(format!("Scenario panicked: {}", detail));
                Execution {
                    outcome: Err(ScenarioFailure::Panicked { detail }),
                    artifacts: Vec::new(),
                }
            }
        }
    }
}

fn execute(
    kind: ScenarioKind,
    browsers: &dyn BrowserFactory,
    http: &dyn HttpClient,
    ctx: &ScenarioContext,
    attempt: u32,
) -> Execution {
    if !kind.needs_browser() {
        let outcome = ApiFuzzer::from_config(&ctx.config).run(http, ctx).map(|statuses| {
            ctx.log.info(format!("API answered {:?}", statuses));
        });
        return Execution {
            outcome,
            artifacts: Vec::new(),
        };
    }

    let mut session = match BrowserSession::open(browsers, kind.name(), ctx.config.artifacts_dir.as_deref()) {
        Ok(session) => session,
        Err(e) => {
            return Execution {
                outcome: Err(ScenarioFailure::driver("open browser", &e)),
                artifacts: Vec::new(),
            };
        }
    };

    let outcome = run_browser_scenario(kind, session.driver(), ctx);
    let mut artifacts = Vec::new();
    if outcome.is_err() && ctx.config.screenshot_on_failure {
        match session.capture_failure_screenshot(&format!("attempt_{}", attempt)) {
            Ok(Some(path)) => artifacts.push(path),
            Ok(None) => {}
            Err(e) => ctx.log.warn(format!("Could not save failure screenshot: {}", e)),
        }
    }
    Execution { outcome, artifacts }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
