//! Web Chaos - adversarial robustness checks for black-box web applications.
//!
//! This crate provides:
//! - A fixed catalog of malformed and injection-shaped payloads
//! - An input fuzzer, a random-click monkey, history chaos and an API fuzzer
//! - A `BrowserDriver` abstraction with a WebDriver backend and an in-memory mock
//! - A suite runner with per-scenario isolation, timeouts and retries
//!
//! Scenarios only check coarse liveness: the root container is still visible,
//! the backend never answers with a 5xx.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use web_chaos::browser::{MockApp, MockBrowserFactory};
//! use web_chaos::config::ChaosConfig;
//! use web_chaos::http::StaticHttpClient;
//! use web_chaos::runner::SuiteRunner;
//! use web_chaos::scenarios::ScenarioKind;
//!
//! let runner = SuiteRunner::new(
//!     ChaosConfig::defaults().with_seed(42),
//!     Arc::new(MockBrowserFactory::new(MockApp::demo())),
//!     Arc::new(StaticHttpClient::new(400)),
//! );
//! let result = runner.run(&ScenarioKind::all());
//! println!("{}", result.summary());
//! ```

pub mod browser;
pub mod config;
pub mod harness;
pub mod http;
pub mod payload;
pub mod runner;
pub mod scenarios;
pub mod session;

// Re-export the browser capability
pub use browser::{
    BrowserDriver, BrowserError, BrowserFactory, BrowserKind, BrowserResult, Locator, MockApp,
    MockBrowser, MockBrowserFactory, WebDriverBrowser, WebDriverConfig, WebDriverFactory,
};

// Re-export harness types
pub use harness::{
    HarnessError, HarnessResult, InteractionOutcome, ScenarioFailure, ScenarioLog, ScenarioResult,
};

pub use config::ChaosConfig;
pub use http::{BlockingHttpClient, HttpClient, HttpError, StaticHttpClient};
pub use payload::{Payload, PayloadCatalog, PayloadTag};
pub use runner::{SuiteResult, SuiteRunner, run_matrix};
pub use scenarios::{ScenarioContext, ScenarioKind};
pub use session::BrowserSession;
