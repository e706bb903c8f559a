//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for the chaos suite, supporting:
//! - Environment variables for all configurable values
//! - Defaults that suit a local development server
//! - Builder methods for programmatic configuration
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BASE_URL` | Root URL of the application under test | `http://localhost:3000` |
//! | `CI` | Set on CI: retries default to 2, workers to 1 | unset |
//! | `CHAOS_WEBDRIVER_URL` | WebDriver endpoint | `http://localhost:4444` |
//! | `CHAOS_BROWSER` | `chromium`, `firefox`, `webkit`, a comma-separated list, or `all` | `chromium` |
//! | `CHAOS_HEADLESS` | Run the browser headless | `true` |
//! | `CHAOS_FORM_PATH` | Page probed by the input fuzzer | `/signup` |
//! | `CHAOS_API_PATH` | Endpoint probed by the API fuzzer | `/api/test-endpoint` |
//! | `CHAOS_ROOT_SELECTOR` | Root container checked for liveness | `body` |
//! | `CHAOS_MONKEY_ROUNDS` | Random clicks per monkey run | `20` |
//! | `CHAOS_MONKEY_DELAY_MS` | Pause between monkey clicks | `100` |
//! | `CHAOS_CLICK_TIMEOUT_MS` | Per-click timeout | `500` |
//! | `CHAOS_NAV_TIMEOUT_MS` | Navigation / load-state timeout | `30000` |
//! | `CHAOS_IDLE_TIMEOUT_MS` | Network-idle wait bound | `10000` |
//! | `CHAOS_SCENARIO_TIMEOUT_MS` | Whole-scenario timeout | `60000` |
//! | `CHAOS_RETRIES` | Whole-scenario re-runs on failure | `0` (`2` on CI) |
//! | `CHAOS_WORKERS` | Scenarios run concurrently | `4` (`1` on CI) |
//! | `CHAOS_SEED` | Seed for the monkey's RNG | random |
//! | `CHAOS_ARTIFACTS_DIR` | Where failure screenshots go | unset (none written) |
//!
//! # Example
//!
//! ```bash
//! export BASE_URL="https://staging.example.com"
//! export CHAOS_BROWSER=firefox
//! export CHAOS_SEED=42
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::browser::BrowserKind;
use crate::harness::{HarnessError, HarnessResult};

// ============================================================================
// Default Values
// ============================================================================

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
pub const DEFAULT_FORM_PATH: &str = "/signup";
pub const DEFAULT_API_PATH: &str = "/api/test-endpoint";
pub const DEFAULT_ROOT_SELECTOR: &str = "body";

pub const DEFAULT_MONKEY_ROUNDS: u32 = 20;
pub const DEFAULT_MONKEY_DELAY_MS: u64 = 100;
pub const DEFAULT_CLICK_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_NAV_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_SCENARIO_TIMEOUT_MS: u64 = 60_000;

/// Retries when running on CI
pub const CI_RETRIES: u32 = 2;

/// Concurrent scenarios when not on CI
pub const DEFAULT_WORKERS: usize = 4;

// Field heuristics for the input fuzzer
pub const AGE_FIELD_SELECTOR: &str = r#"input[name="age"]"#;
pub const EMAIL_FIELD_SELECTOR: &str = r#"input[type="email"]"#;
pub const PRICE_FIELD_SELECTOR: &str = r#"input[name="price"], input[type="number"]"#;

/// Everything the monkey may click
pub const INTERACTIVE_SELECTOR: &str =
    r#"button, a[href^="/"], input[type="submit"], input[type="button"]"#;

/// Links the navigator may follow
pub const LINK_SELECTOR: &str = "a[href]";

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_BASE_URL: &str = "BASE_URL";
pub const ENV_CI: &str = "CI";
pub const ENV_WEBDRIVER_URL: &str = "CHAOS_WEBDRIVER_URL";
pub const ENV_BROWSER: &str = "CHAOS_BROWSER";
pub const ENV_HEADLESS: &str = "CHAOS_HEADLESS";
pub const ENV_FORM_PATH: &str = "CHAOS_FORM_PATH";
pub const ENV_API_PATH: &str = "CHAOS_API_PATH";
pub const ENV_ROOT_SELECTOR: &str = "CHAOS_ROOT_SELECTOR";
pub const ENV_MONKEY_ROUNDS: &str = "CHAOS_MONKEY_ROUNDS";
pub const ENV_MONKEY_DELAY: &str = "CHAOS_MONKEY_DELAY_MS";
pub const ENV_CLICK_TIMEOUT: &str = "CHAOS_CLICK_TIMEOUT_MS";
pub const ENV_NAV_TIMEOUT: &str = "CHAOS_NAV_TIMEOUT_MS";
pub const ENV_IDLE_TIMEOUT: &str = "CHAOS_IDLE_TIMEOUT_MS";
pub const ENV_SCENARIO_TIMEOUT: &str = "CHAOS_SCENARIO_TIMEOUT_MS";
pub const ENV_RETRIES: &str = "CHAOS_RETRIES";
pub const ENV_WORKERS: &str = "CHAOS_WORKERS";
pub const ENV_SEED: &str = "CHAOS_SEED";
pub const ENV_ARTIFACTS_DIR: &str = "CHAOS_ARTIFACTS_DIR";

// ============================================================================
// Configuration
// ============================================================================

static CONFIG: OnceLock<ChaosConfig> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static ChaosConfig {
    CONFIG.get_or_init(ChaosConfig::from_env)
}

/// Settings for one suite run
#[derive(Debug, Clone, PartialEq)]
pub struct ChaosConfig {
    /// Root URL of the application under test
    pub base_url: String,

    /// WebDriver endpoint
    pub webdriver_url: String,
    /// Engines the suite runs in, one full pass each
    pub browsers: Vec<BrowserKind>,
    pub headless: bool,

    /// Page the input fuzzer probes
    pub form_path: String,
    /// Endpoint the API fuzzer probes
    pub api_path: String,
    /// Also post every other catalog payload to the API
    pub api_all_payloads: bool,

    /// Root container whose visibility defines liveness
    pub root_selector: String,

    pub monkey_rounds: u32,
    pub monkey_delay: Duration,
    pub click_timeout: Duration,
    pub navigation_timeout: Duration,
    pub idle_timeout: Duration,
    pub scenario_timeout: Duration,

    /// Whole-scenario re-runs after a failure
    pub retries: u32,
    /// Scenarios allowed to run at once
    pub workers: usize,
    /// Fixed seed for the monkey; random when unset
    pub seed: Option<u64>,

    /// Directory for failure artifacts; nothing is written when unset
    pub artifacts_dir: Option<PathBuf>,
    pub screenshot_on_failure: bool,
}

impl ChaosConfig {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::defaults();
        let on_ci = env::var(ENV_CI).is_ok_and(|v| !v.is_empty() && v != "0" && v != "false");

        Self {
            base_url: env::var(ENV_BASE_URL).unwrap_or(defaults.base_url),
            webdriver_url: env::var(ENV_WEBDRIVER_URL).unwrap_or(defaults.webdriver_url),
            browsers: env::var(ENV_BROWSER)
                .ok()
                .and_then(|s| BrowserKind::parse_list(&s).ok())
                .unwrap_or(defaults.browsers),
            headless: env_parse(ENV_HEADLESS).unwrap_or(defaults.headless),
            form_path: env::var(ENV_FORM_PATH).unwrap_or(defaults.form_path),
            api_path: env::var(ENV_API_PATH).unwrap_or(defaults.api_path),
            api_all_payloads: defaults.api_all_payloads,
            root_selector: env::var(ENV_ROOT_SELECTOR).unwrap_or(defaults.root_selector),
            monkey_rounds: env_parse(ENV_MONKEY_ROUNDS).unwrap_or(defaults.monkey_rounds),
            monkey_delay: env_millis(ENV_MONKEY_DELAY).unwrap_or(defaults.monkey_delay),
            click_timeout: env_millis(ENV_CLICK_TIMEOUT).unwrap_or(defaults.click_timeout),
            navigation_timeout: env_millis(ENV_NAV_TIMEOUT).unwrap_or(defaults.navigation_timeout),
            idle_timeout: env_millis(ENV_IDLE_TIMEOUT).unwrap_or(defaults.idle_timeout),
            scenario_timeout: env_millis(ENV_SCENARIO_TIMEOUT).unwrap_or(defaults.scenario_timeout),
            retries: env_parse(ENV_RETRIES).unwrap_or(if on_ci { CI_RETRIES } else { defaults.retries }),
            workers: env_parse(ENV_WORKERS).unwrap_or(if on_ci { 1 } else { defaults.workers }),
            seed: env_parse(ENV_SEED),
            artifacts_dir: env::var(ENV_ARTIFACTS_DIR).ok().map(PathBuf::from),
            screenshot_on_failure: defaults.screenshot_on_failure,
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            browsers: vec![BrowserKind::Chromium],
            headless: true,
            form_path: DEFAULT_FORM_PATH.to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            api_all_payloads: false,
            root_selector: DEFAULT_ROOT_SELECTOR.to_string(),
            monkey_rounds: DEFAULT_MONKEY_ROUNDS,
            monkey_delay: Duration::from_millis(DEFAULT_MONKEY_DELAY_MS),
            click_timeout: Duration::from_millis(DEFAULT_CLICK_TIMEOUT_MS),
            navigation_timeout: Duration::from_millis(DEFAULT_NAV_TIMEOUT_MS),
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            scenario_timeout: Duration::from_millis(DEFAULT_SCENARIO_TIMEOUT_MS),
            retries: 0,
            workers: DEFAULT_WORKERS,
            seed: None,
            artifacts_dir: None,
            screenshot_on_failure: true,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Shrink every wait; for runs against in-memory backends
    pub fn fast(mut self) -> Self {
        self.monkey_delay = Duration::ZERO;
        self.navigation_timeout = Duration::from_secs(2);
        self.idle_timeout = Duration::from_secs(1);
        self.scenario_timeout = Duration::from_secs(10);
        self
    }

    /// Absolute URL of `path` on the application under test
    pub fn url(&self, path: &str) -> HarnessResult<String> {
        let base = url::Url::parse(&self.base_url)
            .map_err(|e| HarnessError::Config(format!("invalid base URL '{}': {}", self.base_url, e)))?;
        let joined = base
            .join(path)
            .map_err(|e| HarnessError::Config(format!("cannot join '{}' onto base URL: {}", path, e)))?;
        Ok(joined.to_string())
    }

    /// Reject settings that would make a run meaningless or unbounded
    pub fn validate(&self) -> HarnessResult<()> {
        self.url("/")?;
        if self.workers == 0 {
            return Err(HarnessError::Config("workers must be at least 1".into()));
        }
        if self.scenario_timeout.is_zero() {
            return Err(HarnessError::Config("scenario timeout must be positive".into()));
        }
        if self.root_selector.trim().is_empty() {
            return Err(HarnessError::Config("root selector must not be empty".into()));
        }
        if self.browsers.is_empty() {
            return Err(HarnessError::Config("at least one browser is required".into()));
        }
        Ok(())
    }
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_millis(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ChaosConfig::defaults();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.monkey_rounds, 20);
        assert_eq!(config.click_timeout, Duration::from_millis(500));
        assert_eq!(config.retries, 0);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_url_join() {
        let config = ChaosConfig::defaults().with_base_url("https://staging.example.com/app/");
        assert_eq!(
            config.url("/api/test-endpoint").unwrap(),
            "https://staging.example.com/api/test-endpoint"
        );
        assert_eq!(config.url("signup").unwrap(), "https://staging.example.com/app/signup");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = ChaosConfig::defaults().with_base_url("not a url");
        assert!(matches!(config.url("/"), Err(HarnessError::Config(_))));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = ChaosConfig::defaults();
        config.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_browser_matrix_rejected() {
        let mut config = ChaosConfig::defaults();
        assert_eq!(config.browsers, vec![BrowserKind::Chromium]);
        config.browsers.clear();
        assert!(matches!(config.validate(), Err(HarnessError::Config(_))));
    }

    #[test]
    fn test_fast_profile_keeps_bounds() {
        let config = ChaosConfig::defaults().fast();
        assert!(config.monkey_delay.is_zero());
        assert!(!config.scenario_timeout.is_zero());
    }
}
