//! Browser automation capability consumed by the chaos scenarios.
//!
//! The harness never drives a browser itself. Scenarios talk to a
//! `BrowserDriver`, which may be:
//! - `WebDriverBrowser` for a real browser behind a W3C WebDriver endpoint
//! - `MockBrowser` for tests and the built-in demo application

use std::time::Duration;

use super::types::{BrowserResult, ClickOptions, DialogHandler, Locator, WaitUntil};

/// Trait for browser backends
///
/// One driver owns exactly one page. Implementations must bound every wait by
/// the timeout they are given.
pub trait BrowserDriver: Send {
    /// Load a URL and wait until it reaches `wait`
    fn goto(&mut self, url: &str, wait: WaitUntil, timeout: Duration) -> BrowserResult<()>;

    /// Wait for the current page to reach a load state
    fn wait_for_load_state(&mut self, wait: WaitUntil, timeout: Duration) -> BrowserResult<()>;

    /// URL of the current page
    fn current_url(&mut self) -> BrowserResult<String>;

    /// Number of elements currently matching the locator (visible or not)
    fn count(&mut self, locator: &Locator) -> BrowserResult<usize>;

    /// Whether the resolved element exists and is visible. A locator without
    /// an index refers to its first match.
    fn is_visible(&mut self, locator: &Locator) -> BrowserResult<bool>;

    /// Replace the element's value with `text`
    fn fill(&mut self, locator: &Locator, text: &str) -> BrowserResult<()>;

    /// Empty the element's value
    fn clear(&mut self, locator: &Locator) -> BrowserResult<()>;

    /// Move focus away from the element, firing blur/change handlers
    fn blur(&mut self, locator: &Locator) -> BrowserResult<()>;

    /// Current value of an input-like element
    fn input_value(&mut self, locator: &Locator) -> BrowserResult<String>;

    /// Click the element. Fails with `BrowserError::Timeout` when the click
    /// does not complete within `options.timeout`.
    fn click(&mut self, locator: &Locator, options: ClickOptions) -> BrowserResult<()>;

    fn go_back(&mut self) -> BrowserResult<()>;

    fn go_forward(&mut self) -> BrowserResult<()>;

    fn reload(&mut self) -> BrowserResult<()>;

    /// Register the handler invoked whenever a native dialog opens.
    /// Replaces any previously registered handler.
    fn on_dialog(&mut self, handler: DialogHandler);

    /// PNG bytes of the current viewport
    fn screenshot(&mut self) -> BrowserResult<Vec<u8>>;

    /// Release the page and its browser context
    fn close(&mut self) -> BrowserResult<()>;

    /// Backend identifier (e.g., "webdriver", "mock")
    fn source_type(&self) -> &str;
}

/// Opens a fresh, isolated driver for each scenario
pub trait BrowserFactory: Send + Sync {
    fn open(&self) -> BrowserResult<Box<dyn BrowserDriver>>;
}
