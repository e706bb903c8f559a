pub mod backend;
pub mod mock;
pub mod types;
pub mod webdriver;

pub use backend::{BrowserDriver, BrowserFactory};
pub use mock::{ClickEffect, MockApp, MockBrowser, MockBrowserFactory, MockElement, MockPage, MockStats};
pub use types::{
    BrowserError, BrowserResult, ClickOptions, Dialog, DialogAction, DialogHandler, DialogKind,
    Locator, WaitUntil,
};
pub use webdriver::{BrowserKind, WebDriverBrowser, WebDriverConfig, WebDriverFactory};
