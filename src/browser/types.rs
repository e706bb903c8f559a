// Core types shared by every browser backend

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Declarative description of zero or more elements on the live page.
///
/// A locator is resolved by the driver at the moment of use. Nothing about
/// the matched elements is cached, so a locator stays valid across navigations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// CSS selector (comma-separated alternatives allowed)
    pub selector: String,

    /// Restrict to the n-th match (in document order)
    pub index: Option<usize>,
}

impl Locator {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            index: None,
        }
    }

    /// First match only
    pub fn first(&self) -> Self {
        self.nth(0)
    }

    /// The n-th match only
    pub fn nth(&self, index: usize) -> Self {
        Self {
            selector: self.selector.clone(),
            index: Some(index),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{} >> nth={}", self.selector, i),
            None => f.write_str(&self.selector),
        }
    }
}

/// How far a navigation must progress before a wait returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    /// DOM constructed, subresources may still be loading
    DomContentLoaded,
    /// Load event fired
    Load,
    /// Load event fired and no new network activity for a quiet period
    NetworkIdle,
}

/// Options for a click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickOptions {
    /// Upper bound for the whole click
    pub timeout: Duration,

    /// Skip actionability/occlusion checks
    pub force: bool,
}

impl ClickOptions {
    pub fn forced(timeout: Duration) -> Self {
        Self {
            timeout,
            force: true,
        }
    }
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            force: false,
        }
    }
}

/// Kind of native modal dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    Alert,
    Confirm,
    Prompt,
    BeforeUnload,
}

/// A native modal dialog raised by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    pub kind: DialogKind,
    pub message: String,
}

/// What a dialog handler wants done with the dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogAction {
    Dismiss,
    Accept,
}

/// Callback invoked out-of-band by the driver whenever a dialog opens
pub type DialogHandler = Box<dyn FnMut(&Dialog) -> DialogAction + Send>;

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Error types for browser operations
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// A bounded wait or action ran out of time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Locator resolved to no element
    #[error("no element matches {0}")]
    NotFound(String),

    /// A dialog is open and nobody handled it
    #[error("page blocked by unhandled dialog: {0}")]
    DialogBlocked(String),

    /// Session could not be created or was lost
    #[error("session error: {0}")]
    Session(String),

    /// Driver answered with an error or an unexpected payload
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport error talking to the driver
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrowserError {
    pub fn is_timeout(&self) -> bool {
        match self {
            BrowserError::Timeout(_) => true,
            BrowserError::Http(err) => err.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_nth_keeps_selector() {
        let all = Locator::new("button, a[href^=\"/\"]");
        let third = all.nth(2);
        assert_eq!(third.selector, all.selector);
        assert_eq!(third.index, Some(2));
        assert_eq!(all.first().index, Some(0));
        assert_eq!(all.index, None);
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::new("a[href]").to_string(), "a[href]");
        assert_eq!(Locator::new("a[href]").nth(3).to_string(), "a[href] >> nth=3");
    }

    #[test]
    fn test_timeout_classification() {
        assert!(BrowserError::Timeout(Duration::from_millis(500)).is_timeout());
        assert!(!BrowserError::NotFound("#x".into()).is_timeout());
    }
}
