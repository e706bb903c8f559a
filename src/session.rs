//! Browser sessions with guaranteed teardown.
//!
//! Provides per-scenario browser ownership with:
//! - A fresh driver from the factory for every scenario run
//! - A unique session ID and, optionally, an artifact directory
//! - Closing the browser on drop, whatever way the scenario ended

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::browser::{BrowserDriver, BrowserFactory, BrowserResult};
use crate::harness::HarnessResult;

/// One browser owned by one scenario run
pub struct BrowserSession {
    /// Unique session ID
    pub id: String,
    /// Artifact directory for this session, when artifacts are enabled
    pub dir: Option<PathBuf>,
    driver: Box<dyn BrowserDriver>,
}

impl BrowserSession {
    /// Open a fresh browser named after the scenario
    pub fn open(
        factory: &dyn BrowserFactory,
        name: &str,
        artifacts_root: Option<&Path>,
    ) -> BrowserResult<Self> {
        let driver = factory.open()?;
        Ok(Self::with_driver(driver, name, artifacts_root))
    }

    /// Wrap an already opened driver
    pub fn with_driver(driver: Box<dyn BrowserDriver>, name: &str, artifacts_root: Option<&Path>) -> Self {
        let id = format!("{}_{}", sanitize_name(name), generate_session_id());
        let dir = artifacts_root.map(|root| root.join(&id));
        tracing::debug!(session = %id, source = driver.source_type(), "browser session opened");
        Self { id, dir, driver }
    }

    pub fn driver(&mut self) -> &mut dyn BrowserDriver {
        self.driver.as_mut()
    }

    /// Create the artifact directory and write session metadata
    pub fn init(&self) -> HarnessResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        fs::create_dir_all(dir)?;

        let metadata = serde_json::json!({
            "id": self.id,
            "created": chrono::Utc::now().to_rfc3339(),
            "browser": self.driver.source_type(),
        });
        fs::write(dir.join(".session.json"), serde_json::to_string_pretty(&metadata)?)?;
        Ok(())
    }

    /// Path for an artifact of this session
    pub fn artifact_path(&self, name: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.png", sanitize_name(name))))
    }

    /// Screenshot the page into the artifact directory.
    ///
    /// Returns `Ok(None)` when artifacts are disabled.
    pub fn capture_failure_screenshot(&mut self, label: &str) -> HarnessResult<Option<PathBuf>> {
        let Some(path) = self.artifact_path(&format!("failure_{}", label)) else {
            return Ok(None);
        };
        self.init()?;
        let png = self.driver.screenshot()?;
        fs::write(&path, png)?;
        tracing::info!(session = %self.id, path = %path.display(), "failure screenshot saved");
        Ok(Some(path))
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Err(e) = self.driver.close() {
            tracing::warn!(session = %self.id, error = %e, "failed to close browser");
        }
    }
}

/// Generate a unique session suffix
fn generate_session_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let pid = std::process::id();
    format!("{}_{}", timestamp, pid)
}

/// Sanitize a name for use in filenames
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MockApp, MockBrowserFactory, WaitUntil};
    use std::time::Duration;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("input fuzzer"), "input_fuzzer");
        assert_eq!(sanitize_name("a/b\\c"), "a_b_c");
    }

    #[test]
    fn test_drop_closes_browser() {
        let factory = MockBrowserFactory::new(MockApp::demo());
        {
            let session = BrowserSession::open(&factory, "monkey", None).unwrap();
            assert!(session.id.starts_with("monkey_"));
            assert!(session.dir.is_none());
        }
        let stats = factory.stats();
        assert_eq!(stats.sessions_opened, 1);
        assert_eq!(stats.sessions_closed, 1);
    }

    #[test]
    fn test_screenshot_disabled_without_dir() {
        let factory = MockBrowserFactory::new(MockApp::demo());
        let mut session = BrowserSession::open(&factory, "navigator", None).unwrap();
        assert_eq!(session.capture_failure_screenshot("liveness").unwrap(), None);
    }

    #[test]
    fn test_screenshot_written_to_session_dir() {
        let root = tempfile::tempdir().unwrap();
        let factory = MockBrowserFactory::new(MockApp::demo());
        let mut session = BrowserSession::open(&factory, "monkey", Some(root.path())).unwrap();
        session
            .driver()
            .goto("http://localhost:3000/", WaitUntil::Load, Duration::from_secs(1))
            .unwrap();

        let path = session.capture_failure_screenshot("attempt 1").unwrap().unwrap();
        assert!(path.ends_with("failure_attempt_1.png"));
        assert!(path.starts_with(root.path()));
        assert!(fs::read(&path).unwrap().starts_with(&[0x89, b'P', b'N', b'G']));
        assert!(session.dir.as_ref().unwrap().join(".session.json").exists());
    }
}
