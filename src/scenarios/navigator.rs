//! Navigation chaos: history traversal without waiting, then a reload.

use crate::browser::{BrowserDriver, BrowserResult, ClickOptions, Locator, WaitUntil};
use crate::config::LINK_SELECTOR;
use crate::harness::ScenarioFailure;

use super::{ScenarioContext, attempt, attempt_if_visible, check_liveness, install_dialog_handler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStep {
    Back,
    Forward,
    Reload,
}

impl HistoryStep {
    pub fn apply(&self, browser: &mut dyn BrowserDriver) -> BrowserResult<()> {
        match self {
            HistoryStep::Back => browser.go_back(),
            HistoryStep::Forward => browser.go_forward(),
            HistoryStep::Reload => browser.reload(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HistoryStep::Back => "go back",
            HistoryStep::Forward => "go forward",
            HistoryStep::Reload => "reload",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Navigator {
    link_selector: String,
    /// Issued back to back, no waits in between
    burst: Vec<HistoryStep>,
}

impl Navigator {
    pub fn standard() -> Self {
        Self {
            link_selector: LINK_SELECTOR.to_string(),
            burst: vec![HistoryStep::Back, HistoryStep::Forward, HistoryStep::Back],
        }
    }

    pub fn with_burst(mut self, burst: Vec<HistoryStep>) -> Self {
        self.burst = burst;
        self
    }

    pub fn run(&self, browser: &mut dyn BrowserDriver, ctx: &ScenarioContext) -> Result<(), ScenarioFailure> {
        let log = &ctx.log;
        let config = &ctx.config;
        install_dialog_handler(browser, log);

        let url = ctx.url("/")?;
        browser
            .goto(&url, WaitUntil::Load, config.navigation_timeout)
            .map_err(|e| ScenarioFailure::driver("open landing page", &e))?;
        log.info(format!("Navigator starting at {}", url));
        check_liveness(browser, ctx, "initial load")?;

        // Build some history if the page has a link to follow
        let link = Locator::new(self.link_selector.clone()).first();
        let followed = attempt_if_visible(browser, log, "follow first link", &link, |b| {
            b.click(&link, ClickOptions::forced(config.navigation_timeout))?;
            b.wait_for_load_state(WaitUntil::DomContentLoaded, config.navigation_timeout)
        });
        if followed.succeeded() {
            if let Ok(current) = browser.current_url() {
                log.info(format!("Followed link to {}", current));
            }
        } else {
            log.info("No link followed; traversing whatever history exists");
        }

        for step in &self.burst {
            attempt(log, step.label(), || step.apply(browser));
        }

        attempt(log, "reload", || HistoryStep::Reload.apply(browser));
        attempt(log, "wait after reload", || {
            browser.wait_for_load_state(WaitUntil::DomContentLoaded, config.navigation_timeout)
        });

        check_liveness(browser, ctx, "history traversal and reload")?;
        if let Ok(current) = browser.current_url() {
            log.info(format!("Navigator ended at {}", current));
        }
        log.info("Navigator survived the history traversal.");
        Ok(())
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MockApp, MockBrowser, MockElement, MockPage};
    use crate::config::ChaosConfig;
    use crate::payload::PayloadCatalog;
    use crate::scenarios::ScenarioKind;
    use std::sync::Arc;

    fn context() -> ScenarioContext {
        ScenarioContext::new(
            ScenarioKind::Navigator,
            Arc::new(ChaosConfig::defaults().fast()),
            Arc::new(PayloadCatalog::standard()),
        )
    }

    #[test]
    fn test_demo_survives_traversal() {
        let ctx = context();
        let mut browser = MockBrowser::new(MockApp::demo());
        Navigator::standard().run(&mut browser, &ctx).unwrap();

        // back, forward, back lands on the page the link was followed from
        assert_eq!(browser.current_url().unwrap(), "http://localhost:3000/");
        assert_eq!(
            browser.stats().navigations,
            vec!["/", "/about", "/", "/about", "/", "/"]
        );
        assert!(ctx.log.contains("Navigator survived the history traversal."));
    }

    #[test]
    fn test_page_without_links_passes() {
        let ctx = context();
        let app = MockApp::new().page(MockPage::new("/").element(MockElement::button("only")));
        let mut browser = MockBrowser::new(app);
        Navigator::standard().run(&mut browser, &ctx).unwrap();
        assert!(ctx.log.contains("No link followed"));
    }

    #[test]
    fn test_reload_crash_fails_liveness() {
        let ctx = context();
        let app = MockApp::new()
            .page(MockPage::new("/").element(MockElement::link("/fragile")))
            .page(MockPage::new("/fragile").crash_on_reload());
        let mut browser = MockBrowser::new(app);
        let err = Navigator::standard()
            .with_burst(vec![HistoryStep::Back, HistoryStep::Forward])
            .run(&mut browser, &ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            ScenarioFailure::LivenessViolation { ref stage, .. } if stage == "history traversal and reload"
        ));
    }
}
