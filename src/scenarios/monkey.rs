//! Interaction monkey: random forced clicks over a frozen element population.
//!
//! The interactive elements are counted once after the landing page settles;
//! each round then picks an index into that population. Elements may vanish or
//! move after a navigation, which is exactly the instability being probed, so
//! a missed click is logged and the monkey moves on.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

use crate::browser::{BrowserDriver, ClickOptions, Locator, WaitUntil};
use crate::config::{ChaosConfig, INTERACTIVE_SELECTOR};
use crate::harness::{InteractionOutcome, ScenarioFailure};

use super::{ScenarioContext, attempt, attempt_if_visible, check_liveness, install_dialog_handler};

/// What happened over all rounds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonkeyTally {
    pub population: usize,
    pub rounds_run: u32,
    pub clicked: u32,
    pub skipped: u32,
    pub missed: u32,
    /// Seed that reproduces the click sequence
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct Monkey {
    selector: String,
    rounds: u32,
    delay: Duration,
    click_timeout: Duration,
    seed: Option<u64>,
}

impl Monkey {
    pub fn from_config(config: &ChaosConfig) -> Self {
        Self {
            selector: INTERACTIVE_SELECTOR.to_string(),
            rounds: config.monkey_rounds,
            delay: config.monkey_delay,
            click_timeout: config.click_timeout,
            seed: config.seed,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn run(&self, browser: &mut dyn BrowserDriver, ctx: &ScenarioContext) -> Result<MonkeyTally, ScenarioFailure> {
        let log = &ctx.log;
        let config = &ctx.config;
        install_dialog_handler(browser, log);

        let url = ctx.url("/")?;
        browser
            .goto(&url, WaitUntil::DomContentLoaded, config.navigation_timeout)
            .map_err(|e| ScenarioFailure::driver("open landing page", &e))?;
        // Settling is best effort; pages with long-polling never go idle
        attempt(log, "wait for network idle", || {
            browser.wait_for_load_state(WaitUntil::NetworkIdle, config.idle_timeout)
        });

        let population = Locator::new(self.selector.clone());
        let count = browser
            .count(&population)
            .map_err(|e| ScenarioFailure::driver("count interactive elements", &e))?;
        log.info(format!("Monkey found {} clickable elements.", count));

        let seed = self.seed.unwrap_or_else(rand::random);
        log.info(format!("Monkey seed: {}", seed));
        let mut rng = StdRng::seed_from_u64(seed);

        let mut tally = MonkeyTally {
            population: count,
            seed,
            ..MonkeyTally::default()
        };
        if count > 0 {
            for _ in 0..self.rounds {
                let index = rng.gen_range(0..count);
                let target = population.nth(index);
                let outcome = attempt_if_visible(
                    browser,
                    log,
                    &format!("click {}", target),
                    &target,
                    |b| b.click(&target, ClickOptions::forced(self.click_timeout)),
                );
                tally.rounds_run += 1;
                match outcome {
                    InteractionOutcome::Succeeded => tally.clicked += 1,
                    InteractionOutcome::SkippedNotVisible => tally.skipped += 1,
                    InteractionOutcome::FailedTimedOut | InteractionOutcome::Failed(_) => {
                        tally.missed += 1;
                        log.info(format!("Monkey missed click on element {}", index));
                    }
                }
                if !self.delay.is_zero() {
                    thread::sleep(self.delay);
                }
            }
        }

        log.info(format!(
            "Monkey finished {} rounds: {} clicked, {} skipped, {} missed",
            tally.rounds_run, tally.clicked, tally.skipped, tally.missed
        ));
        check_liveness(browser, ctx, "random clicking")?;
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{ClickEffect, MockApp, MockBrowser, MockElement, MockPage};
    use crate::payload::PayloadCatalog;
    use crate::scenarios::ScenarioKind;
    use std::sync::Arc;

    fn context() -> ScenarioContext {
        ScenarioContext::new(
            ScenarioKind::Monkey,
            Arc::new(ChaosConfig::defaults().fast().with_seed(7)),
            Arc::new(PayloadCatalog::standard()),
        )
    }

    #[test]
    fn test_demo_survives_twenty_rounds() {
        let ctx = context();
        let mut browser = MockBrowser::new(MockApp::demo());
        let tally = Monkey::from_config(&ctx.config).run(&mut browser, &ctx).unwrap();

        assert_eq!(tally.population, 6);
        assert_eq!(tally.rounds_run, 20);
        assert_eq!(tally.clicked + tally.skipped + tally.missed, 20);
        assert_eq!(tally.seed, 7);
        assert!(ctx.log.contains("Monkey found 6 clickable elements."));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let first = context();
        let second = context();
        let a = Monkey::from_config(&first.config)
            .run(&mut MockBrowser::new(MockApp::demo()), &first)
            .unwrap();
        let b = Monkey::from_config(&second.config)
            .run(&mut MockBrowser::new(MockApp::demo()), &second)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_page_passes_without_clicks() {
        let ctx = context();
        let app = MockApp::new().page(MockPage::new("/"));
        let mut browser = MockBrowser::new(app);
        let tally = Monkey::from_config(&ctx.config).run(&mut browser, &ctx).unwrap();
        assert_eq!(tally.population, 0);
        assert_eq!(tally.rounds_run, 0);
        assert_eq!(browser.stats().clicks, 0);
        assert!(ctx.log.contains("Monkey found 0 clickable elements."));
    }

    #[test]
    fn test_hanging_element_counts_as_miss() {
        let ctx = context();
        let app = MockApp::new()
            .page(MockPage::new("/").element(MockElement::button("slow").on_click(ClickEffect::Hang)));
        let mut browser = MockBrowser::new(app);
        let tally = Monkey::from_config(&ctx.config)
            .with_rounds(3)
            .run(&mut browser, &ctx)
            .unwrap();
        assert_eq!(tally.missed, 3);
        assert!(ctx.log.contains("Monkey missed click on element 0"));
    }

    #[test]
    fn test_crashing_element_fails_liveness() {
        let ctx = context();
        let app = MockApp::new()
            .page(MockPage::new("/").element(MockElement::button("boom").on_click(ClickEffect::Crash)));
        let mut browser = MockBrowser::new(app);
        let err = Monkey::from_config(&ctx.config)
            .with_rounds(1)
            .run(&mut browser, &ctx)
            .unwrap_err();
        assert!(matches!(err, ScenarioFailure::LivenessViolation { .. }));
    }
}
