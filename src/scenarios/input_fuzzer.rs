//! Input fuzzer: writes malformed and oversized payloads into form fields.
//!
//! Fields are located by role heuristics. An absent or hidden field is a valid
//! page configuration and is skipped. No assertion is made about sanitised
//! values; only that the page survives.

use std::fmt;

use crate::browser::{BrowserDriver, Locator, WaitUntil};
use crate::config::{AGE_FIELD_SELECTOR, EMAIL_FIELD_SELECTOR, PRICE_FIELD_SELECTOR};
use crate::harness::{InteractionOutcome, ScenarioFailure};
use crate::payload::PayloadTag;

use super::{ScenarioContext, attempt, check_liveness, install_dialog_handler};

/// Semantic role of a form field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Age,
    Email,
    Price,
}

impl FieldRole {
    pub fn selector(&self) -> &'static str {
        match self {
            FieldRole::Age => AGE_FIELD_SELECTOR,
            FieldRole::Email => EMAIL_FIELD_SELECTOR,
            FieldRole::Price => PRICE_FIELD_SELECTOR,
        }
    }

    /// What gets done to a field of this role, in order
    pub fn plan(&self) -> &'static [FieldStep] {
        match self {
            FieldRole::Age => &[
                FieldStep::Fill(PayloadTag::OutOfRangeNumber),
                FieldStep::Blur,
                FieldStep::RecordValue,
            ],
            FieldRole::Email => &[
                FieldStep::Fill(PayloadTag::OversizedText),
                FieldStep::Clear,
                FieldStep::Fill(PayloadTag::ScriptInjection),
                FieldStep::Blur,
            ],
            FieldRole::Price => &[
                FieldStep::Fill(PayloadTag::NonAsciiText),
                FieldStep::Blur,
                FieldStep::RecordValue,
            ],
        }
    }
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRole::Age => write!(f, "age"),
            FieldRole::Email => write!(f, "email"),
            FieldRole::Price => write!(f, "price"),
        }
    }
}

/// One action against a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStep {
    Fill(PayloadTag),
    Clear,
    /// Fire blur/change so the field's validation runs
    Blur,
    /// Log the resulting value (observational only)
    RecordValue,
}

/// A field to fuzz: its role and where to find it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProbe {
    pub role: FieldRole,
    pub locator: Locator,
}

impl FieldProbe {
    /// First field matching the role's heuristic selector
    pub fn for_role(role: FieldRole) -> Self {
        Self {
            role,
            locator: Locator::new(role.selector()).first(),
        }
    }
}

pub struct InputFuzzer {
    probes: Vec<FieldProbe>,
}

impl InputFuzzer {
    /// Age, email and price fields
    pub fn standard() -> Self {
        Self::with_probes(vec![
            FieldProbe::for_role(FieldRole::Age),
            FieldProbe::for_role(FieldRole::Email),
            FieldProbe::for_role(FieldRole::Price),
        ])
    }

    pub fn with_probes(probes: Vec<FieldProbe>) -> Self {
        Self { probes }
    }

    pub fn run(&self, browser: &mut dyn BrowserDriver, ctx: &ScenarioContext) -> Result<(), ScenarioFailure> {
        let log = &ctx.log;
        install_dialog_handler(browser, log);

        let url = ctx.url(&ctx.config.form_path)?;
        browser
            .goto(&url, WaitUntil::DomContentLoaded, ctx.config.navigation_timeout)
            .map_err(|e| ScenarioFailure::driver("open form page", &e))?;
        log.info(format!("Fuzzing form fields on {}", url));

        for probe in &self.probes {
            let outcomes = self.probe_field(browser, ctx, probe);
            // The page must stay renderable immediately after every field
            check_liveness(browser, ctx, &format!("fuzzing the {} field", probe.role))?;
            if !outcomes.is_empty() {
                let ok = outcomes.iter().filter(|o| o.succeeded()).count();
                log.info(format!(
                    "{} field: {}/{} steps succeeded",
                    probe.role,
                    ok,
                    outcomes.len()
                ));
            }
        }
        Ok(())
    }

    fn probe_field(
        &self,
        browser: &mut dyn BrowserDriver,
        ctx: &ScenarioContext,
        probe: &FieldProbe,
    ) -> Vec<InteractionOutcome> {
        let log = &ctx.log;
        match browser.is_visible(&probe.locator) {
            Ok(true) => {}
            Ok(false) => {
                log.info(format!("No visible {} field, skipping", probe.role));
                return Vec::new();
            }
            Err(e) => {
                log.warn(format!("Could not look up the {} field: {}", probe.role, e));
                return Vec::new();
            }
        }

        let target = &probe.locator;
        let mut outcomes = Vec::new();
        for step in probe.role.plan() {
            let outcome = match step {
                FieldStep::Fill(tag) => {
                    let payload = ctx.payloads.get(*tag);
                    log.info(format!("{} <- {} ({})", probe.role, tag, payload.preview()));
                    attempt(log, &format!("fill {} with {}", probe.role, tag), || {
                        browser.fill(target, payload.value())
                    })
                }
                FieldStep::Clear => attempt(log, &format!("clear {}", probe.role), || browser.clear(target)),
                FieldStep::Blur => attempt(log, &format!("blur {}", probe.role), || browser.blur(target)),
                FieldStep::RecordValue => match browser.input_value(target) {
                    Ok(value) => {
                        log.info(format!("{} input value after fuzzing: {:?}", probe.role, value));
                        InteractionOutcome::Succeeded
                    }
                    Err(e) => attempt(log, &format!("read {} value", probe.role), || Err(e)),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

impl Default for InputFuzzer {
    fn default() -> Self {
        Self::standard()
    }
}
