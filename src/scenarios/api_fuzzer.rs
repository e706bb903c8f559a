//! API fuzzer: posts catalog payloads straight to a backend endpoint.
//!
//! 2xx and 4xx are both acceptable; rejecting garbage with a client error is
//! correct behaviour. Any 5xx is a backend fault and ends the scenario.

use serde_json::{Map, Value};

use crate::config::ChaosConfig;
use crate::harness::ScenarioFailure;
use crate::http::HttpClient;
use crate::payload::{PayloadCatalog, PayloadTag};

use super::ScenarioContext;

/// One request: a single JSON field carrying a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiProbe {
    pub field: String,
    pub tag: PayloadTag,
}

impl ApiProbe {
    pub fn new(field: &str, tag: PayloadTag) -> Self {
        Self {
            field: field.to_string(),
            tag,
        }
    }

    /// Oversized comment, then an injection-shaped username
    pub fn standard() -> Vec<ApiProbe> {
        vec![
            ApiProbe::new("comment", PayloadTag::OversizedText),
            ApiProbe::new("username", PayloadTag::SqlInjection),
        ]
    }

    /// The standard probes plus every remaining payload under `input`
    pub fn exhaustive(catalog: &PayloadCatalog) -> Vec<ApiProbe> {
        let mut probes = Self::standard();
        for payload in catalog.iter() {
            if !probes.iter().any(|p| p.tag == payload.tag) {
                probes.push(ApiProbe::new("input", payload.tag));
            }
        }
        probes
    }

    pub fn body(&self, catalog: &PayloadCatalog) -> Value {
        let mut fields = Map::new();
        fields.insert(self.field.clone(), Value::String(catalog.value(self.tag).to_string()));
        Value::Object(fields)
    }
}

#[derive(Debug, Clone)]
pub struct ApiFuzzer {
    path: String,
    probes: Vec<ApiProbe>,
}

impl ApiFuzzer {
    pub fn from_config(config: &ChaosConfig) -> Self {
        let probes = if config.api_all_payloads {
            ApiProbe::exhaustive(&PayloadCatalog::standard())
        } else {
            ApiProbe::standard()
        };
        Self::new(&config.api_path, probes)
    }

    pub fn new(path: &str, probes: Vec<ApiProbe>) -> Self {
        Self {
            path: path.to_string(),
            probes,
        }
    }

    pub fn probes(&self) -> &[ApiProbe] {
        &self.probes
    }

    /// Send every probe in order; returns the statuses seen
    pub fn run(&self, client: &dyn HttpClient, ctx: &ScenarioContext) -> Result<Vec<u16>, ScenarioFailure> {
        let log = &ctx.log;
        let url = ctx.url(&self.path)?;
        let mut statuses = Vec::with_capacity(self.probes.len());

        for probe in &self.probes {
            let body = probe.body(&ctx.payloads);
            let response = client.post_json(&url, &body).map_err(|e| ScenarioFailure::Transport {
                url: url.clone(),
                detail: e.to_string(),
            })?;
            log.info(format!(
                "POST {} {{{}: {}}} -> {}",
                url,
                probe.field,
                ctx.payloads.get(probe.tag).preview(),
                response.status
            ));
            tracing::debug!(field = %probe.field, tag = %probe.tag, status = response.status, "api probe");

            if response.is_server_fault() {
                return Err(ScenarioFailure::BackendFault {
                    url,
                    field: probe.field.clone(),
                    status: response.status,
                });
            }
            statuses.push(response.status);
        }
        Ok(statuses)
    }
}
