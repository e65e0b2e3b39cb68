//! ---
//! dss_section: "02-decision-support-core"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "What-if dosage scenarios submitted to the prediction service."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;
use wtp_dss_common::config::AppConfig;

use crate::dosage::DosageRange;
use crate::errors::Result;
use crate::http::{build_client, decode_json, transport_error};
use crate::state::{AppliedScenario, SharedPanelState};
use crate::visualizer::{OutcomeVisualizer, VisualizeOutcome};

/// Body of the simulation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub proposed_dosage: f64,
}

/// Verdict returned by the prediction service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScenarioStatus {
    Safe,
    CriticalViolation,
    Other(String),
}

impl ScenarioStatus {
    pub const SAFE_LABEL: &'static str = "Safe";
    pub const CRITICAL_LABEL: &'static str = "CRITICAL VIOLATION";

    pub fn is_safe(&self) -> bool {
        matches!(self, ScenarioStatus::Safe)
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, ScenarioStatus::CriticalViolation)
    }

    pub fn label(&self) -> &str {
        match self {
            ScenarioStatus::Safe => Self::SAFE_LABEL,
            ScenarioStatus::CriticalViolation => Self::CRITICAL_LABEL,
            ScenarioStatus::Other(label) => label,
        }
    }
}

impl From<String> for ScenarioStatus {
    fn from(value: String) -> Self {
        let normalised = value
            .trim()
            .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        match normalised.as_str() {
            "SAFE" => ScenarioStatus::Safe,
            "CRITICAL VIOLATION" => ScenarioStatus::CriticalViolation,
            _ => ScenarioStatus::Other(value),
        }
    }
}

impl From<&str> for ScenarioStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<ScenarioStatus> for String {
    fn from(value: ScenarioStatus) -> Self {
        match value {
            ScenarioStatus::Other(label) => label,
            known => known.label().to_owned(),
        }
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scenario parameters echoed back by the service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioEcho {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_dosage: Option<f64>,
    #[serde(flatten)]
    pub derived: IndexMap<String, serde_json::Value>,
}

/// Predicted outcome of a dosage scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub predicted_effluent_turbidity: f64,
    pub daily_chemical_cost: f64,
    pub status: ScenarioStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<ScenarioEcho>,
}

/// Access to the predictive service.
#[async_trait]
pub trait ScenarioService: Send + Sync + 'static {
    async fn simulate(&self, request: &ScenarioRequest) -> Result<ScenarioResult>;
}

/// `POST <endpoint>` with `{ "proposed_dosage": f64 }`.
///
/// Works against the first-party `/simulate` route as well as automation
/// webhooks that answer with the same body.
#[derive(Debug, Clone)]
pub struct HttpScenarioService {
    client: Client,
    endpoint: Url,
}

impl HttpScenarioService {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self> {
        let client = build_client(&endpoint, timeout)?;
        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.simulation_endpoint()?,
            config.simulation.request_timeout,
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ScenarioService for HttpScenarioService {
    async fn simulate(&self, request: &ScenarioRequest) -> Result<ScenarioResult> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|source| transport_error(&self.endpoint, source))?;
        decode_json(&self.endpoint, response).await
    }
}

/// What happened to one `run_scenario` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub sequence: u64,
    pub result: ScenarioResult,
    /// False when a newer run had already been applied.
    pub applied: bool,
    pub visualization: Option<VisualizeOutcome>,
}

/// Submits operator scenarios and publishes the newest applied result.
pub struct ScenarioRunner {
    service: Arc<dyn ScenarioService>,
    range: DosageRange,
    state: SharedPanelState,
    visualizer: Option<Arc<OutcomeVisualizer>>,
    issued: AtomicU64,
    /// Sequence of the last applied response. Held while storing and
    /// visualising so overlapping runs never interleave their overrides.
    applied: Mutex<u64>,
}

impl ScenarioRunner {
    pub fn new(
        service: Arc<dyn ScenarioService>,
        range: DosageRange,
        state: SharedPanelState,
        visualizer: Option<Arc<OutcomeVisualizer>>,
    ) -> Self {
        Self {
            service,
            range,
            state,
            visualizer,
            issued: AtomicU64::new(0),
            applied: Mutex::new(0),
        }
    }

    pub fn range(&self) -> DosageRange {
        self.range
    }

    pub fn has_visualizer(&self) -> bool {
        self.visualizer.is_some()
    }

    /// Latest applied result, if any run has succeeded.
    pub fn latest(&self) -> Option<ScenarioResult> {
        self.state
            .read()
            .scenario
            .as_ref()
            .map(|applied| applied.result.clone())
    }

    /// Submit `dosage` to the prediction service.
    ///
    /// On failure the previous result stays in place. A response is only
    /// applied when no newer run has been applied before it arrived.
    pub async fn run_scenario(&self, dosage: f64) -> Result<RunOutcome> {
        let dosage = self.range.check(dosage)?;
        let sequence = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let request = ScenarioRequest {
            proposed_dosage: dosage,
        };
        debug!(sequence, dosage, "submitting scenario");

        let response = self.service.simulate(&request).await;

        let mut last_applied = self.applied.lock();
        let result = match response {
            Ok(result) => result,
            Err(err) => {
                warn!(sequence, dosage, error = %err, "scenario submission failed");
                if sequence > *last_applied {
                    self.state
                        .write()
                        .scenario_health
                        .record_failure(Utc::now(), err.to_string());
                }
                return Err(err);
            }
        };

        if sequence <= *last_applied {
            info!(
                sequence,
                latest = *last_applied,
                "discarding superseded scenario response"
            );
            return Ok(RunOutcome {
                sequence,
                result,
                applied: false,
                visualization: None,
            });
        }
        *last_applied = sequence;

        {
            let mut state = self.state.write();
            let now = Utc::now();
            state.scenario = Some(AppliedScenario {
                sequence,
                dosage,
                result: result.clone(),
                applied_at: now,
            });
            state.scenario_health.record_success(now);
        }
        info!(
            sequence,
            dosage,
            turbidity = result.predicted_effluent_turbidity,
            cost = result.daily_chemical_cost,
            status = %result.status,
            "scenario applied"
        );

        let visualization = self
            .visualizer
            .as_ref()
            .map(|visualizer| visualizer.visualize(&result.status, result.predicted_effluent_turbidity));

        Ok(RunOutcome {
            sequence,
            result,
            applied: true,
            visualization,
        })
    }

    /// Re-derive the viewport override from the latest applied result.
    pub fn reapply_visualization(&self) -> Option<VisualizeOutcome> {
        let visualizer = self.visualizer.as_ref()?;
        let _serialised = self.applied.lock();
        let latest = self.latest()?;
        Some(visualizer.visualize(&latest.status, latest.predicted_effluent_turbidity))
    }
}

impl fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("range", &self.range)
            .field("issued", &self.issued.load(Ordering::Relaxed))
            .field("visualizer", &self.visualizer.is_some())
            .finish()
    }
}
