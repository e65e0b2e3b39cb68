//! ---
//! dss_section: "02-decision-support-core"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Shared panel state written by the poller and the scenario runner."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::scenario::ScenarioResult;
use crate::telemetry::TelemetrySnapshot;

pub type SharedPanelState = Arc<RwLock<PanelState>>;

/// Outcome history of one remote channel (telemetry or simulation).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchHealth {
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub total_failures: u64,
}

impl FetchHealth {
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.last_success_at = Some(at);
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self, at: DateTime<Utc>, error: impl Into<String>) {
        self.last_failure_at = Some(at);
        self.last_error = Some(error.into());
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.total_failures += 1;
    }

    /// True while the most recent attempt failed.
    pub fn is_failing(&self) -> bool {
        self.consecutive_failures > 0
    }
}

/// Scenario result together with the request sequence that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedScenario {
    pub sequence: u64,
    pub dosage: f64,
    pub result: ScenarioResult,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PanelState {
    pub telemetry: Option<TelemetrySnapshot>,
    pub telemetry_health: FetchHealth,
    pub scenario: Option<AppliedScenario>,
    pub scenario_health: FetchHealth,
    /// Bumped whenever a poller starts or is cancelled; writes carrying an
    /// older generation are dropped.
    pub(crate) poll_generation: u64,
}

impl PanelState {
    pub fn shared() -> SharedPanelState {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn poll_generation(&self) -> u64 {
        self.poll_generation
    }
}
