//! ---
//! dss_section: "02-decision-support-core"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Render-agnostic view model of the decision support panel."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use serde::Serialize;
use strum::{AsRefStr, Display};
use wtp_dss_common::config::{DisplayConfig, DisplayField};

use crate::scenario::{ScenarioResult, ScenarioStatus};
use crate::state::PanelState;
use crate::viewer::Rgb;

pub const CONNECTING_PLACEHOLDER: &str = "Connecting to SCADA...";
pub const MISSING_READING: &str = "--";
pub const FETCH_FAILED_MARKER: &str = "last fetch failed";
pub const DOSAGE_LABEL: &str = "Adjust Alum Dosage (mg/L)";

/// Result card styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Theme {
    Safe,
    Alert,
}

impl Theme {
    pub fn for_status(status: &ScenarioStatus) -> Self {
        if status.is_safe() {
            Theme::Safe
        } else {
            Theme::Alert
        }
    }

    pub fn accent(&self) -> Rgb {
        match self {
            Theme::Safe => Rgb::new(0x2e, 0xcc, 0x71),
            Theme::Alert => Rgb::new(0xe7, 0x4c, 0x3c),
        }
    }
}

/// One formatted live reading, e.g. `Flow: 1250.0 m3/hr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadingLine {
    pub label: String,
    pub value: String,
}

impl ReadingLine {
    fn render(field: &DisplayField, reading: Option<f64>) -> Self {
        let value = match reading {
            Some(value) if field.unit.is_empty() => format!("{:.*}", field.precision, value),
            Some(value) => format!("{:.*} {}", field.precision, value, field.unit),
            None => MISSING_READING.to_owned(),
        };
        Self {
            label: field.label.clone(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LiveSection {
    /// No snapshot received since activation.
    Connecting,
    Readings { lines: Vec<ReadingLine> },
}

/// Formatted scenario result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultView {
    pub turbidity: String,
    pub cost: String,
    pub status: String,
    pub theme: Theme,
}

impl ResultView {
    pub fn from_result(result: &ScenarioResult) -> Self {
        Self {
            turbidity: format!("{} NTU", result.predicted_effluent_turbidity),
            cost: format!("${}/day", result.daily_chemical_cost),
            status: result.status.label().to_owned(),
            theme: Theme::for_status(&result.status),
        }
    }
}

/// Snapshot of everything the panel shows, independent of the UI toolkit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelView {
    pub live: LiveSection,
    pub telemetry_error: Option<String>,
    pub dosage: f64,
    pub result: Option<ResultView>,
    pub scenario_error: Option<String>,
    pub visualization: bool,
}

impl PanelView {
    pub fn render(
        state: &PanelState,
        display: &DisplayConfig,
        dosage: f64,
        visualization: bool,
    ) -> Self {
        let live = match &state.telemetry {
            None => LiveSection::Connecting,
            Some(snapshot) => LiveSection::Readings {
                lines: display
                    .fields
                    .iter()
                    .map(|field| ReadingLine::render(field, snapshot.get(&field.tag)))
                    .collect(),
            },
        };
        let telemetry_error = state
            .telemetry_health
            .is_failing()
            .then(|| FETCH_FAILED_MARKER.to_owned());
        let scenario_error = state
            .scenario_health
            .is_failing()
            .then(|| state.scenario_health.last_error.clone())
            .map(|reason| {
                format!(
                    "last run failed: {}",
                    reason.as_deref().unwrap_or("unknown error")
                )
            });

        Self {
            live,
            telemetry_error,
            dosage,
            result: state
                .scenario
                .as_ref()
                .map(|applied| ResultView::from_result(&applied.result)),
            scenario_error,
            visualization,
        }
    }

    pub fn dosage_label(&self) -> String {
        format!("{DOSAGE_LABEL}: {}", self.dosage)
    }

    /// Plain-text rendering, one entry per line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match &self.live {
            LiveSection::Connecting => lines.push(CONNECTING_PLACEHOLDER.to_owned()),
            LiveSection::Readings { lines: readings } => lines.extend(
                readings
                    .iter()
                    .map(|reading| format!("{}: {}", reading.label, reading.value)),
            ),
        }
        if let Some(marker) = &self.telemetry_error {
            lines.push(format!("({marker})"));
        }
        lines.push(String::new());
        lines.push(self.dosage_label());
        if let Some(result) = &self.result {
            lines.push(format!("Predicted Effluent: {}", result.turbidity));
            lines.push(format!("Daily Chemical Cost: {}", result.cost));
            lines.push(format!("Status: {}", result.status));
        }
        if let Some(err) = &self.scenario_error {
            lines.push(err.clone());
        }
        lines
    }
}
