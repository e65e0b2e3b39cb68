//! ---
//! dss_section: "02-decision-support-core"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Widget registration surface queried by viewer hosts."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tracing::debug;

use crate::panel::PanelFactory;

pub const DECISION_SUPPORT_PROVIDER_ID: &str = "WtpDecisionSupportProvider";
pub const SIMULATION_WIDGET_ID: &str = "SimulationWidget";
pub const SIMULATION_WIDGET_LABEL: &str = "Decision Support";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum StagePanelLocation {
    Top,
    Left,
    Right,
    Bottom,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum StagePanelSection {
    Start,
    Middle,
    End,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum WidgetState {
    Open,
    Closed,
    Hidden,
    Floating,
}

/// A widget offered to the host, with the factory that mounts its content.
#[derive(Debug, Clone)]
pub struct WidgetDescriptor {
    pub id: String,
    pub label: String,
    pub default_state: WidgetState,
    pub content: Arc<PanelFactory>,
}

/// Host-facing registration capability. The host decides when and where
/// widgets are mounted; providers only describe them.
pub trait WidgetProvider: Send + Sync + 'static {
    fn id(&self) -> &str;

    fn provide_widgets(
        &self,
        stage_id: &str,
        stage_usage: &str,
        location: StagePanelLocation,
        section: Option<StagePanelSection>,
    ) -> Vec<WidgetDescriptor>;
}

/// Offers the decision support panel on the right-hand stage panel.
#[derive(Debug, Clone)]
pub struct DecisionSupportProvider {
    factory: Arc<PanelFactory>,
}

impl DecisionSupportProvider {
    pub fn new(factory: Arc<PanelFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &Arc<PanelFactory> {
        &self.factory
    }
}

impl WidgetProvider for DecisionSupportProvider {
    fn id(&self) -> &str {
        DECISION_SUPPORT_PROVIDER_ID
    }

    fn provide_widgets(
        &self,
        stage_id: &str,
        stage_usage: &str,
        location: StagePanelLocation,
        section: Option<StagePanelSection>,
    ) -> Vec<WidgetDescriptor> {
        if location != StagePanelLocation::Right {
            return Vec::new();
        }
        debug!(stage_id, stage_usage, ?section, "providing decision support widget");
        vec![WidgetDescriptor {
            id: SIMULATION_WIDGET_ID.to_owned(),
            label: SIMULATION_WIDGET_LABEL.to_owned(),
            default_state: WidgetState::Open,
            content: self.factory.clone(),
        }]
    }
}
