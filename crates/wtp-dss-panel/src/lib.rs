//! ---
//! dss_section: "02-decision-support-core"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Telemetry, what-if simulation and outcome visualisation pipeline."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
//! Decision support core for water-treatment plant viewers.
//!
//! Live tag values are polled into a shared [`PanelState`], operators submit
//! alum dosage scenarios through the [`ScenarioRunner`], and the predicted
//! outcome is painted onto the selected viewport elements by the
//! [`OutcomeVisualizer`]. Hosts mount the panel through [`WidgetProvider`].

pub mod display;
pub mod dosage;
pub mod errors;
mod http;
pub mod panel;
pub mod provider;
pub mod scenario;
pub mod state;
pub mod telemetry;
pub mod viewer;
pub mod visualizer;

pub use display::{PanelView, ResultView, Theme};
pub use dosage::{DosageRange, DosageSlider};
pub use errors::{PanelError, Result};
pub use panel::{DecisionPanel, PanelFactory, PanelSettings};
pub use provider::{
    DecisionSupportProvider, StagePanelLocation, StagePanelSection, WidgetDescriptor,
    WidgetProvider, WidgetState,
};
pub use scenario::{
    HttpScenarioService, RunOutcome, ScenarioRequest, ScenarioResult, ScenarioRunner,
    ScenarioService, ScenarioStatus,
};
pub use state::{FetchHealth, PanelState, SharedPanelState};
pub use telemetry::{HttpTelemetrySource, TelemetryPoller, TelemetrySnapshot, TelemetrySource};
pub use viewer::{
    ElementId, OperatorNotifier, OverrideTarget, Rgb, SceneViewer, SelectionSource, ViewerContext,
};
pub use visualizer::{outcome_color, OutcomeVisualizer, VisualizeOutcome};
