//! ---
//! dss_section: "02-decision-support-core"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Maps predicted outcomes onto viewport color overrides."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use tracing::{debug, info};

use crate::scenario::ScenarioStatus;
use crate::viewer::{Rgb, ViewerContext};

/// Effluent turbidity (NTU) above which treated water is considered muddy.
pub const TURBIDITY_LIMIT_NTU: f64 = 1.0;

pub const ALARM_RED: Rgb = Rgb::new(255, 0, 0);
pub const MUDDY_BROWN: Rgb = Rgb::new(139, 69, 19);
pub const CLEAN_BLUE: Rgb = Rgb::new(0, 102, 255);

pub const SELECT_ELEMENT_FIRST: &str = "Select an element in the viewer first.";

/// Color for a predicted outcome. Critical status always wins over turbidity.
pub fn outcome_color(status: &ScenarioStatus, predicted_turbidity: f64) -> Rgb {
    if status.is_critical() {
        ALARM_RED
    } else if predicted_turbidity > TURBIDITY_LIMIT_NTU {
        MUDDY_BROWN
    } else {
        CLEAN_BLUE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisualizeOutcome {
    /// No viewport or selection capability was available.
    Skipped,
    /// Nothing selected; the operator was asked to pick an element.
    SelectionRequired,
    Applied { color: Rgb, elements: usize },
}

#[derive(Debug, Clone)]
pub struct OutcomeVisualizer {
    viewer: ViewerContext,
}

impl OutcomeVisualizer {
    pub fn new(viewer: ViewerContext) -> Self {
        Self { viewer }
    }

    pub fn viewer(&self) -> &ViewerContext {
        &self.viewer
    }

    pub fn visualize(&self, status: &ScenarioStatus, predicted_turbidity: f64) -> VisualizeOutcome {
        let (Some(viewport), Some(selection)) = (&self.viewer.viewport, &self.viewer.selection)
        else {
            debug!("no viewport or selection context; skipping visualization");
            return VisualizeOutcome::Skipped;
        };

        let selected = selection.selected_elements();
        if selected.is_empty() {
            info!("scenario visualization requested without a selection");
            match &self.viewer.notifier {
                Some(notifier) => notifier.alert(SELECT_ELEMENT_FIRST),
                None => info!(alert = SELECT_ELEMENT_FIRST, "no notifier attached"),
            }
            return VisualizeOutcome::SelectionRequired;
        }

        viewport.clear_overrides();
        let color = outcome_color(status, predicted_turbidity);
        viewport.override_color(&selected, color);
        debug!(color = %color, elements = selected.len(), status = %status, "override applied");
        VisualizeOutcome::Applied {
            color,
            elements: selected.len(),
        }
    }
}
