//! ---
//! dss_section: "01-core-functionality"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Shared primitives for the decision support workspace."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
//! Shared primitives for the WTP decision support workspace.
//! This crate exposes configuration loading and tracing setup consumed by
//! the panel core and the console host.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, BackendConfig, DisplayConfig, DisplayField, DosageConfig, LoadedAppConfig,
    LoggingConfig, SimulationConfig, TelemetryConfig, VisualizationConfig,
};
pub use logging::{init_tracing, log_panel_event, LogFormat, PanelEventOutcome};
