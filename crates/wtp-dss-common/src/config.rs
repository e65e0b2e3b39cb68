//! ---
//! dss_section: "01-core-functionality"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Configuration loading and validation for the decision support panel."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

/// Path appended to `backend.base_url` when no telemetry endpoint is configured.
pub const LIVE_SCADA_PATH: &str = "live-scada";
/// Path appended to `backend.base_url` when no simulation endpoint is configured.
pub const SIMULATE_PATH: &str = "simulate";

const MAX_DISPLAY_PRECISION: usize = 6;

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_telemetry_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_simulation_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_dosage_min() -> f64 {
    5.0
}

fn default_dosage_max() -> f64 {
    20.0
}

fn default_dosage_step() -> f64 {
    0.5
}

fn default_dosage_value() -> f64 {
    12.5
}

fn default_visualization_enabled() -> bool {
    true
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_stdout() -> bool {
    true
}

fn default_display_fields() -> Vec<DisplayField> {
    vec![
        DisplayField::new("Flow_Rate", "Flow", "m3/hr", 1),
        DisplayField::new("Inlet_Turbidity", "Inlet Turbidity", "NTU", 1),
        DisplayField::new("Effluent_Quality", "Effluent Quality", "NTU", 2),
    ]
}

/// Primary configuration object for the decision support panel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub dosage: DosageConfig,
    #[serde(default)]
    pub visualization: VisualizationConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "WTP_DSS_CONFIG";

    /// Load configuration from disk, respecting the `WTP_DSS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Parse and validate a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Effective telemetry endpoint: explicit value, else `<base_url>/live-scada`.
    pub fn telemetry_endpoint(&self) -> Result<Url> {
        match &self.telemetry.endpoint {
            Some(url) => Ok(url.clone()),
            None => self.backend.join(LIVE_SCADA_PATH),
        }
        .context("telemetry endpoint is not configured")
    }

    /// Effective simulation endpoint: explicit value, else `<base_url>/simulate`.
    pub fn simulation_endpoint(&self) -> Result<Url> {
        match &self.simulation.endpoint {
            Some(url) => Ok(url.clone()),
            None => self.backend.join(SIMULATE_PATH),
        }
        .context("simulation endpoint is not configured")
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.telemetry_endpoint()?;
        self.simulation_endpoint()?;
        self.telemetry.validate()?;
        self.dosage.validate()?;
        self.display.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Shared backend location used to derive endpoints that are not set explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub base_url: Option<Url>,
}

impl BackendConfig {
    fn join(&self, path: &str) -> Result<Url> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| anyhow!("neither an explicit endpoint nor backend.base_url is set"))?;
        let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).with_context(|| format!("invalid derived endpoint {joined}"))
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub endpoint: Option<Url>,
    #[serde(rename = "poll_interval_ms", default = "default_poll_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub poll_interval: Duration,
    #[serde(rename = "request_timeout_ms", default = "default_telemetry_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            poll_interval: default_poll_interval(),
            request_timeout: default_telemetry_timeout(),
        }
    }
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(anyhow!("telemetry.poll_interval_ms must be greater than zero"));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub endpoint: Option<Url>,
    #[serde(rename = "request_timeout_ms", default = "default_simulation_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout: default_simulation_timeout(),
        }
    }
}

/// Bounds of the operator dosage slider, in mg/L.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DosageConfig {
    #[serde(default = "default_dosage_min")]
    pub min: f64,
    #[serde(default = "default_dosage_max")]
    pub max: f64,
    #[serde(default = "default_dosage_step")]
    pub step: f64,
    #[serde(default = "default_dosage_value")]
    pub default: f64,
}

impl Default for DosageConfig {
    fn default() -> Self {
        Self {
            min: default_dosage_min(),
            max: default_dosage_max(),
            step: default_dosage_step(),
            default: default_dosage_value(),
        }
    }
}

impl DosageConfig {
    pub fn validate(&self) -> Result<()> {
        if ![self.min, self.max, self.step, self.default]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(anyhow!("dosage bounds must be finite numbers"));
        }
        if self.min >= self.max {
            return Err(anyhow!(
                "dosage.min ({}) must be lower than dosage.max ({})",
                self.min,
                self.max
            ));
        }
        if self.step <= 0.0 {
            return Err(anyhow!("dosage.step must be positive"));
        }
        if self.step > self.max - self.min {
            return Err(anyhow!(
                "dosage.step ({}) exceeds the configured range",
                self.step
            ));
        }
        if self.default < self.min || self.default > self.max {
            return Err(anyhow!(
                "dosage.default ({}) lies outside [{}, {}]",
                self.default,
                self.min,
                self.max
            ));
        }
        Ok(())
    }
}

/// Toggles the outcome visualisation capability of the panel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisualizationConfig {
    #[serde(default = "default_visualization_enabled")]
    pub enabled: bool,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            enabled: default_visualization_enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_fields")]
    pub fields: Vec<DisplayField>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fields: default_display_fields(),
        }
    }
}

impl DisplayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(anyhow!("display.fields must list at least one tag"));
        }
        for field in &self.fields {
            if field.tag.trim().is_empty() {
                return Err(anyhow!("display field '{}' has an empty tag", field.label));
            }
            if field.precision > MAX_DISPLAY_PRECISION {
                return Err(anyhow!(
                    "display field '{}' precision {} exceeds {}",
                    field.tag,
                    field.precision,
                    MAX_DISPLAY_PRECISION
                ));
            }
        }
        Ok(())
    }
}

/// A telemetry tag rendered in the live status section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayField {
    pub tag: String,
    pub label: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub precision: usize,
}

impl DisplayField {
    pub fn new(
        tag: impl Into<String>,
        label: impl Into<String>,
        unit: impl Into<String>,
        precision: usize,
    ) -> Self {
        Self {
            tag: tag.into(),
            label: label.into(),
            unit: unit.into(),
            precision,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Disabled by terminal hosts so events do not overwrite the UI.
    #[serde(default = "default_stdout")]
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            stdout: default_stdout(),
        }
    }
}
