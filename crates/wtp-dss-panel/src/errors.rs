//! ---
//! dss_section: "02-decision-support-core"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Error types for the decision support core."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PanelError>;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} responded with HTTP {status}")]
    HttpStatus { endpoint: String, status: u16 },
    #[error("unable to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("dosage {value} mg/L lies outside [{min}, {max}]")]
    DosageOutOfRange { value: f64, min: f64, max: f64 },
    #[error("invalid dosage input '{0}'")]
    InvalidDosage(String),
    #[error("invalid dosage range: {0}")]
    InvalidRange(String),
    #[error("configuration error: {0:#}")]
    Config(#[from] anyhow::Error),
}
