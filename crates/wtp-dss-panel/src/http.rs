//! ---
//! dss_section: "05-networking-external-interfaces"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Shared reqwest plumbing for the telemetry and simulation clients."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::errors::{PanelError, Result};

pub(crate) fn build_client(endpoint: &Url, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| PanelError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })
}

pub(crate) fn transport_error(endpoint: &Url, source: reqwest::Error) -> PanelError {
    PanelError::Transport {
        endpoint: endpoint.to_string(),
        source,
    }
}

/// Reject non-2xx responses, then decode the body as JSON.
pub(crate) async fn decode_json<T: DeserializeOwned>(endpoint: &Url, response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(PanelError::HttpStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }
    let body = response
        .bytes()
        .await
        .map_err(|source| transport_error(endpoint, source))?;
    serde_json::from_slice(&body).map_err(|source| PanelError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}
