//! ---
//! dss_section: "02-decision-support-core"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Live SCADA tag polling."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;
use wtp_dss_common::config::AppConfig;

use crate::errors::Result;
use crate::http::{build_client, decode_json, transport_error};
use crate::state::SharedPanelState;

pub const FLOW_RATE: &str = "Flow_Rate";
pub const INLET_TURBIDITY: &str = "Inlet_Turbidity";
pub const EFFLUENT_QUALITY: &str = "Effluent_Quality";

/// Latest tag readings received from the plant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    received_at: DateTime<Utc>,
    tags: IndexMap<String, f64>,
}

impl TelemetrySnapshot {
    pub fn new(tags: IndexMap<String, f64>, received_at: DateTime<Utc>) -> Self {
        Self { received_at, tags }
    }

    pub fn from_readings<I, K>(readings: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self::new(
            readings.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            Utc::now(),
        )
    }

    /// Keep numeric tags only; everything else in the payload is ignored.
    fn from_payload(payload: LiveTagsPayload) -> Self {
        let mut tags = IndexMap::with_capacity(payload.tags.len());
        for (name, value) in payload.tags {
            match value.as_f64() {
                Some(reading) => {
                    tags.insert(name, reading);
                }
                None => debug!(tag = %name, %value, "skipping non-numeric tag"),
            }
        }
        Self::new(tags, Utc::now())
    }

    pub fn get(&self, tag: &str) -> Option<f64> {
        self.tags.get(tag).copied()
    }

    pub fn tags(&self) -> &IndexMap<String, f64> {
        &self.tags
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct LiveTagsPayload {
    tags: IndexMap<String, serde_json::Value>,
}

/// Read access to the plant's live tag values.
#[async_trait]
pub trait TelemetrySource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<TelemetrySnapshot>;
}

/// `GET <endpoint>` returning `{ "tags": { ... } }`.
#[derive(Debug, Clone)]
pub struct HttpTelemetrySource {
    client: Client,
    endpoint: Url,
}

impl HttpTelemetrySource {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self> {
        let client = build_client(&endpoint, timeout)?;
        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(config.telemetry_endpoint()?, config.telemetry.request_timeout)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl TelemetrySource for HttpTelemetrySource {
    async fn fetch(&self) -> Result<TelemetrySnapshot> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|source| transport_error(&self.endpoint, source))?;
        let payload: LiveTagsPayload = decode_json(&self.endpoint, response).await?;
        Ok(TelemetrySnapshot::from_payload(payload))
    }
}

/// Record a fetch result into the panel state.
///
/// With `generation` set the write only happens while that poller generation
/// is current; returns whether the state was touched.
fn apply_fetch(
    state: &SharedPanelState,
    generation: Option<u64>,
    result: &Result<TelemetrySnapshot>,
) -> bool {
    let mut guard = state.write();
    if generation.is_some_and(|expected| expected != guard.poll_generation) {
        return false;
    }
    match result {
        Ok(snapshot) => {
            debug!(tags = snapshot.len(), "telemetry snapshot received");
            guard.telemetry_health.record_success(snapshot.received_at());
            guard.telemetry = Some(snapshot.clone());
        }
        Err(err) => {
            warn!(error = %err, "telemetry fetch failed; keeping previous snapshot");
            guard
                .telemetry_health
                .record_failure(Utc::now(), err.to_string());
        }
    }
    true
}

/// Periodic telemetry fetch bound to one panel activation.
#[derive(Debug)]
pub struct TelemetryPoller {
    state: SharedPanelState,
    generation: u64,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryPoller {
    /// Start polling. The first fetch fires one `period` after activation.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        source: Arc<dyn TelemetrySource>,
        state: SharedPanelState,
        period: Duration,
    ) -> Self {
        let generation = {
            let mut guard = state.write();
            guard.poll_generation += 1;
            guard.poll_generation
        };
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task_state = state.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let result = tokio::select! {
                            biased;
                            _ = shutdown_rx.changed() => break,
                            result = source.fetch() => result,
                        };
                        if !apply_fetch(&task_state, Some(generation), &result) {
                            break;
                        }
                    }
                }
            }
            debug!(generation, "telemetry poller exited");
        });
        info!(generation, period_ms = period.as_millis() as u64, "telemetry poller started");
        Self {
            state,
            generation,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Fetch once and record the outcome, outside of any poller schedule.
    pub async fn poll_once(source: &dyn TelemetrySource, state: &SharedPanelState) -> Result<()> {
        let result = source.fetch().await;
        apply_fetch(state, None, &result);
        result.map(|_| ())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop polling. Once this returns no in-flight fetch can touch the state.
    pub fn cancel(&self) {
        {
            let mut guard = self.state.write();
            if guard.poll_generation == self.generation {
                guard.poll_generation += 1;
            }
        }
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.lock().as_ref() {
            task.abort();
        }
        debug!(generation = self.generation, "telemetry poller cancelled");
    }

    /// Cancel and wait for the polling task to finish.
    pub async fn stop(self) {
        self.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "telemetry poller join error");
                }
            }
        }
    }
}

impl Drop for TelemetryPoller {
    fn drop(&mut self) {
        self.cancel();
    }
}
