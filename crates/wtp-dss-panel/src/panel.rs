//! ---
//! dss_section: "02-decision-support-core"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Panel composition: activation, dosage input and scenario dispatch."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wtp_dss_common::config::{AppConfig, DisplayConfig, DosageConfig};
use wtp_dss_common::logging::{log_panel_event, PanelEventOutcome};

use crate::display::PanelView;
use crate::dosage::{DosageRange, DosageSlider};
use crate::errors::Result;
use crate::scenario::{HttpScenarioService, RunOutcome, ScenarioResult, ScenarioRunner, ScenarioService};
use crate::state::{PanelState, SharedPanelState};
use crate::telemetry::{HttpTelemetrySource, TelemetryPoller, TelemetrySource};
use crate::viewer::ViewerContext;
use crate::visualizer::{OutcomeVisualizer, VisualizeOutcome};

/// Panel behaviour derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PanelSettings {
    pub poll_interval: Duration,
    pub dosage: DosageConfig,
    pub visualization_enabled: bool,
    pub display: DisplayConfig,
}

impl PanelSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.telemetry.poll_interval,
            dosage: config.dosage,
            visualization_enabled: config.visualization.enabled,
            display: config.display.clone(),
        }
    }
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Widget content handed to hosts; every activation yields a fresh panel.
pub struct PanelFactory {
    settings: PanelSettings,
    telemetry: Arc<dyn TelemetrySource>,
    scenarios: Arc<dyn ScenarioService>,
}

impl PanelFactory {
    pub fn new(
        settings: PanelSettings,
        telemetry: Arc<dyn TelemetrySource>,
        scenarios: Arc<dyn ScenarioService>,
    ) -> Self {
        Self {
            settings,
            telemetry,
            scenarios,
        }
    }

    /// Wire HTTP clients for both endpoints described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let telemetry = HttpTelemetrySource::from_config(config)?;
        let scenarios = HttpScenarioService::from_config(config)?;
        debug!(
            telemetry = %telemetry.endpoint(),
            simulation = %scenarios.endpoint(),
            "panel endpoints resolved"
        );
        Ok(Self::new(
            PanelSettings::from_config(config),
            Arc::new(telemetry),
            Arc::new(scenarios),
        ))
    }

    pub fn settings(&self) -> &PanelSettings {
        &self.settings
    }

    /// Mount the panel and start polling telemetry.
    ///
    /// The outcome visualizer is attached only when visualization is enabled
    /// and the host supplied a viewer context. Must run inside a tokio runtime.
    pub fn activate(&self, viewer: Option<ViewerContext>) -> Result<DecisionPanel> {
        let range = match DosageRange::from_config(&self.settings.dosage) {
            Ok(range) => range,
            Err(err) => {
                log_panel_event(
                    "panel.activate",
                    &format!("decision panel not activated: {err}"),
                    PanelEventOutcome::Fault,
                );
                return Err(err);
            }
        };
        let slider = DosageSlider::new(range, self.settings.dosage.default);
        let state = PanelState::shared();

        let visualizer = viewer
            .filter(|_| self.settings.visualization_enabled)
            .map(|viewer| Arc::new(OutcomeVisualizer::new(viewer)));
        let runner = Arc::new(ScenarioRunner::new(
            self.scenarios.clone(),
            range,
            state.clone(),
            visualizer,
        ));
        let poller = TelemetryPoller::spawn(
            self.telemetry.clone(),
            state.clone(),
            self.settings.poll_interval,
        );

        log_panel_event(
            "panel.activate",
            &format!(
                "decision panel active (visualization: {})",
                runner.has_visualizer()
            ),
            PanelEventOutcome::Success,
        );
        Ok(DecisionPanel {
            state,
            slider: Mutex::new(slider),
            runner,
            telemetry: self.telemetry.clone(),
            poller: Mutex::new(Some(poller)),
            display: self.settings.display.clone(),
        })
    }
}

impl fmt::Debug for PanelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelFactory")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// One mounted instance of the decision support panel.
pub struct DecisionPanel {
    state: SharedPanelState,
    slider: Mutex<DosageSlider>,
    runner: Arc<ScenarioRunner>,
    telemetry: Arc<dyn TelemetrySource>,
    poller: Mutex<Option<TelemetryPoller>>,
    display: DisplayConfig,
}

impl DecisionPanel {
    pub fn is_active(&self) -> bool {
        self.poller.lock().is_some()
    }

    /// Stop telemetry polling. No poll result lands in the state afterwards.
    pub fn deactivate(&self) {
        let poller = self.poller.lock().take();
        if let Some(poller) = poller {
            poller.cancel();
            log_panel_event(
                "panel.deactivate",
                "decision panel deactivated",
                PanelEventOutcome::Success,
            );
        }
    }

    /// Deactivate and wait for the polling task to exit.
    pub async fn shutdown(&self) {
        let poller = self.poller.lock().take();
        if let Some(poller) = poller {
            poller.stop().await;
            log_panel_event(
                "panel.deactivate",
                "decision panel shut down",
                PanelEventOutcome::Success,
            );
        }
    }

    pub fn dosage(&self) -> f64 {
        self.slider.lock().value()
    }

    pub fn increment_dosage(&self) -> f64 {
        self.slider.lock().increment()
    }

    pub fn decrement_dosage(&self) -> f64 {
        self.slider.lock().decrement()
    }

    pub fn set_dosage(&self, raw: f64) -> f64 {
        self.slider.lock().set_raw(raw)
    }

    /// Apply the text value reported by a slider control.
    pub fn set_dosage_text(&self, text: &str) -> Result<f64> {
        self.slider.lock().set_text(text)
    }

    /// Submit the current slider value.
    pub async fn run_scenario(&self) -> Result<RunOutcome> {
        let dosage = self.dosage();
        self.runner.run_scenario(dosage).await
    }

    /// Submit the current slider value without waiting for the answer.
    ///
    /// Failures are recorded in the panel state and logged by the runner.
    pub fn spawn_scenario(&self) -> JoinHandle<Option<RunOutcome>> {
        let dosage = self.dosage();
        let runner = self.runner.clone();
        tokio::spawn(async move {
            match runner.run_scenario(dosage).await {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    warn!(dosage, error = %err, "background scenario run failed");
                    None
                }
            }
        })
    }

    /// Fetch telemetry once, outside of the polling schedule.
    pub async fn refresh_telemetry(&self) -> Result<()> {
        TelemetryPoller::poll_once(self.telemetry.as_ref(), &self.state).await
    }

    pub fn latest_result(&self) -> Option<ScenarioResult> {
        self.runner.latest()
    }

    pub fn reapply_visualization(&self) -> Option<VisualizeOutcome> {
        self.runner.reapply_visualization()
    }

    pub fn runner(&self) -> &Arc<ScenarioRunner> {
        &self.runner
    }

    pub fn state(&self) -> &SharedPanelState {
        &self.state
    }

    pub fn view(&self) -> PanelView {
        let dosage = self.dosage();
        PanelView::render(
            &self.state.read(),
            &self.display,
            dosage,
            self.runner.has_visualizer(),
        )
    }
}

impl Drop for DecisionPanel {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl fmt::Debug for DecisionPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionPanel")
            .field("active", &self.is_active())
            .field("dosage", &self.dosage())
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::errors::PanelError;
    use crate::scenario::ScenarioRequest;
    use crate::telemetry::TelemetrySnapshot;
    use crate::viewer::{ElementId, SceneViewer};

    struct FixedTelemetry;

    #[async_trait]
    impl TelemetrySource for FixedTelemetry {
        async fn fetch(&self) -> Result<TelemetrySnapshot> {
            Ok(TelemetrySnapshot::from_readings([("Flow_Rate", 1000.0)]))
        }
    }

    struct EchoService;

    #[async_trait]
    impl ScenarioService for EchoService {
        async fn simulate(&self, request: &ScenarioRequest) -> Result<ScenarioResult> {
            Ok(ScenarioResult {
                predicted_effluent_turbidity: 20.0 / request.proposed_dosage,
                daily_chemical_cost: request.proposed_dosage * 25.0,
                status: "Safe".into(),
                scenario: None,
            })
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn factory(settings: PanelSettings) -> PanelFactory {
        PanelFactory::new(settings, Arc::new(FixedTelemetry), Arc::new(EchoService))
    }

    #[tokio::test]
    async fn visualizer_attached_only_when_enabled_with_viewer() {
        let scene = Arc::new(SceneViewer::new([ElementId::from("filter-a")]));
        let viewer = ViewerContext::from_scene(scene);

        let enabled = factory(PanelSettings::default());
        assert!(enabled
            .activate(Some(viewer.clone()))
            .unwrap()
            .runner()
            .has_visualizer());
        assert!(!enabled.activate(None).unwrap().runner().has_visualizer());

        let disabled = factory(PanelSettings {
            visualization_enabled: false,
            ..PanelSettings::default()
        });
        let panel = disabled.activate(Some(viewer)).unwrap();
        assert!(!panel.runner().has_visualizer());
        assert!(!panel.view().visualization);
    }

    #[tokio::test]
    async fn slider_value_is_submitted() {
        let panel = factory(PanelSettings::default()).activate(None).unwrap();
        assert_eq!(panel.dosage(), 12.5);
        assert_eq!(panel.set_dosage_text("20").unwrap(), 20.0);
        let outcome = panel.run_scenario().await.unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.result.daily_chemical_cost, 500.0);
        assert_eq!(panel.view().result.unwrap().cost, "$500/day");
    }

    #[tokio::test]
    async fn deactivate_is_idempotent() {
        let panel = factory(PanelSettings::default()).activate(None).unwrap();
        assert!(panel.is_active());
        panel.deactivate();
        panel.deactivate();
        assert!(!panel.is_active());
        panel.refresh_telemetry().await.unwrap();
        assert!(panel.state().read().telemetry.is_some());
    }

    #[test]
    fn invalid_dosage_config_fails_activation() {
        let settings = PanelSettings {
            dosage: DosageConfig {
                min: 10.0,
                max: 5.0,
                ..DosageConfig::default()
            },
            ..PanelSettings::default()
        };
        let captured = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(captured.clone())
            .finish();
        let result =
            tracing::subscriber::with_default(subscriber, || factory(settings).activate(None));

        assert!(matches!(result, Err(PanelError::InvalidRange(_))));
        let log = captured.contents();
        assert!(log.contains("ERROR"), "{log}");
        assert!(log.contains("panel.activate"), "{log}");
        assert!(log.contains("fault"), "{log}");
    }
}
