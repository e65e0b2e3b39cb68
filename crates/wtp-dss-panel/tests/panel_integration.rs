//! ---
//! dss_section: "07-testing-quality"
//! dss_subsection: "integration-test"
//! dss_type: "source"
//! dss_scope: "test"
//! dss_description: "End-to-end panel behaviour against an in-process plant backend."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};
use wtp_dss_common::config::AppConfig;
use wtp_dss_panel::display::LiveSection;
use wtp_dss_panel::visualizer::{ALARM_RED, CLEAN_BLUE, SELECT_ELEMENT_FIRST};
use wtp_dss_panel::{
    DecisionPanel, DosageRange, ElementId, OutcomeVisualizer, PanelError, PanelFactory,
    PanelState, ScenarioRequest, ScenarioResult, ScenarioRunner, ScenarioService, SceneViewer,
    Theme, ViewerContext, VisualizeOutcome,
};

#[derive(Default)]
struct MockPlant {
    live: Mutex<Option<Value>>,
    live_calls: AtomicUsize,
    simulate_bodies: Mutex<Vec<Value>>,
}

impl MockPlant {
    fn set_live(&self, payload: Option<Value>) {
        *self.live.lock() = payload;
    }

    fn live_calls(&self) -> usize {
        self.live_calls.load(Ordering::SeqCst)
    }
}

async fn live_scada(State(plant): State<Arc<MockPlant>>) -> Result<Json<Value>, StatusCode> {
    plant.live_calls.fetch_add(1, Ordering::SeqCst);
    plant
        .live
        .lock()
        .clone()
        .map(Json)
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

async fn simulate(
    State(plant): State<Arc<MockPlant>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    plant.simulate_bodies.lock().push(body.clone());
    let dosage = body["proposed_dosage"]
        .as_f64()
        .ok_or(StatusCode::UNPROCESSABLE_ENTITY)?;
    let response = if dosage >= 19.0 {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    } else if dosage >= 14.0 {
        json!({
            "predicted_effluent_turbidity": 0.8,
            "daily_chemical_cost": 340,
            "status": "Safe",
            "scenario": { "proposed_dosage": dosage }
        })
    } else if dosage >= 8.0 {
        json!({
            "predicted_effluent_turbidity": 1.5,
            "daily_chemical_cost": 260,
            "status": "Safe"
        })
    } else {
        json!({
            "predicted_effluent_turbidity": 2.3,
            "daily_chemical_cost": 150,
            "status": "CRITICAL VIOLATION"
        })
    };
    Ok(Json(response))
}

async fn spawn_plant(plant: Arc<MockPlant>) -> SocketAddr {
    let app = Router::new()
        .route("/live-scada", get(live_scada))
        .route("/simulate", post(simulate))
        .with_state(plant);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn plant_payload(flow: f64) -> Value {
    json!({
        "tags": {
            "Flow_Rate": flow,
            "Inlet_Turbidity": 12.4,
            "Effluent_Quality": 0.42
        }
    })
}

fn config_for(addr: SocketAddr, poll_interval_ms: u64) -> AppConfig {
    format!(
        r#"
        [backend]
        base_url = "http://{addr}"

        [telemetry]
        poll_interval_ms = {poll_interval_ms}
        request_timeout_ms = 1000

        [simulation]
        request_timeout_ms = 1000
        "#
    )
    .parse()
    .unwrap()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        sleep(Duration::from_millis(10)).await;
    }
}

fn flow_reading(panel: &DecisionPanel) -> Option<f64> {
    panel
        .state()
        .read()
        .telemetry
        .as_ref()
        .and_then(|snapshot| snapshot.get("Flow_Rate"))
}

fn scene() -> Arc<SceneViewer> {
    Arc::new(SceneViewer::new(
        ["clarifier-1", "filter-a", "filter-b"].map(ElementId::from),
    ))
}

#[tokio::test]
async fn poller_replaces_snapshot_and_keeps_it_on_failure() {
    let plant = Arc::new(MockPlant::default());
    plant.set_live(Some(plant_payload(1250.0)));
    let addr = spawn_plant(plant.clone()).await;

    let factory = PanelFactory::from_config(&config_for(addr, 40)).unwrap();
    let panel = factory.activate(None).unwrap();
    assert_eq!(panel.view().live, LiveSection::Connecting);

    wait_until(|| flow_reading(&panel) == Some(1250.0)).await;
    assert_eq!(panel.view().lines()[0], "Flow: 1250.0 m3/hr");

    plant.set_live(None);
    wait_until(|| panel.state().read().telemetry_health.total_failures >= 2).await;
    assert_eq!(flow_reading(&panel), Some(1250.0));
    assert!(panel.view().telemetry_error.is_some());

    plant.set_live(Some(plant_payload(1300.0)));
    wait_until(|| flow_reading(&panel) == Some(1300.0)).await;
    assert!(!panel.state().read().telemetry_health.is_failing());
    panel.shutdown().await;
}

#[tokio::test]
async fn deactivation_stops_polling() {
    let plant = Arc::new(MockPlant::default());
    plant.set_live(Some(plant_payload(1000.0)));
    let addr = spawn_plant(plant.clone()).await;

    let panel = PanelFactory::from_config(&config_for(addr, 30))
        .unwrap()
        .activate(None)
        .unwrap();
    wait_until(|| flow_reading(&panel) == Some(1000.0)).await;

    panel.deactivate();
    assert!(!panel.is_active());
    plant.set_live(Some(plant_payload(2000.0)));
    sleep(Duration::from_millis(100)).await;
    let calls = plant.live_calls();

    sleep(Duration::from_millis(300)).await;
    assert_eq!(plant.live_calls(), calls);
    assert_eq!(flow_reading(&panel), Some(1000.0));
}

#[tokio::test]
async fn identical_payloads_render_identically() {
    let plant = Arc::new(MockPlant::default());
    plant.set_live(Some(plant_payload(1250.0)));
    let addr = spawn_plant(plant.clone()).await;

    let panel = PanelFactory::from_config(&config_for(addr, 60_000))
        .unwrap()
        .activate(None)
        .unwrap();
    panel.refresh_telemetry().await.unwrap();
    let first = panel.view();
    panel.refresh_telemetry().await.unwrap();
    assert_eq!(panel.view(), first);
}

#[tokio::test]
async fn safe_scenario_paints_selection_blue() {
    let plant = Arc::new(MockPlant::default());
    let addr = spawn_plant(plant.clone()).await;
    let scene = scene();
    scene.select(&ElementId::from("filter-a"));

    let panel = PanelFactory::from_config(&config_for(addr, 60_000))
        .unwrap()
        .activate(Some(ViewerContext::from_scene(scene.clone())))
        .unwrap();
    panel.set_dosage(14.0);
    let outcome = panel.run_scenario().await.unwrap();

    assert!(outcome.applied);
    assert_eq!(
        outcome.visualization,
        Some(VisualizeOutcome::Applied {
            color: CLEAN_BLUE,
            elements: 1
        })
    );
    let body = plant.simulate_bodies.lock()[0].clone();
    assert!(body["proposed_dosage"].is_f64());
    assert_eq!(body["proposed_dosage"], json!(14.0));

    let result = panel.view().result.unwrap();
    assert_eq!(result.turbidity, "0.8 NTU");
    assert_eq!(result.cost, "$340/day");
    assert_eq!(result.status, "Safe");
    assert_eq!(result.theme, Theme::Safe);
    assert_eq!(scene.override_for(&"filter-a".into()), Some(CLEAN_BLUE));
    assert_eq!(scene.override_for(&"filter-b".into()), None);
}

#[tokio::test]
async fn critical_scenario_paints_selection_red() {
    let plant = Arc::new(MockPlant::default());
    let addr = spawn_plant(plant).await;
    let scene = scene();
    scene.select(&ElementId::from("clarifier-1"));
    scene.select(&ElementId::from("filter-b"));

    let panel = PanelFactory::from_config(&config_for(addr, 60_000))
        .unwrap()
        .activate(Some(ViewerContext::from_scene(scene.clone())))
        .unwrap();
    panel.set_dosage(6.0);
    let outcome = panel.run_scenario().await.unwrap();

    assert!(outcome.result.status.is_critical());
    assert_eq!(outcome.result.predicted_effluent_turbidity, 2.3);
    assert_eq!(panel.view().result.unwrap().theme, Theme::Alert);
    for id in ["clarifier-1", "filter-b"] {
        assert_eq!(scene.override_for(&id.into()), Some(ALARM_RED));
    }
}

#[tokio::test]
async fn empty_selection_alerts_and_keeps_viewport() {
    let plant = Arc::new(MockPlant::default());
    let addr = spawn_plant(plant).await;
    let scene = scene();

    let panel = PanelFactory::from_config(&config_for(addr, 60_000))
        .unwrap()
        .activate(Some(ViewerContext::from_scene(scene.clone())))
        .unwrap();
    let outcome = panel.run_scenario().await.unwrap();

    assert_eq!(outcome.visualization, Some(VisualizeOutcome::SelectionRequired));
    assert_eq!(scene.alerts(), vec![SELECT_ELEMENT_FIRST.to_owned()]);
    assert!(scene.overrides().is_empty());
    // The result itself is still shown.
    assert_eq!(panel.view().result.unwrap().turbidity, "1.5 NTU");
}

#[tokio::test]
async fn failed_run_keeps_previous_result() {
    let plant = Arc::new(MockPlant::default());
    let addr = spawn_plant(plant.clone()).await;
    let scene = scene();
    scene.select(&ElementId::from("filter-a"));

    let panel = PanelFactory::from_config(&config_for(addr, 60_000))
        .unwrap()
        .activate(Some(ViewerContext::from_scene(scene.clone())))
        .unwrap();
    panel.set_dosage(14.0);
    panel.run_scenario().await.unwrap();

    panel.set_dosage(19.5);
    let err = panel.run_scenario().await.unwrap_err();
    assert!(matches!(err, PanelError::HttpStatus { status: 500, .. }));

    let view = panel.view();
    assert_eq!(view.result.unwrap().turbidity, "0.8 NTU");
    assert!(view.scenario_error.unwrap().starts_with("last run failed"));
    assert_eq!(scene.override_for(&"filter-a".into()), Some(CLEAN_BLUE));

    let err = panel.runner().run_scenario(25.0).await.unwrap_err();
    assert!(matches!(err, PanelError::DosageOutOfRange { .. }));
    assert_eq!(plant.simulate_bodies.lock().len(), 2);
}

/// Answers each call with whatever the test sends through the matching gate.
#[derive(Default)]
struct GatedService {
    gates: Mutex<VecDeque<oneshot::Receiver<ScenarioResult>>>,
    calls: AtomicUsize,
}

#[async_trait]
impl ScenarioService for GatedService {
    async fn simulate(&self, _request: &ScenarioRequest) -> wtp_dss_panel::Result<ScenarioResult> {
        let gate = self.gates.lock().pop_front();
        self.calls.fetch_add(1, Ordering::SeqCst);
        match gate {
            Some(gate) => gate
                .await
                .map_err(|_| PanelError::InvalidDosage("gate dropped".into())),
            None => Err(PanelError::InvalidDosage("no gate".into())),
        }
    }
}

fn scenario(turbidity: f64, status: &str) -> ScenarioResult {
    ScenarioResult {
        predicted_effluent_turbidity: turbidity,
        daily_chemical_cost: 300.0,
        status: status.into(),
        scenario: None,
    }
}

#[tokio::test]
async fn superseded_response_is_discarded() {
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    let service = Arc::new(GatedService::default());
    service.gates.lock().extend([first_rx, second_rx]);

    let scene = scene();
    scene.select(&ElementId::from("filter-a"));
    let state = PanelState::shared();
    let runner = Arc::new(ScenarioRunner::new(
        service.clone(),
        DosageRange::new(5.0, 20.0, 0.5).unwrap(),
        state.clone(),
        Some(Arc::new(OutcomeVisualizer::new(ViewerContext::from_scene(
            scene.clone(),
        )))),
    ));

    let older = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run_scenario(6.0).await }
    });
    wait_until(|| service.calls.load(Ordering::SeqCst) == 1).await;
    let newer = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run_scenario(14.0).await }
    });
    wait_until(|| service.calls.load(Ordering::SeqCst) == 2).await;

    second_tx.send(scenario(0.5, "Safe")).unwrap();
    let newer = newer.await.unwrap().unwrap();
    assert!(newer.applied);
    assert_eq!(scene.override_for(&"filter-a".into()), Some(CLEAN_BLUE));

    first_tx.send(scenario(2.3, "CRITICAL VIOLATION")).unwrap();
    let older = older.await.unwrap().unwrap();
    assert!(!older.applied);
    assert!(older.sequence < newer.sequence);
    assert_eq!(older.visualization, None);

    assert_eq!(scene.override_for(&"filter-a".into()), Some(CLEAN_BLUE));
    let applied = state.read().scenario.clone().unwrap();
    assert_eq!(applied.sequence, newer.sequence);
    assert!(applied.result.status.is_safe());
}
