//! ---
//! dss_section: "02-decision-support-core"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Host viewer capabilities injected into the panel."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Identifier of a 3D element as reported by the host viewer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 8-bit RGB color used for viewport overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Read access to the operator's current selection.
pub trait SelectionSource: Send + Sync + 'static {
    fn selected_elements(&self) -> Vec<ElementId>;
}

/// Write access to the viewport's color override subsystem.
///
/// Overrides replace only the element color; geometry, transparency and
/// the underlying model data are left untouched.
pub trait OverrideTarget: Send + Sync + 'static {
    fn clear_overrides(&self);
    fn override_color(&self, elements: &[ElementId], color: Rgb);
}

/// Blocking operator notifications (message boxes, modal alerts).
pub trait OperatorNotifier: Send + Sync + 'static {
    fn alert(&self, message: &str);
}

/// Viewer capabilities handed to the panel by the host.
#[derive(Clone, Default)]
pub struct ViewerContext {
    pub viewport: Option<Arc<dyn OverrideTarget>>,
    pub selection: Option<Arc<dyn SelectionSource>>,
    pub notifier: Option<Arc<dyn OperatorNotifier>>,
}

impl ViewerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_viewport(mut self, viewport: Arc<dyn OverrideTarget>) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_selection(mut self, selection: Arc<dyn SelectionSource>) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn OperatorNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Wire every capability to a single [`SceneViewer`].
    pub fn from_scene(scene: Arc<SceneViewer>) -> Self {
        Self::new()
            .with_viewport(scene.clone())
            .with_selection(scene.clone())
            .with_notifier(scene)
    }
}

impl fmt::Debug for ViewerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerContext")
            .field("viewport", &self.viewport.is_some())
            .field("selection", &self.selection.is_some())
            .field("notifier", &self.notifier.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
struct SceneInner {
    elements: Vec<ElementId>,
    selected: IndexSet<ElementId>,
    overrides: IndexMap<ElementId, Rgb>,
    alerts: Vec<String>,
}

/// In-memory viewer used by terminal hosts and tests.
#[derive(Debug, Default)]
pub struct SceneViewer {
    inner: Mutex<SceneInner>,
}

impl SceneViewer {
    pub fn new(elements: impl IntoIterator<Item = ElementId>) -> Self {
        Self {
            inner: Mutex::new(SceneInner {
                elements: elements.into_iter().collect(),
                ..SceneInner::default()
            }),
        }
    }

    pub fn elements(&self) -> Vec<ElementId> {
        self.inner.lock().elements.clone()
    }

    /// Returns `false` for ids the scene does not contain.
    pub fn select(&self, id: &ElementId) -> bool {
        let mut inner = self.inner.lock();
        if !inner.elements.contains(id) {
            return false;
        }
        inner.selected.insert(id.clone());
        true
    }

    /// Toggle selection and return whether the element is now selected.
    pub fn toggle(&self, id: &ElementId) -> bool {
        let mut inner = self.inner.lock();
        if inner.selected.shift_remove(id) {
            return false;
        }
        if !inner.elements.contains(id) {
            return false;
        }
        inner.selected.insert(id.clone());
        true
    }

    pub fn clear_selection(&self) {
        self.inner.lock().selected.clear();
    }

    pub fn is_selected(&self, id: &ElementId) -> bool {
        self.inner.lock().selected.contains(id)
    }

    pub fn overrides(&self) -> IndexMap<ElementId, Rgb> {
        self.inner.lock().overrides.clone()
    }

    pub fn override_for(&self, id: &ElementId) -> Option<Rgb> {
        self.inner.lock().overrides.get(id).copied()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.inner.lock().alerts.clone()
    }

    /// Drain pending alerts, e.g. once the operator dismissed the modal.
    pub fn take_alerts(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.lock().alerts)
    }
}

impl SelectionSource for SceneViewer {
    fn selected_elements(&self) -> Vec<ElementId> {
        self.inner.lock().selected.iter().cloned().collect()
    }
}

impl OverrideTarget for SceneViewer {
    fn clear_overrides(&self) {
        self.inner.lock().overrides.clear();
    }

    fn override_color(&self, elements: &[ElementId], color: Rgb) {
        let mut inner = self.inner.lock();
        for id in elements {
            inner.overrides.insert(id.clone(), color);
        }
    }
}

impl OperatorNotifier for SceneViewer {
    fn alert(&self, message: &str) {
        self.inner.lock().alerts.push(message.to_owned());
    }
}
