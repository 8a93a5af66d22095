use crate::form::FormSnapshot;
use crate::progress::{Gradient, ProgressSnapshot, evaluate, ring_offset};
use handlebars::Handlebars;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::json;

const SECTIONS_TEMPLATE: &str = "{{#each sections}}<div class=\"section-item {{#if completed}}completed{{else}}incomplete{{/if}}\">{{#if completed}}✓{{else}}○{{/if}} {{name}}</div>{{/each}}";

lazy_static! {
    static ref PANEL: Handlebars<'static> = {
        let mut hb = Handlebars::new();
        hb.set_strict_mode(true);
        hb.register_template_string("sections", SECTIONS_TEMPLATE)
            .unwrap();
        hb
    };
}

/// Content of the collapsible detail panel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetailPanel {
    /// One `section-item` element per counted section
    pub sections_html: String,

    /// Guidance line shown under the list
    pub current: String,

    /// True once every counted section is complete
    pub ready: bool,
}

impl DetailPanel {
    /// Renders the panel for a snapshot
    ///
    /// Section names are HTML-escaped.
    pub fn render(snapshot: &ProgressSnapshot) -> Result<Self, handlebars::RenderError> {
        let sections_html = PANEL.render(
            "sections",
            &json!({ "sections": snapshot.section_statuses }),
        )?;

        let ready = !snapshot.section_statuses.is_empty()
            && snapshot.first_incomplete_section.is_none();
        let current = match (&snapshot.first_incomplete_section, ready) {
            (_, true) => "✓ Ready to submit!".to_string(),
            (Some(name), false) => format!("Current: {}", name),
            (None, false) => String::new(),
        };

        Ok(DetailPanel {
            sections_html,
            current,
            ready,
        })
    }
}

/// A rendering surface for the progress indicator
///
/// Every element is optional: a surface that has no ring, label or panel just
/// keeps the default no-op for that method.
pub trait ProgressSurface {
    fn set_ring_offset(&mut self, _offset: f64) {}
    fn set_percent_label(&mut self, _label: &str) {}
    fn set_gradient(&mut self, _gradient: &Gradient) {}
    fn set_complete(&mut self, _complete: bool) {}
    fn set_details(&mut self, _panel: &DetailPanel) {}
    fn set_visible(&mut self, _visible: bool) {}
}

/// Applies a snapshot to a surface
pub fn apply(snapshot: &ProgressSnapshot, surface: &mut dyn ProgressSurface) {
    surface.set_ring_offset(ring_offset(snapshot.percentage));
    surface.set_percent_label(&format!("{}%", snapshot.percentage));
    surface.set_gradient(&Gradient::for_percentage(snapshot.percentage));
    surface.set_complete(snapshot.is_complete());

    match DetailPanel::render(snapshot) {
        Ok(panel) => surface.set_details(&panel),
        Err(e) => log::debug!("Skipping detail panel: {}", e),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Editing,
    Submitted,
    Closed,
}

/// Drives a progress indicator across the life of one form page
///
/// Recomputes on every [`Tracker::refresh`] until the form is submitted
/// successfully or the poll is closed, after which the indicator stays hidden.
#[derive(Debug)]
pub struct Tracker {
    phase: Phase,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Tracker {
            phase: Phase::Editing,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Editing
    }

    /// Recomputes progress and applies it
    ///
    /// # Returns
    /// * `Option<ProgressSnapshot>` - The new snapshot, or None once the tracker is hidden
    pub fn refresh(
        &mut self,
        form: &FormSnapshot,
        surface: &mut dyn ProgressSurface,
    ) -> Option<ProgressSnapshot> {
        if !self.is_active() {
            return None;
        }
        let snapshot = evaluate(form);
        apply(&snapshot, surface);
        Some(snapshot)
    }

    /// Hides the indicator once the success view is shown
    pub fn show_success(&mut self, surface: &mut dyn ProgressSurface) {
        self.phase = Phase::Submitted;
        surface.set_visible(false);
    }

    /// Hides the indicator because the poll no longer accepts responses
    pub fn close(&mut self, surface: &mut dyn ProgressSurface) {
        self.phase = Phase::Closed;
        surface.set_visible(false);
    }
}

/// A surface that records everything applied to it
///
/// Serialized as the body of the progress endpoint so a static page can copy
/// the values onto its own elements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanelState {
    pub visible: bool,
    pub ring_offset: Option<f64>,
    pub percent_label: Option<String>,
    pub gradient: Option<Gradient>,
    pub complete: bool,
    pub details: Option<DetailPanel>,
}

impl Default for PanelState {
    fn default() -> Self {
        PanelState {
            visible: true,
            ring_offset: None,
            percent_label: None,
            gradient: None,
            complete: false,
            details: None,
        }
    }
}

impl ProgressSurface for PanelState {
    fn set_ring_offset(&mut self, offset: f64) {
        self.ring_offset = Some(offset);
    }

    fn set_percent_label(&mut self, label: &str) {
        self.percent_label = Some(label.to_string());
    }

    fn set_gradient(&mut self, gradient: &Gradient) {
        self.gradient = Some(gradient.clone());
    }

    fn set_complete(&mut self, complete: bool) {
        self.complete = complete;
    }

    fn set_details(&mut self, panel: &DetailPanel) {
        self.details = Some(panel.clone());
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}
