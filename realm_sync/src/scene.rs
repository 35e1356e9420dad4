//! Area/map display mode and the debounced map rebuild on resize.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SceneMode {
    #[default]
    AreaView,
    MapView,
}

/// A one-shot deadline that can be pushed back or cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduledTask {
    deadline: Option<Instant>,
}

impl ScheduledTask {
    /// Arm the task, replacing any earlier deadline.
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fires at most once per schedule.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneState {
    mode: SceneMode,
    quiescence: Duration,
    resize_rebuild: ScheduledTask,
    panel_collapsed: bool,
    active_tab: PanelTab,
}

/// Character panel tab shown while the panel is expanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PanelTab {
    #[default]
    Stats,
    Equipment,
    Inventory,
    Skills,
}

impl PanelTab {
    pub const ALL: [PanelTab; 4] = [
        PanelTab::Stats,
        PanelTab::Equipment,
        PanelTab::Inventory,
        PanelTab::Skills,
    ];

    pub fn next(self) -> Self {
        match self {
            PanelTab::Stats => PanelTab::Equipment,
            PanelTab::Equipment => PanelTab::Inventory,
            PanelTab::Inventory => PanelTab::Skills,
            PanelTab::Skills => PanelTab::Stats,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PanelTab::Stats => "Stats",
            PanelTab::Equipment => "Equipment",
            PanelTab::Inventory => "Inventory",
            PanelTab::Skills => "Skills",
        }
    }
}

impl SceneState {
    pub fn new(quiescence: Duration) -> Self {
        Self {
            mode: SceneMode::AreaView,
            quiescence,
            resize_rebuild: ScheduledTask::default(),
            panel_collapsed: false,
            active_tab: PanelTab::default(),
        }
    }

    pub fn mode(&self) -> SceneMode {
        self.mode
    }

    /// Switch modes. The caller rebuilds the scene for the returned mode.
    pub fn toggle(&mut self) -> SceneMode {
        self.enter(match self.mode {
            SceneMode::AreaView => SceneMode::MapView,
            SceneMode::MapView => SceneMode::AreaView,
        })
    }

    pub fn enter(&mut self, mode: SceneMode) -> SceneMode {
        if mode != SceneMode::MapView && self.resize_rebuild.cancel() {
            tracing::trace!(target: "realm::scene", "resize_rebuild.cancelled");
        }
        self.mode = mode;
        mode
    }

    /// Resize events only matter for the map; each one restarts the quiet period.
    pub fn on_resize(&mut self, now: Instant) -> bool {
        if self.mode != SceneMode::MapView {
            return false;
        }
        self.resize_rebuild.schedule(now, self.quiescence);
        true
    }

    /// Returns `true` once the resize burst has settled and the map needs a rebuild.
    pub fn poll(&mut self, now: Instant) -> bool {
        self.mode == SceneMode::MapView && self.resize_rebuild.poll(now)
    }

    pub fn rebuild_pending(&self) -> bool {
        self.resize_rebuild.is_pending()
    }

    pub fn teardown(&mut self) {
        self.resize_rebuild.cancel();
    }

    pub fn toggle_panel(&mut self) -> bool {
        self.panel_collapsed = !self.panel_collapsed;
        self.panel_collapsed
    }

    pub fn panel_collapsed(&self) -> bool {
        self.panel_collapsed
    }

    pub fn cycle_tab(&mut self) -> PanelTab {
        self.active_tab = self.active_tab.next();
        self.active_tab
    }

    pub fn active_tab(&self) -> PanelTab {
        self.active_tab
    }
}
