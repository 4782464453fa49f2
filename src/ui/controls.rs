use imgui::{Condition, Ui};
use crate::playback::{
    PlaybackConfig, PlaybackEngine, PlaybackState, INTERVAL_STEP_MS, MAX_INTERVAL_MS, MIN_INTERVAL_MS,
};

/// Action requested from the controls panel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackAction {
    None,
    TogglePlay,
    Reset,
    SetInterval(u32),
    Recenter,
    SetFollow(bool),
}

/// Readouts shown under the map
#[derive(Debug, Clone, PartialEq)]
pub struct Readouts {
    pub coordinates: String,
    pub elapsed: String,
    pub speed: String,
    pub heading: String,
}

impl Readouts {
    pub fn from_engine(engine: &PlaybackEngine) -> Self {
        let current = engine.route().get(engine.index()).unwrap_or_else(|| engine.route().first());
        Self {
            coordinates: format!("{}, {}", current.latitude, current.longitude),
            elapsed: format!("{} sec", engine.elapsed_secs()),
            speed: format!("{:.2} km/h", engine.speed_kmh()),
            heading: format!("{:.0}°", engine.heading()),
        }
    }
}

/// Play/pause, reset, speed slider and readouts
pub struct ControlsPanel;

impl ControlsPanel {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&mut self, ui: &Ui, engine: &PlaybackEngine, follow: bool, is_open: &mut bool) -> PlaybackAction {
        let mut action = PlaybackAction::None;

        ui.window("Playback")
            .size([420.0, 260.0], Condition::FirstUseEver)
            .position([20.0, 560.0], Condition::FirstUseEver)
            .opened(is_open)
            .build(|| {
                let state = engine.state();
                let label = match state {
                    PlaybackState::Playing => "Pause",
                    PlaybackState::Paused | PlaybackState::AtEnd => "Play",
                };

                {
                    let _disabled = ui.begin_disabled(state == PlaybackState::AtEnd);
                    if ui.button_with_size(label, [90.0, 0.0]) {
                        action = PlaybackAction::TogglePlay;
                    }
                }
                ui.same_line();
                if ui.button_with_size("Reset", [90.0, 0.0]) {
                    action = PlaybackAction::Reset;
                }
                ui.same_line();
                if ui.button("Recenter") {
                    action = PlaybackAction::Recenter;
                }
                ui.same_line();
                let mut follow_marker = follow;
                if ui.checkbox("Follow", &mut follow_marker) {
                    action = PlaybackAction::SetFollow(follow_marker);
                }

                ui.separator();

                ui.text("Simulation Speed");
                let mut interval = engine.interval_ms() as i32;
                if ui
                    .slider_config("##interval", MIN_INTERVAL_MS as i32, MAX_INTERVAL_MS as i32)
                    .display_format("%d ms")
                    .build(&mut interval)
                {
                    let snapped = PlaybackConfig::normalize_interval(interval.max(0) as u32);
                    if snapped != engine.interval_ms() {
                        action = PlaybackAction::SetInterval(snapped);
                    }
                }
                ui.text_colored(
                    [0.6, 0.6, 0.6, 1.0],
                    format!("Interval: {} ms (step {} ms)", engine.interval_ms(), INTERVAL_STEP_MS),
                );

                ui.separator();

                let readouts = Readouts::from_engine(engine);
                ui.text("Current Coordinates:");
                ui.same_line_with_pos(170.0);
                ui.text(&readouts.coordinates);
                ui.text("Elapsed Time:");
                ui.same_line_with_pos(170.0);
                ui.text(&readouts.elapsed);
                ui.text("Speed:");
                ui.same_line_with_pos(170.0);
                ui.text(&readouts.speed);
                ui.text("Heading:");
                ui.same_line_with_pos(170.0);
                ui.text(&readouts.heading);

                ui.text_colored(
                    [0.6, 0.6, 0.6, 1.0],
                    format!("Waypoint {}/{}", engine.index() + 1, engine.route().len()),
                );
            });

        action
    }
}

impl Default for ControlsPanel {
    fn default() -> Self {
        Self::new()
    }
}
