use imgui::{Ui, Condition};
use winit::event::{KeyEvent, ElementState};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Keyboard shortcut manager
pub struct ShortcutManager {
    shortcuts: Vec<Shortcut>,
}

#[derive(Clone)]
pub struct Shortcut {
    pub key: PhysicalKey,
    pub ctrl: bool,
    pub shift: bool,
    pub action: ShortcutAction,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShortcutAction {
    OpenRoute,
    TogglePlay,
    Reset,
    SpeedUp,
    SpeedDown,
    Recenter,
    ToggleFollow,
    ShowHelp,
    Quit,
}

impl ShortcutManager {
    pub fn new() -> Self {
        let mut manager = Self {
            shortcuts: Vec::new(),
        };
        manager.register_defaults();
        manager
    }

    fn register_defaults(&mut self) {
        self.register(KeyCode::KeyO, true, ShortcutAction::OpenRoute, "Open Route");

        // Playback
        self.register(KeyCode::Space, false, ShortcutAction::TogglePlay, "Play/Pause");
        self.register(KeyCode::KeyR, false, ShortcutAction::Reset, "Reset");
        self.register(KeyCode::Equal, false, ShortcutAction::SpeedUp, "Shorter Interval");
        self.register(KeyCode::Minus, false, ShortcutAction::SpeedDown, "Longer Interval");

        // Map
        self.register(KeyCode::KeyC, false, ShortcutAction::Recenter, "Recenter Map");
        self.register(KeyCode::KeyF, false, ShortcutAction::ToggleFollow, "Follow Vehicle");

        self.register(KeyCode::F1, false, ShortcutAction::ShowHelp, "Keyboard Shortcuts");
        self.register(KeyCode::KeyQ, true, ShortcutAction::Quit, "Quit");
    }

    fn register(&mut self, code: KeyCode, ctrl: bool, action: ShortcutAction, description: &str) {
        self.shortcuts.push(Shortcut {
            key: PhysicalKey::Code(code),
            ctrl,
            shift: false,
            action,
            description: description.to_string(),
        });
    }

    /// Match a pressed key against the registered shortcuts
    pub fn lookup(&self, key: PhysicalKey, ctrl: bool, shift: bool) -> Option<ShortcutAction> {
        self.shortcuts
            .iter()
            .find(|s| s.key == key && s.ctrl == ctrl && s.shift == shift)
            .map(|s| s.action)
    }

    /// Process a key event and return the matching action (if any)
    pub fn process_event(&self, event: &KeyEvent, ctrl: bool, shift: bool) -> Option<ShortcutAction> {
        if event.state != ElementState::Pressed || event.repeat {
            return None;
        }
        self.lookup(event.physical_key, ctrl, shift)
    }

    /// Render a shortcuts help window
    pub fn render_help(&self, ui: &Ui, is_open: &mut bool) {
        ui.window("Keyboard Shortcuts")
            .size([320.0, 300.0], Condition::FirstUseEver)
            .position([500.0, 200.0], Condition::FirstUseEver)
            .opened(is_open)
            .build(|| {
                let mut current_category = "";

                for shortcut in &self.shortcuts {
                    let category = match shortcut.action {
                        ShortcutAction::TogglePlay |
                        ShortcutAction::Reset |
                        ShortcutAction::SpeedUp |
                        ShortcutAction::SpeedDown => "Playback",
                        ShortcutAction::Recenter |
                        ShortcutAction::ToggleFollow => "Map",
                        ShortcutAction::OpenRoute |
                        ShortcutAction::ShowHelp |
                        ShortcutAction::Quit => "General",
                    };

                    if category != current_category {
                        if !current_category.is_empty() {
                            ui.separator();
                        }
                        ui.text(category);
                        current_category = category;
                    }

                    let mut shortcut_str = String::new();
                    if shortcut.ctrl {
                        shortcut_str.push_str("Ctrl+");
                    }
                    if shortcut.shift {
                        shortcut_str.push_str("Shift+");
                    }
                    shortcut_str.push_str(&key_to_string(shortcut.key));

                    ui.text(format!("  {:12} - {}", shortcut_str, shortcut.description));
                }
            });
    }
}

fn key_to_string(key: PhysicalKey) -> String {
    match key {
        PhysicalKey::Code(code) => match code {
            KeyCode::Space => "Space".to_string(),
            KeyCode::Equal => "+".to_string(),
            KeyCode::Minus => "-".to_string(),
            KeyCode::F1 => "F1".to_string(),
            _ => {
                let name = format!("{:?}", code);
                name.strip_prefix("Key").map(str::to_string).unwrap_or(name)
            }
        },
        _ => "?".to_string(),
    }
}

impl Default for ShortcutManager {
    fn default() -> Self {
        Self::new()
    }
}
