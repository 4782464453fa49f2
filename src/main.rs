mod core;
mod headless;
mod input;
mod playback;
mod ui;

use core::Route;
use playback::{PlaybackConfig, PlaybackEngine, DEFAULT_INTERVAL_MS, INTERVAL_STEP_MS};
use ui::{ControlsPanel, FileDialogs, MapView, PlaybackAction, ShortcutAction, ShortcutManager};
use anyhow::{Context as _, Result};
use clap::Parser;
use imgui::{Context, FontConfig, FontSource};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::ModifiersState;
use winit::window::WindowBuilder;

use glutin::prelude::*;
use glutin::display::{Display, DisplayApiPreference};
use glutin_winit::GlWindow;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use glow::HasContext;

use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Instant;
use serde::{Deserialize, Serialize};

/// Animate a vehicle along a recorded route on an interactive map
#[derive(Parser, Debug)]
#[command(name = "route-playback", version, about)]
struct Cli {
    /// Route file (JSON array or CSV); the bundled route is used when omitted
    #[arg(short, long)]
    route: Option<PathBuf>,

    /// Milliseconds between waypoints (200-3000, step 100)
    #[arg(short, long)]
    interval: Option<u32>,

    /// Play the route without a window, logging each waypoint
    #[arg(long)]
    headless: bool,

    /// Start playing as soon as the window opens
    #[arg(long)]
    autoplay: bool,
}

/// Result of a background route load
enum LoadingUpdate {
    Complete(PathBuf, Route),
    Error(PathBuf, String),
}

/// Persistent application settings
#[derive(Serialize, Deserialize)]
#[serde(default)]
struct AppSettings {
    interval_ms: u32,
    show_controls: bool,
    show_shortcuts: bool,
    follow_marker: bool,
    last_route: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            show_controls: true,
            show_shortcuts: false,
            follow_marker: false,
            last_route: None,
        }
    }
}

impl AppSettings {
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("route-playback"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path).map(|s| serde_json::from_str::<Self>(&s)) {
            Ok(Ok(settings)) => settings,
            Ok(Err(e)) => {
                warn!(path = %path.display(), "ignoring unreadable settings: {}", e);
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), "failed to read settings: {}", e);
                Self::default()
            }
        }
    }

    fn save(&self) -> Result<()> {
        let path = Self::config_path().context("No config directory on this platform")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

struct AppState {
    engine: PlaybackEngine,
    map_view: MapView,
    controls: ControlsPanel,
    shortcut_manager: ShortcutManager,
    route_path: Option<PathBuf>,
    status_message: Option<String>,
    show_controls: bool,
    show_shortcuts: bool,
    show_file_open_pending: bool,
    quit_requested: bool,
    loading_receiver: Option<Receiver<LoadingUpdate>>,
    last_update: Instant,
}

impl AppState {
    fn new(route: Route, route_path: Option<PathBuf>, settings: &AppSettings) -> Self {
        let mut map_view = MapView::new(route.first().position());
        map_view.set_follow_marker(settings.follow_marker);

        Self {
            engine: PlaybackEngine::new(route, PlaybackConfig { interval_ms: settings.interval_ms }),
            map_view,
            controls: ControlsPanel::new(),
            shortcut_manager: ShortcutManager::new(),
            route_path,
            status_message: None,
            show_controls: settings.show_controls,
            show_shortcuts: settings.show_shortcuts,
            show_file_open_pending: false,
            quit_requested: false,
            loading_receiver: None,
            last_update: Instant::now(),
        }
    }

    fn settings(&self) -> AppSettings {
        AppSettings {
            interval_ms: self.engine.interval_ms(),
            show_controls: self.show_controls,
            show_shortcuts: self.show_shortcuts,
            follow_marker: self.map_view.follow_marker(),
            last_route: self.route_path.clone(),
        }
    }

    fn save_settings(&self) {
        if let Err(e) = self.settings().save() {
            warn!("failed to save settings: {:#}", e);
        }
    }

    /// Load a route file on the runtime without blocking the frame loop
    fn load_route(&mut self, rt: &tokio::runtime::Runtime, path: PathBuf) {
        self.status_message = Some(format!("Loading {}...", path.display()));

        let (tx, rx) = channel();
        self.loading_receiver = Some(rx);

        rt.spawn(async move {
            let update = match tokio::fs::read(&path).await {
                Ok(data) => match input::parse_route(&data) {
                    Ok(route) => LoadingUpdate::Complete(path, route),
                    Err(e) => LoadingUpdate::Error(path, format!("{:#}", e)),
                },
                Err(e) => LoadingUpdate::Error(path, e.to_string()),
            };
            let _ = tx.send(update);
        });
    }

    /// Pick up a finished background load
    fn process_loading(&mut self) {
        let Some(receiver) = self.loading_receiver.take() else {
            return;
        };

        match receiver.try_recv() {
            Ok(LoadingUpdate::Complete(path, route)) => {
                info!(path = %path.display(), waypoints = route.len(), "route loaded");
                self.status_message = Some(format!("Loaded {} waypoints from {}", route.len(), path.display()));
                self.replace_route(route);
                self.route_path = Some(path);
            }
            Ok(LoadingUpdate::Error(path, e)) => {
                error!(path = %path.display(), "failed to load route: {}", e);
                self.status_message = Some(format!("Failed to load route: {}", e));
            }
            Err(std::sync::mpsc::TryRecvError::Empty) => {
                self.loading_receiver = Some(receiver);
            }
            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                self.status_message = Some("Route loading was interrupted".to_string());
            }
        }
    }

    fn replace_route(&mut self, route: Route) {
        let config = PlaybackConfig { interval_ms: self.engine.interval_ms() };
        self.engine.dispose();
        self.map_view.recenter(route.first().position());
        self.engine = PlaybackEngine::new(route, config);
    }

    fn load_bundled_route(&mut self) {
        match input::bundled_route() {
            Ok(route) => {
                self.replace_route(route);
                self.route_path = None;
                self.status_message = Some("Loaded bundled route".to_string());
            }
            Err(e) => error!("{:#}", e),
        }
    }

    fn process_file_dialogs(&mut self, rt: &tokio::runtime::Runtime) {
        if self.show_file_open_pending {
            if let Some(path) = FileDialogs::open_route_file() {
                self.load_route(rt, path);
            }
            self.show_file_open_pending = false;
        }
    }

    /// Advance playback by the wall-clock time since the last frame
    fn update(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_update;
        self.last_update = now;
        self.engine.update(delta);
    }

    fn apply_action(&mut self, action: PlaybackAction) {
        match action {
            PlaybackAction::None => {}
            PlaybackAction::TogglePlay => self.engine.toggle_play(),
            PlaybackAction::Reset => {
                self.engine.reset();
                self.status_message = None;
            }
            PlaybackAction::SetInterval(ms) => self.engine.set_interval(ms),
            PlaybackAction::Recenter => self.map_view.recenter(self.engine.marker()),
            PlaybackAction::SetFollow(follow) => self.map_view.set_follow_marker(follow),
        }
    }

    fn apply_shortcut(&mut self, action: ShortcutAction) {
        match action {
            ShortcutAction::OpenRoute => self.show_file_open_pending = true,
            ShortcutAction::TogglePlay => self.apply_action(PlaybackAction::TogglePlay),
            ShortcutAction::Reset => self.apply_action(PlaybackAction::Reset),
            ShortcutAction::SpeedUp => {
                let ms = self.engine.interval_ms().saturating_sub(INTERVAL_STEP_MS);
                self.apply_action(PlaybackAction::SetInterval(ms));
            }
            ShortcutAction::SpeedDown => {
                let ms = self.engine.interval_ms() + INTERVAL_STEP_MS;
                self.apply_action(PlaybackAction::SetInterval(ms));
            }
            ShortcutAction::Recenter => self.apply_action(PlaybackAction::Recenter),
            ShortcutAction::ToggleFollow => {
                let follow = !self.map_view.follow_marker();
                self.apply_action(PlaybackAction::SetFollow(follow));
            }
            ShortcutAction::ShowHelp => self.show_shortcuts = true,
            ShortcutAction::Quit => self.quit_requested = true,
        }
    }

    /// Explicit teardown when the view goes away
    fn shutdown(&mut self) {
        self.engine.dispose();
        self.save_settings();
        info!("view closed");
    }
}

/// Choose the route to start with: CLI flag, then last used file, then the bundled one
fn initial_route(cli_route: Option<&Path>, settings: &AppSettings) -> Result<(Route, Option<PathBuf>)> {
    if let Some(path) = cli_route {
        return Ok((input::load_route(path)?, Some(path.to_path_buf())));
    }

    if let Some(path) = settings.last_route.as_deref().filter(|p| p.exists()) {
        match input::load_route(path) {
            Ok(route) => return Ok((route, Some(path.to_path_buf()))),
            Err(e) => warn!("last route unavailable, using bundled route: {:#}", e),
        }
    }

    Ok((input::bundled_route()?, None))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut settings = AppSettings::load();
    if let Some(interval) = cli.interval {
        settings.interval_ms = PlaybackConfig::normalize_interval(interval);
    }

    let (route, route_path) = initial_route(cli.route.as_deref(), &settings)?;
    info!(waypoints = route.len(), length_m = route.length_m(), "route ready");

    if cli.headless {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .context("Failed to create Tokio runtime")?;

        let mut engine = PlaybackEngine::new(route, PlaybackConfig { interval_ms: settings.interval_ms });
        let summary = rt.block_on(headless::run(&mut engine));
        engine.dispose();

        println!(
            "{} ticks, {} s of route time, {:.0} m, max {:.2} km/h, played in {:.1} s",
            summary.ticks,
            summary.elapsed_secs,
            summary.distance_m,
            summary.max_speed_kmh,
            summary.wall_time.as_secs_f64()
        );
        return Ok(());
    }

    let mut state = AppState::new(route, route_path, &settings);
    if cli.autoplay {
        state.engine.toggle_play();
    }

    run_gui(state)
}

/// Highest-ranked item, or `None` when there are none
fn pick_best<T, K: Ord>(items: impl Iterator<Item = T>, rank: impl Fn(&T) -> K) -> Option<T> {
    items.reduce(|best, item| if rank(&item) > rank(&best) { item } else { best })
}

#[cfg(target_os = "windows")]
fn display_preference(window: &winit::window::Window) -> DisplayApiPreference {
    DisplayApiPreference::Wgl(Some(window.raw_window_handle()))
}

#[cfg(target_os = "macos")]
fn display_preference(_window: &winit::window::Window) -> DisplayApiPreference {
    DisplayApiPreference::Cgl
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn display_preference(_window: &winit::window::Window) -> DisplayApiPreference {
    DisplayApiPreference::Egl
}

fn run_gui(mut state: AppState) -> Result<()> {
    // Create tokio runtime for background loading
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    // Create event loop
    let event_loop = EventLoop::new().context("Failed to create EventLoop")?;

    // Build the window, then the GL display and config for it
    let window = WindowBuilder::new()
        .with_title("Route Playback")
        .with_inner_size(winit::dpi::LogicalSize::new(1200.0, 860.0))
        .build(&event_loop)
        .context("Failed to create window")?;

    let gl_display = unsafe { Display::new(window.raw_display_handle(), display_preference(&window)) }
        .context("Failed to create GL display")?;

    let template = glutin::config::ConfigTemplateBuilder::new()
        .compatible_with_native_window(window.raw_window_handle())
        .build();
    let configs = unsafe { gl_display.find_configs(template) }.context("Failed to query GL configs")?;
    let gl_config = pick_best(configs, |c| c.num_samples()).context("Display offered no GL configs")?;

    // Create the context using the proper API
    let context = unsafe {
        gl_display.create_context(
            &gl_config,
            &glutin::context::ContextAttributesBuilder::new()
                .build(Some(window.raw_window_handle())),
        )
    }.context("Failed to create GL context")?;

    // Create surface and make context current
    let attrs = window.build_surface_attributes(
        glutin::surface::SurfaceAttributesBuilder::<glutin::surface::WindowSurface>::new()
    );

    let surface = unsafe {
        gl_display.create_window_surface(&gl_config, &attrs)
    }.context("Failed to create surface")?;

    let context = context.make_current(&surface).context("Failed to make context current")?;

    let loader = |name: &str| {
        std::ffi::CString::new(name)
            .map(|symbol| gl_display.get_proc_address(&symbol))
            .unwrap_or(std::ptr::null())
    };

    // Create glow context for renderer
    let gl = unsafe { glow::Context::from_loader_function(|name| loader(name)) };

    // Set up imgui
    let mut imgui = Context::create();
    imgui.set_log_filename(None::<PathBuf>);

    // Window layout lives next to the settings
    if let Some(dir) = AppSettings::config_dir() {
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("cannot create config dir: {}", e);
        }
        imgui.set_ini_filename(Some(dir.join("layout.ini")));
    }

    // Enable docking
    imgui.io_mut().config_flags |= imgui::ConfigFlags::DOCKING_ENABLE;

    // Configure fonts
    let hidpi_factor = window.scale_factor();
    let font_size = (14.0 * hidpi_factor) as f32;
    imgui.fonts().add_font(&[FontSource::DefaultFontData {
        config: Some(FontConfig {
            size_pixels: font_size,
            ..FontConfig::default()
        }),
    }]);
    imgui.io_mut().font_global_scale = (1.0 / hidpi_factor) as f32;

    // Set up platform and renderer
    let mut platform = WinitPlatform::init(&mut imgui);
    platform.attach_window(imgui.io_mut(), &window, HiDpiMode::Default);

    let mut renderer = imgui_glow_renderer::AutoRenderer::initialize(gl, &mut imgui)
        .map_err(|e| anyhow::anyhow!("Failed to initialize renderer: {}", e))?;

    // Second glow context for clearing (both reference the same GL context)
    let gl_clear = unsafe { glow::Context::from_loader_function(|name| loader(name)) };

    let mut last_frame_time = Instant::now();
    let mut last_settings_save = Instant::now();
    let mut modifiers = ModifiersState::empty();

    info!("window open");

    // Main loop
    event_loop.run(move |event, window_target| {
        match event {
            Event::NewEvents(_) => {
                let now = Instant::now();
                imgui.io_mut().update_delta_time(now - last_frame_time);
                last_frame_time = now;
            }
            Event::AboutToWait => {
                state.process_file_dialogs(&rt);
                state.process_loading();
                state.update();

                if state.quit_requested {
                    state.shutdown();
                    window_target.exit();
                    return;
                }

                // Save settings periodically (every 30 seconds)
                if last_settings_save.elapsed().as_secs() >= 30 {
                    state.save_settings();
                    last_settings_save = Instant::now();
                }

                if let Err(e) = platform.prepare_frame(imgui.io_mut(), &window) {
                    error!("failed to prepare frame: {}", e);
                }
                window.request_redraw();
            }
            Event::WindowEvent { event: WindowEvent::ModifiersChanged(ref new), .. } => {
                modifiers = new.state();
            }
            Event::WindowEvent { event: WindowEvent::KeyboardInput { ref event, .. }, .. } => {
                if !imgui.io().want_capture_keyboard {
                    if let Some(action) = state.shortcut_manager.process_event(
                        event,
                        modifiers.control_key() || modifiers.super_key(),
                        modifiers.shift_key(),
                    ) {
                        state.apply_shortcut(action);
                    }
                }
            }
            Event::WindowEvent { event: WindowEvent::Resized(size), .. } => {
                if let (Some(w), Some(h)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height)) {
                    surface.resize(&context, w, h);
                }
            }
            Event::WindowEvent { event: WindowEvent::RedrawRequested, .. } => {
                let ui = imgui.new_frame();

                // Menu bar
                ui.main_menu_bar(|| {
                    ui.menu("File", || {
                        if ui.menu_item("Open Route...") {
                            state.show_file_open_pending = true;
                        }
                        if ui.menu_item("Load Bundled Route") {
                            state.load_bundled_route();
                        }
                        ui.separator();
                        if ui.menu_item("Exit") {
                            state.quit_requested = true;
                        }
                    });

                    ui.menu("Playback", || {
                        let label = if state.engine.is_playing() { "Pause" } else { "Play" };
                        if ui.menu_item_config(label).enabled(!state.engine.at_end()).build() {
                            state.apply_action(PlaybackAction::TogglePlay);
                        }
                        if ui.menu_item("Reset") {
                            state.apply_action(PlaybackAction::Reset);
                        }
                        ui.separator();
                        ui.text(format!("Interval: {} ms", state.engine.interval_ms()));
                    });

                    ui.menu("View", || {
                        if ui.menu_item_config("Playback Controls").selected(state.show_controls).build() {
                            state.show_controls = !state.show_controls;
                        }
                        let follow = state.map_view.follow_marker();
                        if ui.menu_item_config("Follow Vehicle").selected(follow).build() {
                            state.apply_action(PlaybackAction::SetFollow(!follow));
                        }
                        if ui.menu_item("Recenter Map") {
                            state.apply_action(PlaybackAction::Recenter);
                        }
                    });

                    ui.menu("Help", || {
                        if ui.menu_item("Keyboard Shortcuts") {
                            state.show_shortcuts = true;
                        }
                    });
                });

                // Status bar
                let window_size = window.inner_size();
                let logical_w = window_size.width as f32 / hidpi_factor as f32;
                let logical_h = window_size.height as f32 / hidpi_factor as f32;
                ui.set_cursor_pos([0.0, logical_h - 25.0]);
                ui.child_window("Status")
                    .size([logical_w, 25.0])
                    .build(|| {
                        if let Some(ref msg) = state.status_message {
                            ui.text(msg);
                        } else {
                            let source = state.route_path
                                .as_ref()
                                .map(|p| p.display().to_string())
                                .unwrap_or_else(|| "bundled route".to_string());
                            ui.text(format!(
                                "{} | {} waypoints | {:.0} m | {:?}",
                                source,
                                state.engine.route().len(),
                                state.engine.route().length_m(),
                                state.engine.state(),
                            ));
                        }
                    });

                ui.dockspace_over_main_viewport();

                ui.window("Map")
                    .size([900.0, 520.0], imgui::Condition::FirstUseEver)
                    .position([20.0, 30.0], imgui::Condition::FirstUseEver)
                    .build(|| {
                        state.map_view.render(ui, &state.engine);
                    });

                if state.show_controls {
                    let follow = state.map_view.follow_marker();
                    let action = state.controls.render(ui, &state.engine, follow, &mut state.show_controls);
                    state.apply_action(action);
                }

                if state.show_shortcuts {
                    state.shortcut_manager.render_help(ui, &mut state.show_shortcuts);
                }

                // Prepare and render
                platform.prepare_render(ui, &window);
                let draw_data = imgui.render();

                unsafe {
                    gl_clear.clear_color(0.1, 0.1, 0.1, 1.0);
                    gl_clear.clear(glow::COLOR_BUFFER_BIT);
                }

                if let Err(e) = renderer.render(draw_data) {
                    error!("rendering failed: {}", e);
                    state.quit_requested = true;
                }

                if let Err(e) = surface.swap_buffers(&context) {
                    error!("failed to swap buffers: {}", e);
                }
            }
            Event::WindowEvent { event: WindowEvent::CloseRequested, .. } => {
                state.shutdown();
                window_target.exit();
            }
            _ => {}
        }

        platform.handle_event(imgui.io_mut(), &window, &event);
    }).map_err(|e| anyhow::anyhow!("Event loop error: {}", e))
}
