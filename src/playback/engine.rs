use crate::core::geo::{self, LatLng};
use crate::core::Route;
use crate::playback::{PlaybackConfig, PlaybackState, Scheduler, TimerId, SUB_STEPS};
use std::time::Duration;
use tracing::{debug, info};

/// Events queued on the engine's scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
enum TimerEvent {
    /// Advance to the next waypoint
    Tick,
    /// One interpolation step of the running sub-animation
    SubStep,
}

/// Something observable that happened during playback
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Moved on to waypoint `index`
    Advanced {
        index: usize,
        elapsed_secs: i64,
        speed_kmh: f64,
        bearing: f64,
    },
    /// The last waypoint was reached and playback paused
    Finished,
}

/// Marker and trail interpolation between two waypoints
#[derive(Debug)]
struct SubAnimation {
    from: LatLng,
    to: LatLng,
    step: u32,
    delay: Duration,
    timer: TimerId,
}

impl SubAnimation {
    fn point_at(&self, step: u32) -> LatLng {
        geo::interpolate(self.from, self.to, step as f64 / SUB_STEPS as f64)
    }
}

/// Playback engine for a fixed route
///
/// Owns the route, the marker and trail it animates, and the timer queue that
/// drives both the waypoint cadence and the sub-step interpolation. The host
/// calls [`PlaybackEngine::update`] with the wall-clock time since the last call.
pub struct PlaybackEngine {
    route: Route,
    config: PlaybackConfig,
    playing: bool,
    index: usize,
    elapsed_secs: i64,
    speed_kmh: f64,
    marker: LatLng,
    heading: f64,
    trail: Vec<LatLng>,
    scheduler: Scheduler<TimerEvent>,
    tick_timer: Option<TimerId>,
    animation: Option<SubAnimation>,
}

impl PlaybackEngine {
    pub fn new(route: Route, config: PlaybackConfig) -> Self {
        let marker = route.first().position();
        Self {
            route,
            config: PlaybackConfig {
                interval_ms: PlaybackConfig::normalize_interval(config.interval_ms),
            },
            playing: false,
            index: 0,
            elapsed_secs: 0,
            speed_kmh: 0.0,
            marker,
            heading: 0.0,
            trail: Vec::new(),
            scheduler: Scheduler::new(),
            tick_timer: None,
            animation: None,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Index of the waypoint most recently reached
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> PlaybackState {
        if self.at_end() {
            PlaybackState::AtEnd
        } else if self.playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn at_end(&self) -> bool {
        self.index >= self.route.last_index()
    }

    /// Whole seconds between the first waypoint and the current one
    pub fn elapsed_secs(&self) -> i64 {
        self.elapsed_secs
    }

    /// Speed over the last segment in km/h
    pub fn speed_kmh(&self) -> f64 {
        self.speed_kmh
    }

    pub fn marker(&self) -> LatLng {
        self.marker
    }

    /// Marker heading in compass degrees
    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn trail(&self) -> &[LatLng] {
        &self.trail
    }

    pub fn interval_ms(&self) -> u32 {
        self.config.interval_ms
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.config.interval_ms as u64)
    }

    /// Number of timers still queued
    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }

    /// Time until the next queued timer fires
    pub fn time_to_next_timer(&self) -> Option<Duration> {
        self.scheduler
            .next_due()
            .map(|due| due.saturating_sub(self.scheduler.now()))
    }

    /// Change the waypoint cadence. While playing, the pending tick is re-armed
    /// one new interval from now; a running sub-animation keeps its timing.
    pub fn set_interval(&mut self, ms: u32) {
        let ms = PlaybackConfig::normalize_interval(ms);
        if ms == self.config.interval_ms {
            return;
        }

        debug!(interval_ms = ms, "playback interval changed");
        self.config.interval_ms = ms;
        if self.playing && self.tick_timer.is_some() {
            self.arm_tick();
        }
    }

    /// Switch between playing and paused. No-op once the last waypoint is reached.
    pub fn toggle_play(&mut self) {
        if self.at_end() {
            debug!("toggle ignored at end of route");
            return;
        }

        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    fn play(&mut self) {
        self.playing = true;
        self.arm_tick();
        info!(index = self.index, interval_ms = self.config.interval_ms, "playback started");
    }

    /// Stop advancing. A running sub-animation is left to finish.
    fn pause(&mut self) {
        self.playing = false;
        if let Some(id) = self.tick_timer.take() {
            self.scheduler.cancel(id);
        }
        info!(index = self.index, "playback paused");
    }

    /// Back to the first waypoint with an empty trail, paused
    pub fn reset(&mut self) {
        self.scheduler.clear();
        self.tick_timer = None;
        self.animation = None;
        self.playing = false;
        self.index = 0;
        self.elapsed_secs = 0;
        self.speed_kmh = 0.0;
        self.heading = 0.0;
        self.trail.clear();
        self.marker = self.route.first().position();
        info!("playback reset");
    }

    /// Tear down all timers. Called when the view goes away.
    pub fn dispose(&mut self) {
        self.scheduler.clear();
        self.tick_timer = None;
        self.animation = None;
        self.playing = false;
    }

    /// Perform one tick right away, independent of the play flag
    pub fn advance(&mut self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        self.step_route(&mut events);
        events
    }

    /// Advance the clock by `delta` and fire every timer that came due
    pub fn update(&mut self, delta: Duration) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        let deadline = self.scheduler.now() + delta;

        while let Some((id, event)) = self.scheduler.pop_before(deadline) {
            match event {
                TimerEvent::Tick => self.on_tick(id, &mut events),
                TimerEvent::SubStep => self.on_sub_step(id),
            }
        }

        self.scheduler.advance_to(deadline);
        events
    }

    fn arm_tick(&mut self) {
        if let Some(id) = self.tick_timer.take() {
            self.scheduler.cancel(id);
        }
        let interval = self.interval();
        self.tick_timer = Some(self.scheduler.schedule(interval, TimerEvent::Tick));
    }

    fn on_tick(&mut self, id: TimerId, events: &mut Vec<PlaybackEvent>) {
        if self.tick_timer != Some(id) {
            return;
        }
        self.tick_timer = None;

        if !self.playing {
            return;
        }

        self.step_route(events);

        if self.playing {
            self.arm_tick();
        }
    }

    fn step_route(&mut self, events: &mut Vec<PlaybackEvent>) {
        if self.at_end() {
            return;
        }

        let (current, next) = match (self.route.get(self.index), self.route.get(self.index + 1)) {
            (Some(c), Some(n)) => (c.clone(), n.clone()),
            _ => return,
        };

        self.start_animation(current.position(), next.position());

        self.elapsed_secs = self.route.elapsed_secs(self.index + 1);
        self.speed_kmh = geo::speed_kmh(&current, &next);
        self.index += 1;

        debug!(
            index = self.index,
            elapsed_secs = self.elapsed_secs,
            speed_kmh = self.speed_kmh,
            "advanced"
        );
        events.push(PlaybackEvent::Advanced {
            index: self.index,
            elapsed_secs: self.elapsed_secs,
            speed_kmh: self.speed_kmh,
            bearing: self.heading,
        });

        if self.at_end() {
            self.playing = false;
            if let Some(id) = self.tick_timer.take() {
                self.scheduler.cancel(id);
            }
            info!(waypoints = self.route.len(), "reached end of route");
            events.push(PlaybackEvent::Finished);
        }
    }

    /// Start interpolating from `from` to `to`, replacing any running animation
    fn start_animation(&mut self, from: LatLng, to: LatLng) {
        if let Some(previous) = self.animation.take() {
            self.complete_animation(previous);
        }

        self.heading = geo::bearing(from, to);
        self.marker = from;
        if self.trail.last() != Some(&from) {
            self.trail.push(from);
        }

        let delay = self.interval() / SUB_STEPS;
        let timer = self.scheduler.schedule(delay, TimerEvent::SubStep);
        self.animation = Some(SubAnimation { from, to, step: 0, delay, timer });
    }

    /// Cancel a running animation and jump it to its final frame
    fn complete_animation(&mut self, animation: SubAnimation) {
        self.scheduler.cancel(animation.timer);
        for step in animation.step + 1..=SUB_STEPS {
            self.trail.push(animation.point_at(step));
        }
        self.marker = animation.to;
    }

    fn on_sub_step(&mut self, id: TimerId) {
        let Some(animation) = self.animation.as_mut() else {
            return;
        };
        if animation.timer != id {
            return;
        }

        animation.step += 1;
        let point = animation.point_at(animation.step);
        let done = animation.step >= SUB_STEPS;
        let delay = animation.delay;

        self.marker = point;
        self.trail.push(point);

        if done {
            self.animation = None;
        } else {
            let timer = self.scheduler.schedule(delay, TimerEvent::SubStep);
            if let Some(animation) = self.animation.as_mut() {
                animation.timer = timer;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Waypoint;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn route(points: &[(f64, f64, i64)]) -> Route {
        Route::new(
            points
                .iter()
                .map(|&(lat, lng, secs)| Waypoint {
                    latitude: lat,
                    longitude: lng,
                    timestamp: Utc.timestamp_opt(1_714_550_400 + secs, 0).unwrap(),
                })
                .collect(),
        )
        .unwrap()
    }

    fn sample_route() -> Route {
        route(&[
            (0.0, 0.0, 0),
            (0.0, 0.001, 10),
            (0.001, 0.001, 20),
            (0.002, 0.001, 20),
            (0.002, 0.0, 35),
        ])
    }

    fn engine(interval_ms: u32) -> PlaybackEngine {
        PlaybackEngine::new(sample_route(), PlaybackConfig { interval_ms })
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// Drive the engine in small frames like the UI does
    fn run_frames(engine: &mut PlaybackEngine, total: Duration) -> Vec<PlaybackEvent> {
        let frame = ms(16);
        let mut events = Vec::new();
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            let step = frame.min(total - elapsed);
            events.extend(engine.update(step));
            elapsed += step;
        }
        events
    }

    #[test]
    fn test_initial_state() {
        let e = engine(1000);
        assert_eq!(e.index(), 0);
        assert_eq!(e.state(), PlaybackState::Paused);
        assert_eq!(e.marker(), LatLng::new(0.0, 0.0));
        assert!(e.trail().is_empty());
        assert_eq!(e.pending_timers(), 0);
    }

    #[test]
    fn test_advance_to_end_then_toggle_is_noop() {
        let mut e = engine(1000);
        let n = e.route().len() - 1;
        for _ in 0..n {
            e.advance();
        }

        assert_eq!(e.index(), e.route().last_index());
        assert!(!e.is_playing());
        assert_eq!(e.state(), PlaybackState::AtEnd);

        e.toggle_play();
        assert!(!e.is_playing());
        assert_eq!(e.state(), PlaybackState::AtEnd);

        // Further advances do nothing either
        assert!(e.advance().is_empty());
        assert_eq!(e.index(), n);
    }

    #[test]
    fn test_tick_updates_readouts() {
        let mut e = engine(1000);
        e.toggle_play();
        assert_eq!(e.state(), PlaybackState::Playing);

        assert!(e.update(ms(999)).is_empty());
        let events = e.update(ms(1));
        assert_eq!(events.len(), 1);
        assert_eq!(e.index(), 1);
        assert_eq!(e.elapsed_secs(), 10);

        let expected = geo::distance(LatLng::new(0.0, 0.0), LatLng::new(0.0, 0.001)) / 10.0 * 3.6;
        assert_relative_eq!(e.speed_kmh(), expected, epsilon = 1e-9);
        assert_relative_eq!(e.heading(), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_time_delta_speed() {
        let mut e = engine(1000);
        e.advance();
        e.advance();
        e.advance(); // waypoints 2 -> 3 share a timestamp
        assert_eq!(e.index(), 3);
        assert_eq!(e.speed_kmh(), 0.0);
        assert_eq!(e.elapsed_secs(), 20);
    }

    #[test]
    fn test_sub_animation_interpolates() {
        let mut e = engine(1000);
        e.advance();

        // Start point is drawn immediately, then one point per 50 ms sub-step
        assert_eq!(e.trail().len(), 1);
        e.update(ms(500));
        assert_eq!(e.trail().len(), 11);
        assert_relative_eq!(e.marker().lng, 0.0005, epsilon = 1e-12);

        e.update(ms(500));
        assert_eq!(e.trail().len(), 21);
        assert_eq!(e.marker(), LatLng::new(0.0, 0.001));
        assert_eq!(e.trail().last(), Some(&LatLng::new(0.0, 0.001)));
        assert_eq!(e.pending_timers(), 0);
    }

    #[test]
    fn test_retrigger_cancels_running_animation() {
        let mut e = engine(1000);
        e.advance();
        e.update(ms(100));
        assert_eq!(e.trail().len(), 3);

        e.advance();
        // First segment snapped to completion, second one started from its end
        assert_eq!(e.trail().len(), 21);
        assert_eq!(e.marker(), LatLng::new(0.0, 0.001));
        assert_eq!(e.pending_timers(), 1);

        e.update(ms(1000));
        assert_eq!(e.trail().len(), 41);
        assert_eq!(e.marker(), LatLng::new(0.001, 0.001));
        assert_eq!(e.pending_timers(), 0);
    }

    #[test]
    fn test_play_through_to_end() {
        let mut e = engine(200);
        e.toggle_play();

        let events = run_frames(&mut e, ms(200 * 4 + 100));
        assert_eq!(events.last(), Some(&PlaybackEvent::Finished));
        assert_eq!(events.len(), 5);
        assert_eq!(e.state(), PlaybackState::AtEnd);
        assert!(!e.is_playing());

        // Let the final animation land
        run_frames(&mut e, ms(200));
        assert_eq!(e.marker(), LatLng::new(0.002, 0.0));
        assert_eq!(e.trail().last(), Some(&LatLng::new(0.002, 0.0)));
        assert_eq!(e.pending_timers(), 0);
    }

    #[test]
    fn test_large_frame_processes_several_ticks() {
        let mut e = engine(1000);
        e.toggle_play();
        let events = e.update(ms(2500));
        assert_eq!(e.index(), 2);
        assert_eq!(events.len(), 2);
        assert!(e.is_playing());
    }

    #[test]
    fn test_pause_lets_animation_finish() {
        let mut e = engine(1000);
        e.toggle_play();
        e.update(ms(1000));
        assert_eq!(e.index(), 1);

        e.toggle_play();
        assert_eq!(e.state(), PlaybackState::Paused);
        e.update(ms(5000));

        assert_eq!(e.index(), 1);
        assert_eq!(e.marker(), LatLng::new(0.0, 0.001));
        assert_eq!(e.pending_timers(), 0);
    }

    #[test]
    fn test_interval_change_applies_to_next_tick() {
        let mut e = engine(1000);
        e.toggle_play();
        e.update(ms(500));

        e.set_interval(200);
        assert_eq!(e.interval_ms(), 200);
        assert_eq!(e.time_to_next_timer(), Some(ms(200)));

        // The pending tick restarts at the new interval
        e.update(ms(199));
        assert_eq!(e.index(), 0);
        e.update(ms(1));
        assert_eq!(e.index(), 1);

        e.update(ms(200));
        assert_eq!(e.index(), 2);
    }

    #[test]
    fn test_interval_change_leaves_running_animation_alone() {
        let mut e = engine(1000);
        e.toggle_play();
        e.update(ms(1000));
        assert_eq!(e.index(), 1);
        let trail_before = e.trail().len();

        // Sub-steps were armed 50 ms apart; the slider does not touch them
        e.set_interval(2000);
        e.update(ms(50));
        assert_eq!(e.trail().len(), trail_before + 1);

        // Paused playback has no tick to re-arm
        e.toggle_play();
        e.set_interval(500);
        e.update(ms(5000));
        assert_eq!(e.index(), 1);
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut e = engine(1000);
        e.toggle_play();
        e.update(ms(2300));
        assert!(e.index() > 0);

        e.reset();
        assert_eq!(e.index(), 0);
        assert_eq!(e.elapsed_secs(), 0);
        assert_eq!(e.speed_kmh(), 0.0);
        assert!(e.trail().is_empty());
        assert_eq!(e.marker(), LatLng::new(0.0, 0.0));
        assert_eq!(e.state(), PlaybackState::Paused);
        assert_eq!(e.pending_timers(), 0);

        // Also from the end of the route
        for _ in 0..e.route().last_index() {
            e.advance();
        }
        e.reset();
        assert_eq!(e.index(), 0);
        assert!(e.trail().is_empty());
        assert_eq!(e.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_single_waypoint_route() {
        let mut e = PlaybackEngine::new(route(&[(1.0, 1.0, 0)]), PlaybackConfig::default());
        assert_eq!(e.state(), PlaybackState::AtEnd);
        e.toggle_play();
        assert!(!e.is_playing());
        assert!(e.update(ms(5000)).is_empty());
    }

    #[test]
    fn test_dispose_clears_timers() {
        let mut e = engine(1000);
        e.toggle_play();
        e.update(ms(1100));
        assert!(e.pending_timers() > 0);

        e.dispose();
        assert_eq!(e.pending_timers(), 0);
        assert!(!e.is_playing());
    }
}
