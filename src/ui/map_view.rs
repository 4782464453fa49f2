//! Interactive map canvas
//!
//! Draws the route, the traveled trail and the vehicle marker on a
//! Web-Mercator projected canvas. There is no tile imagery; a lat/lng
//! graticule gives the map its sense of scale and position.

use imgui::{MouseButton, StyleColor, Ui};
use std::f64::consts::PI;
use crate::core::LatLng;
use crate::playback::PlaybackEngine;

const TILE_SIZE: f64 = 256.0;
const MAX_LATITUDE: f64 = 85.051_128_78;

pub const MIN_ZOOM: f64 = 2.0;
pub const MAX_ZOOM: f64 = 19.0;
pub const DEFAULT_ZOOM: f64 = 16.0;

const ROUTE_COLOR: [f32; 4] = [0.55, 0.55, 0.55, 1.0];
const TRAIL_COLOR: [f32; 4] = [0.2, 0.45, 1.0, 1.0];
const MARKER_COLOR: [f32; 4] = [1.0, 0.75, 0.1, 1.0];
const MARKER_OUTLINE: [f32; 4] = [0.1, 0.1, 0.1, 1.0];
const GRID_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 0.06];
const LABEL_COLOR: [f32; 4] = [0.7, 0.7, 0.7, 0.8];

const ROUTE_DASH: f32 = 5.0;
const ROUTE_GAP: f32 = 5.0;
const ROUTE_WEIGHT: f32 = 2.0;
const TRAIL_WEIGHT: f32 = 4.0;
const MARKER_SIZE: f32 = 14.0;

/// Project to world pixel coordinates at `zoom`
pub fn project(p: LatLng, zoom: f64) -> [f64; 2] {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let lat = p.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (p.lng + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale;
    [x, y]
}

/// Inverse of [`project`]
pub fn unproject(world: [f64; 2], zoom: f64) -> LatLng {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let lng = world[0] / scale * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * world[1] / scale);
    let lat = n.sinh().atan().to_degrees();
    LatLng::new(lat, lng)
}

/// Split a screen-space segment into dash pieces
pub fn dashed_segments(a: [f32; 2], b: [f32; 2], dash: f32, gap: f32) -> Vec<([f32; 2], [f32; 2])> {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f32::EPSILON || dash <= 0.0 {
        return Vec::new();
    }

    let (ux, uy) = (dx / len, dy / len);
    let mut pieces = Vec::new();
    let mut t = 0.0;
    while t < len {
        let end = (t + dash).min(len);
        pieces.push((
            [a[0] + ux * t, a[1] + uy * t],
            [a[0] + ux * end, a[1] + uy * end],
        ));
        t += dash + gap;
    }
    pieces
}

/// Arrow-shaped marker pointing along `heading` (compass degrees, screen up is north)
pub fn marker_outline(center: [f32; 2], heading: f64, size: f32) -> [[f32; 2]; 4] {
    let h = heading.to_radians();
    let (fx, fy) = (h.sin() as f32, -h.cos() as f32);
    // Perpendicular, pointing to the right of travel
    let (rx, ry) = (-fy, fx);

    let tip = [center[0] + fx * size, center[1] + fy * size];
    let back = size * 0.7;
    let wing = size * 0.65;
    let left = [center[0] - fx * back - rx * wing, center[1] - fy * back - ry * wing];
    let notch = [center[0] - fx * back * 0.4, center[1] - fy * back * 0.4];
    let right = [center[0] - fx * back + rx * wing, center[1] - fy * back + ry * wing];
    [tip, right, notch, left]
}

/// Pick a graticule spacing in degrees that gives a handful of lines over `span`
pub fn graticule_step(span_deg: f64) -> f64 {
    const STEPS: [f64; 13] = [
        30.0, 10.0, 5.0, 1.0, 0.5, 0.1, 0.05, 0.01, 0.005, 0.001, 0.0005, 0.0001, 0.00005,
    ];
    STEPS
        .iter()
        .copied()
        .find(|&step| span_deg / step >= 4.0)
        .unwrap_or(STEPS[STEPS.len() - 1])
}

/// Pan/zoom state of the map canvas
#[derive(Debug, Clone)]
pub struct MapView {
    center: LatLng,
    zoom: f64,
    follow_marker: bool,
}

impl MapView {
    pub fn new(center: LatLng) -> Self {
        Self {
            center,
            zoom: DEFAULT_ZOOM,
            follow_marker: false,
        }
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn follow_marker(&self) -> bool {
        self.follow_marker
    }

    pub fn set_follow_marker(&mut self, follow: bool) {
        self.follow_marker = follow;
    }

    pub fn recenter(&mut self, center: LatLng) {
        self.center = center;
    }

    /// Screen position of `p` on a canvas at `origin` with `size`
    pub fn to_screen(&self, p: LatLng, origin: [f32; 2], size: [f32; 2]) -> [f32; 2] {
        let world = project(p, self.zoom);
        let center = project(self.center, self.zoom);
        [
            origin[0] + size[0] / 2.0 + (world[0] - center[0]) as f32,
            origin[1] + size[1] / 2.0 + (world[1] - center[1]) as f32,
        ]
    }

    /// Geographic position under a screen point
    pub fn to_geo(&self, screen: [f32; 2], origin: [f32; 2], size: [f32; 2]) -> LatLng {
        let center = project(self.center, self.zoom);
        let world = [
            center[0] + (screen[0] - origin[0] - size[0] / 2.0) as f64,
            center[1] + (screen[1] - origin[1] - size[1] / 2.0) as f64,
        ];
        unproject(world, self.zoom)
    }

    /// Drag the map by a screen-space delta
    pub fn pan_by(&mut self, delta: [f32; 2]) {
        let center = project(self.center, self.zoom);
        self.center = unproject(
            [center[0] - delta[0] as f64, center[1] - delta[1] as f64],
            self.zoom,
        );
    }

    /// Zoom by `amount` levels keeping the point under `anchor` fixed on screen
    pub fn zoom_at(&mut self, amount: f64, anchor: [f32; 2], origin: [f32; 2], size: [f32; 2]) {
        let target = (self.zoom + amount).clamp(MIN_ZOOM, MAX_ZOOM);
        if target == self.zoom {
            return;
        }

        let fixed = self.to_geo(anchor, origin, size);
        self.zoom = target;
        let drift = self.to_screen(fixed, origin, size);
        self.pan_by([anchor[0] - drift[0], anchor[1] - drift[1]]);
    }

    /// Render the canvas filling the remaining content region
    pub fn render(&mut self, ui: &Ui, engine: &PlaybackEngine) {
        let origin = ui.cursor_screen_pos();
        let avail = ui.content_region_avail();
        let size = [avail[0].max(50.0), avail[1].max(50.0)];
        let max = [origin[0] + size[0], origin[1] + size[1]];

        ui.invisible_button("##map_canvas", size);
        let hovered = ui.is_item_hovered();

        if ui.is_item_active() && ui.is_mouse_dragging(MouseButton::Left) {
            self.pan_by(ui.io().mouse_delta);
            self.follow_marker = false;
        }

        if hovered {
            let wheel = ui.io().mouse_wheel;
            if wheel != 0.0 {
                self.zoom_at(wheel as f64 * 0.5, ui.io().mouse_pos, origin, size);
            }
        }

        if self.follow_marker {
            self.center = engine.marker();
        }

        let draw_list = ui.get_window_draw_list();
        draw_list.with_clip_rect_intersect(origin, max, || {
            draw_list
                .add_rect(origin, max, ui.style_color(StyleColor::FrameBg))
                .filled(true)
                .build();

            self.draw_graticule(&draw_list, origin, size);

            // Full route, dashed
            let route: Vec<[f32; 2]> = engine
                .route()
                .positions()
                .map(|p| self.to_screen(p, origin, size))
                .collect();
            for pair in route.windows(2) {
                for (a, b) in dashed_segments(pair[0], pair[1], ROUTE_DASH, ROUTE_GAP) {
                    draw_list.add_line(a, b, ROUTE_COLOR).thickness(ROUTE_WEIGHT).build();
                }
            }

            // Traveled trail
            let trail: Vec<[f32; 2]> = engine
                .trail()
                .iter()
                .map(|&p| self.to_screen(p, origin, size))
                .collect();
            if trail.len() >= 2 {
                draw_list.add_polyline(trail, TRAIL_COLOR).thickness(TRAIL_WEIGHT).build();
            }

            // Vehicle
            let pos = self.to_screen(engine.marker(), origin, size);
            let [tip, right, notch, left] = marker_outline(pos, engine.heading(), MARKER_SIZE);
            draw_list.add_triangle(tip, right, notch, MARKER_COLOR).filled(true).build();
            draw_list.add_triangle(tip, notch, left, MARKER_COLOR).filled(true).build();
            draw_list
                .add_polyline(vec![tip, right, notch, left, tip], MARKER_OUTLINE)
                .thickness(1.5)
                .build();

            draw_list.add_text(
                [origin[0] + 6.0, max[1] - 18.0],
                LABEL_COLOR,
                format!("zoom {:.1}", self.zoom),
            );
        });

        if hovered {
            let under = self.to_geo(ui.io().mouse_pos, origin, size);
            ui.tooltip_text(format!("{:.6}, {:.6}", under.lat, under.lng));
        }
    }

    fn draw_graticule(&self, draw_list: &imgui::DrawListMut<'_>, origin: [f32; 2], size: [f32; 2]) {
        let top_left = self.to_geo(origin, origin, size);
        let bottom_right = self.to_geo([origin[0] + size[0], origin[1] + size[1]], origin, size);
        let step = graticule_step((bottom_right.lng - top_left.lng).abs());

        let mut lng = (top_left.lng / step).floor() * step;
        while lng <= bottom_right.lng {
            let x = self.to_screen(LatLng::new(self.center.lat, lng), origin, size)[0];
            draw_list
                .add_line([x, origin[1]], [x, origin[1] + size[1]], GRID_COLOR)
                .build();
            lng += step;
        }

        let mut lat = (bottom_right.lat / step).floor() * step;
        while lat <= top_left.lat {
            let y = self.to_screen(LatLng::new(lat, self.center.lng), origin, size)[1];
            draw_list
                .add_line([origin[0], y], [origin[0] + size[0], y], GRID_COLOR)
                .build();
            lat += step;
        }
    }
}
