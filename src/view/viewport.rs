use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::spatial::Rect;

pub const MIN_ZOOM: f64 = 0.05;
pub const MAX_ZOOM: f64 = 6.0;

/// Camera over the world plane. Screen space is pixels with the origin at the
/// top-left corner of the drawing surface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub camera_x: f64,
    pub camera_y: f64,
    pub zoom: f64,
    pub screen_width: f64,
    pub screen_height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            camera_x: 0.0,
            camera_y: 0.0,
            zoom: 1.0,
            screen_width: 1280.0,
            screen_height: 720.0,
        }
    }
}

impl Viewport {
    pub fn new(screen_width: f64, screen_height: f64) -> Self {
        Self {
            screen_width,
            screen_height,
            ..Self::default()
        }
    }

    pub fn with_camera(mut self, x: f64, y: f64) -> Self {
        self.camera_x = x;
        self.camera_y = y;
        self
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn camera(&self) -> DVec2 {
        DVec2::new(self.camera_x, self.camera_y)
    }

    pub fn screen_center(&self) -> DVec2 {
        DVec2::new(self.screen_width, self.screen_height) * 0.5
    }

    pub fn is_valid(&self) -> bool {
        self.zoom.is_finite()
            && self.zoom > 0.0
            && self.camera().is_finite()
            && self.screen_width.is_finite()
            && self.screen_height.is_finite()
            && self.screen_width > 0.0
            && self.screen_height > 0.0
    }

    pub fn world_to_screen(&self, world: DVec2) -> DVec2 {
        (world - self.camera()) * self.zoom + self.screen_center()
    }

    pub fn screen_to_world(&self, screen: DVec2) -> DVec2 {
        (screen - self.screen_center()) / self.zoom + self.camera()
    }

    /// Screen rectangle grown by `buffer_px` on every side.
    pub fn screen_rect(&self, buffer_px: f64) -> Rect {
        let buffer = DVec2::splat(buffer_px.max(0.0));
        Rect::from_min_max(
            -buffer,
            DVec2::new(self.screen_width, self.screen_height) + buffer,
        )
    }

    /// World-space rectangle covering the screen plus `buffer_px` pixels.
    pub fn visible_world_rect(&self, buffer_px: f64) -> Rect {
        let screen = self.screen_rect(buffer_px);
        Rect::from_min_max(
            self.screen_to_world(screen.min),
            self.screen_to_world(screen.max),
        )
    }

    pub fn pan_by(&mut self, screen_delta: DVec2) {
        if !self.is_valid() || !screen_delta.is_finite() {
            return;
        }
        self.camera_x -= screen_delta.x / self.zoom;
        self.camera_y -= screen_delta.y / self.zoom;
    }

    /// Multiplies zoom by `factor`, keeping the world point under `cursor` fixed.
    pub fn zoom_at(&mut self, cursor: DVec2, factor: f64) {
        if !self.is_valid() || !cursor.is_finite() || !factor.is_finite() || factor <= 0.0 {
            return;
        }

        let anchor = self.screen_to_world(cursor);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let camera = anchor - (cursor - self.screen_center()) / self.zoom;
        self.camera_x = camera.x;
        self.camera_y = camera.y;
    }

    /// Centers `bounds` and picks the largest zoom that fits it with `margin_px`
    /// pixels left on each side.
    pub fn fit_to_bounds(&mut self, bounds: &Rect, margin_px: f64) {
        if !bounds.min.is_finite() || !bounds.max.is_finite() {
            return;
        }

        let center = bounds.center();
        self.camera_x = center.x;
        self.camera_y = center.y;

        let usable_width = (self.screen_width - 2.0 * margin_px).max(1.0);
        let usable_height = (self.screen_height - 2.0 * margin_px).max(1.0);
        let zoom_x = usable_width / bounds.width().max(1e-6);
        let zoom_y = usable_height / bounds.height().max(1e-6);
        self.zoom = zoom_x.min(zoom_y).clamp(MIN_ZOOM, MAX_ZOOM);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_center_maps_to_camera() {
        let viewport = Viewport::new(800.0, 600.0).with_camera(120.0, -40.0).with_zoom(2.5);
        assert_eq!(viewport.screen_to_world(viewport.screen_center()), viewport.camera());
        assert_eq!(viewport.world_to_screen(viewport.camera()), viewport.screen_center());
    }

    #[test]
    fn transforms_invert_each_other() {
        let viewport = Viewport::new(1024.0, 768.0).with_camera(33.0, 12.0).with_zoom(0.4);
        let world = DVec2::new(-250.0, 900.0);
        let back = viewport.screen_to_world(viewport.world_to_screen(world));
        assert!((back - world).length() < 1e-9);
    }

    #[test]
    fn buffer_grows_the_world_rect() {
        let viewport = Viewport::new(800.0, 600.0).with_zoom(2.0);
        let tight = viewport.visible_world_rect(0.0);
        let loose = viewport.visible_world_rect(100.0);

        assert_eq!(tight.width(), 400.0);
        assert_eq!(tight.height(), 300.0);
        assert!(loose.contains_rect(&tight));
        assert_eq!(loose.width(), 500.0);
    }

    #[test]
    fn zoom_at_keeps_cursor_anchor() {
        let mut viewport = Viewport::new(800.0, 600.0).with_camera(10.0, 10.0);
        let cursor = DVec2::new(650.0, 120.0);
        let before = viewport.screen_to_world(cursor);

        viewport.zoom_at(cursor, 1.7);
        let after = viewport.screen_to_world(cursor);
        assert!((after - before).length() < 1e-9);
        assert!((viewport.zoom - 1.7).abs() < 1e-12);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut viewport = Viewport::default();
        viewport.zoom_at(DVec2::ZERO, 1000.0);
        assert_eq!(viewport.zoom, MAX_ZOOM);
        viewport.zoom_at(DVec2::ZERO, 1e-9);
        assert_eq!(viewport.zoom, MIN_ZOOM);
    }

    #[test]
    fn pan_moves_camera_against_drag() {
        let mut viewport = Viewport::default().with_zoom(2.0);
        viewport.pan_by(DVec2::new(20.0, -10.0));
        assert_eq!(viewport.camera(), DVec2::new(-10.0, 5.0));
    }

    #[test]
    fn fit_to_bounds_shows_the_whole_rect() {
        let mut viewport = Viewport::new(800.0, 600.0);
        let bounds = Rect::from_min_max(DVec2::new(-500.0, -100.0), DVec2::new(1500.0, 300.0));
        viewport.fit_to_bounds(&bounds, 20.0);

        assert_eq!(viewport.camera(), DVec2::new(500.0, 100.0));
        assert!(viewport.visible_world_rect(0.0).contains_rect(&bounds));
    }
}
