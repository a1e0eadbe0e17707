//! Viewport transform for pan/zoom over the unbounded world.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

use crate::config::CanvasConfig;

/// Where a zoom change is anchored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomAnchor {
    /// The middle of the viewport.
    Center,
    /// A concrete point in screen coordinates.
    Screen(Point),
}

/// Maps screen coordinates (CSS pixels) to world coordinates.
///
/// `world = (screen - offset) / scale`. The scale always stays inside
/// `[min_scale, max_scale]`; the offset is unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    /// Current zoom factor.
    pub scale: f64,
    /// Screen-space translation (pan).
    pub offset: Vec2,
    /// Minimum allowed zoom factor.
    pub min_scale: f64,
    /// Maximum allowed zoom factor.
    pub max_scale: f64,
    /// Visible area in device-independent pixels.
    pub size: Size,
    /// Device pixels per CSS pixel.
    pub device_pixel_ratio: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Vec2::ZERO,
            min_scale: 0.2,
            max_scale: 4.0,
            size: Size::new(800.0, 600.0),
            device_pixel_ratio: 1.0,
        }
    }
}

impl Viewport {
    /// Create a viewport with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a viewport using the zoom limits from `config`.
    pub fn from_config(config: &CanvasConfig) -> Self {
        Self {
            min_scale: config.min_scale,
            max_scale: config.max_scale,
            ..Self::default()
        }
    }

    /// World-to-screen transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.scale)
    }

    /// Screen-to-world transform.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.scale) * Affine::translate(-self.offset)
    }

    /// World-to-device-pixel transform used by the compositor.
    pub fn device_transform(&self) -> Affine {
        Affine::scale(self.device_pixel_ratio) * self.transform()
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Clamp a requested scale to the allowed range.
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return self.scale;
        }
        scale.clamp(self.min_scale, self.max_scale)
    }

    fn anchor_point(&self, anchor: ZoomAnchor) -> Point {
        match anchor {
            ZoomAnchor::Center => Point::new(self.size.width / 2.0, self.size.height / 2.0),
            ZoomAnchor::Screen(point) => point,
        }
    }

    /// Set the zoom factor, keeping the world point under `anchor` fixed on screen.
    pub fn set_zoom(&mut self, new_scale: f64, anchor: ZoomAnchor) {
        let anchor = self.anchor_point(anchor);
        if !anchor.x.is_finite() || !anchor.y.is_finite() {
            return;
        }
        let world_at_anchor = self.screen_to_world(anchor);

        self.scale = self.clamp_scale(new_scale);
        self.offset = Vec2::new(
            anchor.x - world_at_anchor.x * self.scale,
            anchor.y - world_at_anchor.y * self.scale,
        );
    }

    /// Multiply the zoom factor, anchored at `anchor`.
    pub fn zoom_by(&mut self, factor: f64, anchor: ZoomAnchor) {
        self.set_zoom(self.scale * factor, anchor);
    }

    /// Pan by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        if delta.x.is_finite() && delta.y.is_finite() {
            self.offset += delta;
        }
    }

    /// Restore scale 1 and zero offset.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.scale = 1.0;
    }

    /// Zoom level as a rounded percentage.
    pub fn zoom_percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }

    /// Set the zoom level from a percentage, anchored at the viewport center.
    pub fn set_zoom_percent(&mut self, percent: f64) {
        self.set_zoom(percent / 100.0, ZoomAnchor::Center);
    }

    /// Update the visible area and device pixel ratio.
    pub fn resize(&mut self, size: Size, device_pixel_ratio: f64) {
        self.size = Size::new(size.width.max(0.0), size.height.max(0.0));
        self.device_pixel_ratio = if device_pixel_ratio.is_finite() {
            device_pixel_ratio.max(1.0)
        } else {
            1.0
        };
    }

    /// Frame buffer size in device pixels, never smaller than 1x1.
    pub fn device_size(&self) -> (u32, u32) {
        let w = (self.size.width * self.device_pixel_ratio).floor().max(1.0);
        let h = (self.size.height * self.device_pixel_ratio).floor().max(1.0);
        (w as u32, h as u32)
    }

    /// The world rectangle currently visible on screen.
    pub fn visible_world_rect(&self) -> Rect {
        let start = self.screen_to_world(Point::ZERO);
        let end = self.screen_to_world(Point::new(self.size.width, self.size.height));
        Rect::from_points(start, end)
    }
}
