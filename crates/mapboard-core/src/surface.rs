//! Unbounded raster surface: one off-screen bitmap plus a movable origin.
//!
//! World coordinate `(0, 0)` lives at bitmap pixel `origin`. When a draw is
//! about to come within `margin` pixels of an edge the bitmap is replaced by
//! a larger one (each affected dimension doubles, possibly several times)
//! and, for growth on the negative side, the old pixels are copied at a
//! shift and the origin moves by the same amount so that existing content
//! keeps its world coordinates.

use kurbo::{Point, Rect};
use thiserror::Error;
use tiny_skia::{BlendMode, ColorU8, IntSize, PathBuilder, Pixmap, PixmapPaint, Transform};

use crate::config::CanvasConfig;
use crate::style::StrokeStyle;

/// Raster surface errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("Failed to allocate a {width}x{height} bitmap")]
    Allocation { width: u64, height: u64 },
    #[error("Surface of {width}x{height} exceeds the {max} px limit")]
    TooLarge { width: u64, height: u64, max: u32 },
    #[error("Surface of {width}x{height} needs {bytes} bytes, over the {budget} byte budget")]
    OverBudget {
        width: u64,
        height: u64,
        bytes: u64,
        budget: u64,
    },
    #[error("Bounds are not finite")]
    InvalidBounds,
}

impl SurfaceError {
    /// Whether the canvas can no longer draw safely after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SurfaceError::InvalidBounds)
    }
}

/// The single bitmap holding everything drawn in a session.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    pixmap: Pixmap,
    origin: Point,
    margin: f64,
    max_dimension: u32,
    max_bytes: u64,
    /// Bumped whenever `pixmap` is swapped for a new bitmap.
    generation: u64,
}

impl RasterSurface {
    /// Allocate a square surface with the origin at its center.
    pub fn new(size: u32, margin: f64, max_dimension: u32) -> Result<Self, SurfaceError> {
        let pixmap = allocate(u64::from(size), u64::from(size))?;
        let half = f64::from(size / 2);
        Ok(Self {
            pixmap,
            origin: Point::new(half, half),
            margin,
            max_dimension,
            max_bytes: u64::MAX,
            generation: 0,
        })
    }

    pub fn from_config(config: &CanvasConfig) -> Result<Self, SurfaceError> {
        let surface = Self::new(
            config.initial_surface_size,
            config.growth_margin,
            config.max_surface_dimension,
        )?;
        Ok(surface.with_max_bytes(config.max_surface_bytes))
    }

    /// Refuse growth whose RGBA buffer would need more than `bytes`.
    pub fn with_max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = bytes;
        self
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Bitmap-space position of world `(0, 0)`.
    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Changes every time the backing bitmap is replaced (growth or restore).
    ///
    /// Anything holding bitmap-space coordinates across calls compares this
    /// to know it must re-derive them from world coordinates.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Read-only access to the backing bitmap.
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn world_to_bitmap(&self, world: Point) -> Point {
        Point::new(world.x + self.origin.x, world.y + self.origin.y)
    }

    pub fn bitmap_to_world(&self, bitmap: Point) -> Point {
        Point::new(bitmap.x - self.origin.x, bitmap.y - self.origin.y)
    }

    /// Whether a world point sits inside the margin-inset bitmap area.
    pub fn contains_with_margin(&self, world: Point) -> bool {
        let p = self.world_to_bitmap(world);
        p.x >= self.margin
            && p.y >= self.margin
            && p.x <= f64::from(self.width()) - self.margin
            && p.y <= f64::from(self.height()) - self.margin
    }

    /// Make sure the world box `[min, max]` fits inside the margin, growing if needed.
    ///
    /// Returns `Ok(true)` when the bitmap was replaced. Callers holding a
    /// path in bitmap coordinates must re-open it after growth.
    pub fn ensure_capacity(&mut self, min: Point, max: Point) -> Result<bool, SurfaceError> {
        if ![min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite()) {
            return Err(SurfaceError::InvalidBounds);
        }

        let a1 = self.world_to_bitmap(min);
        let a2 = self.world_to_bitmap(max);
        let mut min_x = a1.x.min(a2.x);
        let mut min_y = a1.y.min(a2.y);
        let mut max_x = a1.x.max(a2.x);
        let mut max_y = a1.y.max(a2.y);

        let mut new_w = u64::from(self.width());
        let mut new_h = u64::from(self.height());
        let mut shift_x = 0u64;
        let mut shift_y = 0u64;
        let margin = self.margin;
        let limit = u64::from(self.max_dimension);
        let too_large = |w: u64, h: u64| SurfaceError::TooLarge {
            width: w,
            height: h,
            max: self.max_dimension,
        };

        while min_x < margin {
            shift_x += new_w;
            min_x += new_w as f64;
            max_x += new_w as f64;
            new_w *= 2;
            if new_w > limit {
                return Err(too_large(new_w, new_h));
            }
        }
        while min_y < margin {
            shift_y += new_h;
            min_y += new_h as f64;
            max_y += new_h as f64;
            new_h *= 2;
            if new_h > limit {
                return Err(too_large(new_w, new_h));
            }
        }
        while max_x > new_w as f64 - margin {
            new_w *= 2;
            if new_w > limit {
                return Err(too_large(new_w, new_h));
            }
        }
        while max_y > new_h as f64 - margin {
            new_h *= 2;
            if new_h > limit {
                return Err(too_large(new_w, new_h));
            }
        }

        if new_w == u64::from(self.width()) && new_h == u64::from(self.height()) {
            return Ok(false);
        }

        let bytes = new_w.saturating_mul(new_h).saturating_mul(4);
        if bytes > self.max_bytes {
            return Err(SurfaceError::OverBudget {
                width: new_w,
                height: new_h,
                bytes,
                budget: self.max_bytes,
            });
        }
        let mut grown = allocate(new_w, new_h)?;

        let paint = PixmapPaint {
            blend_mode: BlendMode::Source,
            ..PixmapPaint::default()
        };
        grown.draw_pixmap(
            shift_x as i32,
            shift_y as i32,
            self.pixmap.as_ref(),
            &paint,
            Transform::identity(),
            None,
        );

        log::debug!(
            "Surface grew {}x{} -> {}x{}, shift ({}, {})",
            self.width(),
            self.height(),
            new_w,
            new_h,
            shift_x,
            shift_y
        );

        self.pixmap = grown;
        self.origin = Point::new(self.origin.x + shift_x as f64, self.origin.y + shift_y as f64);
        self.generation += 1;
        Ok(true)
    }

    /// `ensure_capacity` for a world rectangle.
    pub fn ensure_capacity_rect(&mut self, rect: Rect) -> Result<bool, SurfaceError> {
        self.ensure_capacity(Point::new(rect.x0, rect.y0), Point::new(rect.x1, rect.y1))
    }

    /// Stroke a straight segment between two world points.
    pub fn stroke_segment(&mut self, from: Point, to: Point, style: &StrokeStyle) {
        let a = self.world_to_bitmap(from);
        let b = self.world_to_bitmap(to);
        self.stroke_bitmap_segment(a, b, style);
    }

    /// Stroke a segment given directly in bitmap coordinates.
    pub fn stroke_bitmap_segment(&mut self, a: Point, b: Point, style: &StrokeStyle) {
        let mut pb = PathBuilder::new();
        pb.move_to(a.x as f32, a.y as f32);
        pb.line_to(b.x as f32, b.y as f32);
        if let Some(path) = pb.finish() {
            self.pixmap
                .stroke_path(&path, &style.paint(), &style.stroke(), Transform::identity(), None);
        }
    }

    /// Stroke the outline of an axis-aligned world rectangle.
    pub fn stroke_rect(&mut self, rect: Rect, style: &StrokeStyle) {
        let rect = rect.abs();
        let p0 = self.world_to_bitmap(Point::new(rect.x0, rect.y0));
        let p1 = self.world_to_bitmap(Point::new(rect.x1, rect.y1));
        if let Some(path) = rect_path(p0, p1) {
            self.pixmap
                .stroke_path(&path, &style.paint(), &style.stroke(), Transform::identity(), None);
        }
    }

    /// Stroke the ellipse inscribed in a world rectangle.
    pub fn stroke_ellipse(&mut self, rect: Rect, style: &StrokeStyle) {
        let rect = rect.abs();
        let p0 = self.world_to_bitmap(Point::new(rect.x0, rect.y0));
        let p1 = self.world_to_bitmap(Point::new(rect.x1, rect.y1));
        if let Some(path) = ellipse_path(p0, p1) {
            self.pixmap
                .stroke_path(&path, &style.paint(), &style.stroke(), Transform::identity(), None);
        }
    }

    /// Erase everything, keeping size and origin.
    pub fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    /// Swap in a new bitmap and origin wholesale.
    pub(crate) fn replace(&mut self, pixmap: Pixmap, origin: Point) {
        self.pixmap = pixmap;
        self.origin = origin;
        self.generation += 1;
    }

    /// Colour (non-premultiplied) at a world coordinate, if it is on the bitmap.
    pub fn pixel_at_world(&self, world: Point) -> Option<ColorU8> {
        let p = self.world_to_bitmap(world);
        if p.x < 0.0 || p.y < 0.0 || p.x >= f64::from(self.width()) || p.y >= f64::from(self.height()) {
            return None;
        }
        self.pixmap
            .pixel(p.x.floor() as u32, p.y.floor() as u32)
            .map(|c| c.demultiply())
    }

    /// Whether no pixel on the surface has been painted.
    pub fn is_blank(&self) -> bool {
        self.pixmap.pixels().iter().all(|p| p.alpha() == 0)
    }
}

/// Allocate a blank bitmap, reporting allocator failure instead of aborting.
fn allocate(width: u64, height: u64) -> Result<Pixmap, SurfaceError> {
    let failed = SurfaceError::Allocation { width, height };
    let size = u32::try_from(width)
        .ok()
        .zip(u32::try_from(height).ok())
        .and_then(|(w, h)| IntSize::from_wh(w, h))
        .ok_or(failed.clone())?;
    let len = usize::try_from(width.saturating_mul(height).saturating_mul(4)).map_err(|_| failed.clone())?;
    let mut data = Vec::new();
    data.try_reserve_exact(len).map_err(|_| failed.clone())?;
    data.resize(len, 0);
    Pixmap::from_vec(data, size).ok_or(failed)
}

/// Closed rectangle path between two corners.
pub fn rect_path(p0: Point, p1: Point) -> Option<tiny_skia::Path> {
    let (x0, y0, x1, y1) = (p0.x as f32, p0.y as f32, p1.x as f32, p1.y as f32);
    let mut pb = PathBuilder::new();
    pb.move_to(x0, y0);
    pb.line_to(x1, y0);
    pb.line_to(x1, y1);
    pb.line_to(x0, y1);
    pb.close();
    pb.finish()
}

/// Ellipse path inscribed in the box between two corners; `None` when degenerate.
pub fn ellipse_path(p0: Point, p1: Point) -> Option<tiny_skia::Path> {
    if p0.x == p1.x || p0.y == p1.y {
        return None;
    }
    let oval = tiny_skia::Rect::from_ltrb(
        p0.x.min(p1.x) as f32,
        p0.y.min(p1.y) as f32,
        p0.x.max(p1.x) as f32,
        p0.y.max(p1.y) as f32,
    )?;
    PathBuilder::from_oval(oval)
}
