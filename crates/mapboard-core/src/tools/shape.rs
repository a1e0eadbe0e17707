//! Rectangle and ellipse drafts that commit onto the surface on release.

use kurbo::{Point, Rect, Vec2};

use crate::history::HistoryManager;
use crate::style::{CompositeMode, StrokeStyle, ToolKind};
use crate::surface::{RasterSurface, SurfaceError};

/// Kinds of shape the shape tools commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Rect,
    Ellipse,
}

impl ShapeKind {
    pub fn from_tool(tool: ToolKind) -> Option<Self> {
        match tool {
            ToolKind::Rect => Some(ShapeKind::Rect),
            ToolKind::Ellipse => Some(ShapeKind::Ellipse),
            ToolKind::Pencil | ToolKind::Eraser => None,
        }
    }
}

/// Concrete world-space geometry derived from a drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeGeometry {
    /// Axis-aligned box from `min(start, current)` to `max(start, current)`.
    Rect(Rect),
    Ellipse { center: Point, radii: Vec2 },
}

impl ShapeGeometry {
    pub fn from_drag(kind: ShapeKind, start: Point, current: Point) -> Self {
        match kind {
            ShapeKind::Rect => ShapeGeometry::Rect(Rect::from_points(start, current)),
            ShapeKind::Ellipse => ShapeGeometry::Ellipse {
                center: start.midpoint(current),
                radii: Vec2::new((current.x - start.x).abs() / 2.0, (current.y - start.y).abs() / 2.0),
            },
        }
    }

    /// Bounding box in world coordinates.
    pub fn bounds(&self) -> Rect {
        match *self {
            ShapeGeometry::Rect(rect) => rect,
            ShapeGeometry::Ellipse { center, radii } => Rect::new(
                center.x - radii.x,
                center.y - radii.y,
                center.x + radii.x,
                center.y + radii.y,
            ),
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            ShapeGeometry::Rect(_) => ShapeKind::Rect,
            ShapeGeometry::Ellipse { .. } => ShapeKind::Ellipse,
        }
    }
}

/// A shape being dragged out. Only the preview changes until [`commit`](Self::commit).
#[derive(Debug, Clone)]
pub struct ShapeDraft {
    kind: ShapeKind,
    style: StrokeStyle,
    start: Point,
    current: Point,
}

impl ShapeDraft {
    /// Snapshot the surface for undo and start a draft at `start`.
    pub fn begin(
        surface: &RasterSurface,
        history: &mut HistoryManager,
        kind: ShapeKind,
        style: StrokeStyle,
        start: Point,
    ) -> Self {
        history.push_snapshot(surface);
        Self {
            kind,
            style: StrokeStyle {
                composite: CompositeMode::PaintOver,
                ..style
            },
            start,
            current: start,
        }
    }

    pub fn update(&mut self, current: Point) {
        self.current = current;
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn current(&self) -> Point {
        self.current
    }

    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    pub fn geometry(&self) -> ShapeGeometry {
        ShapeGeometry::from_drag(self.kind, self.start, self.current)
    }

    /// Grow the surface to fit the shape and paint it.
    pub fn commit(self, surface: &mut RasterSurface) -> Result<ShapeGeometry, SurfaceError> {
        let geometry = self.geometry();
        surface.ensure_capacity(self.start, self.current)?;
        match geometry {
            ShapeGeometry::Rect(rect) => surface.stroke_rect(rect, &self.style),
            ShapeGeometry::Ellipse { .. } => surface.stroke_ellipse(geometry.bounds(), &self.style),
        }
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Rgb;

    #[test]
    fn test_rect_geometry_normalizes_corners() {
        let geometry = ShapeGeometry::from_drag(ShapeKind::Rect, Point::new(50.0, -10.0), Point::new(-30.0, 20.0));
        assert_eq!(geometry, ShapeGeometry::Rect(Rect::new(-30.0, -10.0, 50.0, 20.0)));
    }

    #[test]
    fn test_ellipse_geometry() {
        let geometry = ShapeGeometry::from_drag(ShapeKind::Ellipse, Point::new(10.0, 40.0), Point::new(50.0, 0.0));
        assert_eq!(
            geometry,
            ShapeGeometry::Ellipse {
                center: Point::new(30.0, 20.0),
                radii: Vec2::new(20.0, 20.0),
            }
        );
        assert_eq!(geometry.bounds(), Rect::new(10.0, 0.0, 50.0, 40.0));
    }

    #[test]
    fn test_draft_is_preview_until_commit() {
        let mut surface = RasterSurface::new(256, 16.0, 8192).unwrap();
        let mut history = HistoryManager::new(30);
        let style = StrokeStyle::for_tool(ToolKind::Rect, Rgb::white(), 2.0, 1.0);

        let mut draft = ShapeDraft::begin(&surface, &mut history, ShapeKind::Rect, style, Point::new(-20.0, -20.0));
        draft.update(Point::new(20.0, 30.0));
        assert_eq!(history.undo_depth(), 1);
        assert!(surface.is_blank());

        draft.commit(&mut surface).unwrap();
        assert_eq!(surface.pixel_at_world(Point::new(-20.0, 0.0)).unwrap().alpha(), 255);
        assert_eq!(surface.pixel_at_world(Point::new(0.0, 29.5)).unwrap().alpha(), 255);
        assert_eq!(surface.pixel_at_world(Point::new(0.0, 0.0)).unwrap().alpha(), 0);
    }

    #[test]
    fn test_commit_paints_over_even_from_eraser_style() {
        let mut surface = RasterSurface::new(256, 16.0, 8192).unwrap();
        let mut history = HistoryManager::new(30);
        let style = StrokeStyle::for_tool(ToolKind::Eraser, Rgb::white(), 2.0, 1.0);
        let mut draft = ShapeDraft::begin(&surface, &mut history, ShapeKind::Ellipse, style, Point::new(-30.0, -30.0));
        assert_eq!(draft.style().composite, CompositeMode::PaintOver);
        draft.update(Point::new(30.0, 30.0));
        draft.commit(&mut surface).unwrap();
        assert!(!surface.is_blank());
    }

    #[test]
    fn test_commit_grows_surface_for_far_shape() {
        let mut surface = RasterSurface::new(256, 16.0, 8192).unwrap();
        let mut history = HistoryManager::new(30);
        let style = StrokeStyle::for_tool(ToolKind::Rect, Rgb::white(), 2.0, 1.0);
        let mut draft = ShapeDraft::begin(&surface, &mut history, ShapeKind::Rect, style, Point::new(100.0, 100.0));
        draft.update(Point::new(300.0, 150.0));
        draft.commit(&mut surface).unwrap();
        assert!(surface.width() >= 512);
        assert_eq!(surface.pixel_at_world(Point::new(300.0, 120.0)).unwrap().alpha(), 255);
    }
}
