//! Incremental freehand strokes (pencil and eraser).

use kurbo::Point;

use crate::history::HistoryManager;
use crate::style::StrokeStyle;
use crate::surface::{RasterSurface, SurfaceError};

/// An open freehand stroke on a raster surface.
///
/// The stroke keeps its pen position in bitmap space. Whenever the bitmap
/// behind the surface is replaced the pen is re-opened at the last world
/// point, translated through the new origin, before the next segment.
#[derive(Debug, Clone)]
pub struct FreehandStroke {
    style: StrokeStyle,
    last_world: Point,
    pen: Point,
    generation: u64,
    segments: usize,
}

impl FreehandStroke {
    /// Snapshot the surface for undo and open a stroke at `start`.
    ///
    /// Nothing is painted until the first [`extend`](Self::extend).
    pub fn begin(
        surface: &mut RasterSurface,
        history: &mut HistoryManager,
        style: StrokeStyle,
        start: Point,
    ) -> Result<Self, SurfaceError> {
        history.push_snapshot(surface);
        surface.ensure_capacity(start, start)?;
        Ok(Self {
            style,
            last_world: start,
            pen: surface.world_to_bitmap(start),
            generation: surface.generation(),
            segments: 0,
        })
    }

    /// Extend the stroke to `to`, painting the new segment immediately.
    ///
    /// Returns whether the surface grew to fit the point.
    pub fn extend(&mut self, surface: &mut RasterSurface, to: Point) -> Result<bool, SurfaceError> {
        let grew = surface.ensure_capacity(to, to)?;
        if grew || self.generation != surface.generation() {
            self.pen = surface.world_to_bitmap(self.last_world);
            self.generation = surface.generation();
        }

        let next = surface.world_to_bitmap(to);
        surface.stroke_bitmap_segment(self.pen, next, &self.style);
        self.pen = next;
        self.last_world = to;
        self.segments += 1;
        Ok(grew)
    }

    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    /// Last world point reached by the stroke.
    pub fn last_point(&self) -> Point {
        self.last_world
    }

    /// Number of segments painted so far.
    pub fn segment_count(&self) -> usize {
        self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Rgb, ToolKind};

    fn setup() -> (RasterSurface, HistoryManager) {
        (RasterSurface::new(256, 16.0, 8192).unwrap(), HistoryManager::new(30))
    }

    #[test]
    fn test_begin_takes_snapshot_without_painting() {
        let (mut surface, mut history) = setup();
        let style = StrokeStyle::for_tool(ToolKind::Pencil, Rgb::white(), 4.0, 1.0);
        let stroke = FreehandStroke::begin(&mut surface, &mut history, style, Point::ZERO).unwrap();
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(stroke.segment_count(), 0);
        assert!(surface.is_blank());
    }

    #[test]
    fn test_extend_paints_immediately() {
        let (mut surface, mut history) = setup();
        let style = StrokeStyle::for_tool(ToolKind::Pencil, Rgb::white(), 4.0, 1.0);
        let mut stroke = FreehandStroke::begin(&mut surface, &mut history, style, Point::ZERO).unwrap();
        stroke.extend(&mut surface, Point::new(40.0, 0.0)).unwrap();
        assert_eq!(surface.pixel_at_world(Point::new(20.0, 0.5)).unwrap().alpha(), 255);
        assert_eq!(stroke.last_point(), Point::new(40.0, 0.0));
    }

    #[test]
    fn test_stroke_stays_continuous_across_growth() {
        let (mut surface, mut history) = setup();
        let style = StrokeStyle::for_tool(ToolKind::Pencil, Rgb::white(), 4.0, 1.0);
        let start = Point::new(-100.0, 0.0);
        let mut stroke = FreehandStroke::begin(&mut surface, &mut history, style, start).unwrap();

        // Crossing the left margin shifts the origin.
        let grew = stroke.extend(&mut surface, Point::new(-140.0, 0.0)).unwrap();
        assert!(grew);
        assert!(surface.origin().x > 128.0);

        // Both the segment before and the point after the shift land in world space.
        for x in [-135.0, -120.0, -105.0] {
            let pixel = surface.pixel_at_world(Point::new(x, 0.5)).unwrap();
            assert_eq!(pixel.alpha(), 255, "gap at x={x}");
        }
    }

    #[test]
    fn test_pen_reopens_after_external_replace() {
        let (mut surface, mut history) = setup();
        let style = StrokeStyle::for_tool(ToolKind::Pencil, Rgb::white(), 4.0, 1.0);
        let mut stroke = FreehandStroke::begin(&mut surface, &mut history, style, Point::ZERO).unwrap();

        // Another writer grows the surface on the negative side.
        surface
            .ensure_capacity(Point::new(-400.0, -400.0), Point::new(-400.0, -400.0))
            .unwrap();
        let grew = stroke.extend(&mut surface, Point::new(30.0, 0.0)).unwrap();
        assert!(!grew);
        assert_eq!(surface.pixel_at_world(Point::new(15.0, 0.5)).unwrap().alpha(), 255);
    }
}
