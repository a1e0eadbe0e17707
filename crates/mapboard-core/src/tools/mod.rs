//! Tool engine: turns a single-pointer interaction into raster operations.
//!
//! The engine holds the tool settings and the state of the local
//! interaction. Every transition that changes the surface is reported as a
//! [`DrawEvent`] so the sync bridge can forward it; remote events are
//! replayed through the same [`FreehandStroke`] / [`ShapeDraft`] operations.

mod freehand;
mod shape;

pub use freehand::FreehandStroke;
pub use shape::{ShapeDraft, ShapeGeometry, ShapeKind};

use kurbo::Point;

use crate::history::HistoryManager;
use crate::style::{Rgb, StrokeStyle, ToolKind, world_width};
use crate::surface::{RasterSurface, SurfaceError};
use crate::sync::DrawEvent;

/// Tool, colour and width used when an interaction starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolSettings {
    pub tool: ToolKind,
    pub color: Rgb,
    /// Stroke width in screen pixels.
    pub stroke_width: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: ToolKind::Pencil,
            color: Rgb::new(0xe6, 0xbd, 0x3b),
            stroke_width: 4.0,
        }
    }
}

impl ToolSettings {
    /// Explicit style for an interaction at the given zoom factor.
    pub fn style(&self, scale: f64) -> StrokeStyle {
        StrokeStyle::for_tool(self.tool, self.color, self.stroke_width, scale)
    }
}

/// State of the local drawing interaction.
#[derive(Debug, Clone, Default)]
pub enum ToolState {
    #[default]
    Idle,
    /// Pencil or eraser stroke in progress.
    Freehand {
        stroke_id: String,
        stroke: FreehandStroke,
    },
    /// Rectangle or ellipse being dragged out.
    Shape(ShapeDraft),
}

/// Dashed outline the compositor draws for a pending shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapePreview {
    pub geometry: ShapeGeometry,
    pub style: StrokeStyle,
}

/// Manages the current tool and its interaction state.
#[derive(Debug, Clone, Default)]
pub struct ToolEngine {
    pub settings: ToolSettings,
    state: ToolState,
}

impl ToolEngine {
    pub fn new(settings: ToolSettings) -> Self {
        Self {
            settings,
            state: ToolState::Idle,
        }
    }

    pub fn state(&self) -> &ToolState {
        &self.state
    }

    /// Check if a draw interaction is active.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, ToolState::Idle)
    }

    /// Start an interaction at a world point.
    ///
    /// Ignored while another interaction is active.
    pub fn begin(
        &mut self,
        world: Point,
        scale: f64,
        surface: &mut RasterSurface,
        history: &mut HistoryManager,
    ) -> Result<Option<DrawEvent>, SurfaceError> {
        if self.is_active() {
            return Ok(None);
        }
        let style = self.settings.style(scale);

        if let Some(kind) = ShapeKind::from_tool(self.settings.tool) {
            self.state = ToolState::Shape(ShapeDraft::begin(surface, history, kind, style, world));
            return Ok(None);
        }

        let stroke = absorb(FreehandStroke::begin(surface, history, style, world))?;
        let Some(stroke) = stroke else {
            return Ok(None);
        };
        let stroke_id = uuid::Uuid::new_v4().to_string();
        let event = DrawEvent::stroke_start(&stroke_id, self.settings.tool, self.settings.color, world, style.width);
        self.state = ToolState::Freehand { stroke_id, stroke };
        Ok(Some(event))
    }

    /// Move the active interaction to a world point.
    pub fn update(&mut self, world: Point, surface: &mut RasterSurface) -> Result<Option<DrawEvent>, SurfaceError> {
        match &mut self.state {
            ToolState::Idle => Ok(None),
            ToolState::Freehand { stroke_id, stroke } => {
                Ok(absorb(stroke.extend(surface, world))?.map(|_| DrawEvent::stroke_segment(stroke_id, world)))
            }
            ToolState::Shape(draft) => {
                draft.update(world);
                Ok(None)
            }
        }
    }

    /// Finish the active interaction: close a stroke or commit a shape.
    pub fn end(&mut self, surface: &mut RasterSurface) -> Result<Option<DrawEvent>, SurfaceError> {
        match std::mem::take(&mut self.state) {
            ToolState::Idle => Ok(None),
            ToolState::Freehand { stroke_id, .. } => Ok(Some(DrawEvent::StrokeEnd { stroke_id })),
            ToolState::Shape(draft) => {
                let (start, current, style) = (draft.start(), draft.current(), *draft.style());
                let Some(geometry) = absorb(draft.commit(surface))? else {
                    return Ok(None);
                };
                Ok(Some(shape_event(geometry.kind(), start, current, style.color, style.width)))
            }
        }
    }

    /// Abort the interaction because another gesture took over.
    ///
    /// A freehand stroke keeps what it painted and is closed; a shape
    /// draft is dropped without touching the surface.
    pub fn interrupt(&mut self) -> Option<DrawEvent> {
        match std::mem::take(&mut self.state) {
            ToolState::Freehand { stroke_id, .. } => Some(DrawEvent::StrokeEnd { stroke_id }),
            ToolState::Idle | ToolState::Shape(_) => None,
        }
    }

    /// Drop any interaction without reporting it.
    pub fn reset(&mut self) {
        self.state = ToolState::Idle;
    }

    /// The pending shape, if a shape tool is dragging.
    pub fn shape_preview(&self) -> Option<ShapePreview> {
        match &self.state {
            ToolState::Shape(draft) => Some(ShapePreview {
                geometry: draft.geometry(),
                style: *draft.style(),
            }),
            _ => None,
        }
    }
}

/// Snapshot the surface and erase it.
pub fn clear_surface(surface: &mut RasterSurface, history: &mut HistoryManager) {
    history.push_snapshot(surface);
    surface.clear();
}

/// Build the wire event for a committed shape.
pub fn shape_event(kind: ShapeKind, start: Point, end: Point, color: Rgb, width: f64) -> DrawEvent {
    let world_width = Some(width);
    match kind {
        ShapeKind::Rect => DrawEvent::ShapeRect {
            x: start.x,
            y: start.y,
            x2: end.x,
            y2: end.y,
            color,
            world_width,
        },
        ShapeKind::Ellipse => DrawEvent::ShapeEllipse {
            x: start.x,
            y: start.y,
            x2: end.x,
            y2: end.y,
            color,
            world_width,
        },
    }
}

/// Style for a remote event: the sender's world width when given,
/// otherwise the local screen width at the local zoom.
pub fn remote_style(tool: ToolKind, color: Rgb, world_width_hint: Option<f64>, local: &ToolSettings, scale: f64) -> StrokeStyle {
    let width = world_width_hint
        .filter(|w| w.is_finite() && *w > 0.0)
        .unwrap_or_else(|| world_width(local.stroke_width, scale));
    StrokeStyle {
        color,
        width,
        composite: tool.composite(),
    }
}

/// Malformed coordinates make the operation a no-op; anything else is fatal.
fn absorb<T>(result: Result<T, SurfaceError>) -> Result<Option<T>, SurfaceError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(SurfaceError::InvalidBounds) => {
            log::debug!("Ignoring draw at non-finite coordinates");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
