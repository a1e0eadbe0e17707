//! The canvas of one session: viewport, surface, history, tools and sync.

use std::collections::HashMap;

use kurbo::{Point, Size};

use crate::collaboration::SyncBridge;
use crate::config::CanvasConfig;
use crate::history::{HistoryManager, Snapshot};
use crate::input::{GestureAction, GestureRouter, PointerEvent, WheelInput};
use crate::style::{Rgb, ToolKind};
use crate::surface::{RasterSurface, SurfaceError};
use crate::sync::{DrawChannel, DrawEvent, DrawMessage, SyncResult};
use crate::tools::{
    FreehandStroke, ShapeDraft, ShapeKind, ShapePreview, ToolEngine, ToolSettings, clear_surface, remote_style,
};
use crate::viewport::{Viewport, ZoomAnchor};

/// One collaborative drawing canvas.
///
/// All input goes through the `handle_*` methods and never fails: malformed
/// input is ignored, and a surface that can no longer grow puts the canvas
/// into a faulted state where drawing is disabled but the view still pans
/// and zooms.
#[derive(Debug)]
pub struct Canvas {
    config: CanvasConfig,
    viewport: Viewport,
    surface: RasterSurface,
    history: HistoryManager,
    tools: ToolEngine,
    router: GestureRouter,
    sync: SyncBridge,
    /// The open freehand stroke of each peer, keyed by client id.
    remote_strokes: HashMap<String, (String, FreehandStroke)>,
    fault: Option<SurfaceError>,
    needs_redraw: bool,
}

impl Canvas {
    /// Create a canvas and allocate its initial surface.
    pub fn new(config: CanvasConfig) -> Result<Self, SurfaceError> {
        let surface = RasterSurface::from_config(&config)?;
        let color = config.default_color.parse::<Rgb>().unwrap_or_else(|e| {
            log::warn!("{}; using the built-in colour", e);
            ToolSettings::default().color
        });
        let settings = ToolSettings {
            tool: ToolKind::Pencil,
            color,
            stroke_width: config.default_stroke_width.max(1.0),
        };
        Ok(Self {
            viewport: Viewport::from_config(&config),
            surface,
            history: HistoryManager::new(config.max_history),
            tools: ToolEngine::new(settings),
            router: GestureRouter::new(config.wheel_zoom_factor),
            sync: SyncBridge::new(),
            remote_strokes: HashMap::new(),
            fault: None,
            needs_redraw: true,
            config,
        })
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn surface(&self) -> &RasterSurface {
        &self.surface
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn tools(&self) -> &ToolEngine {
        &self.tools
    }

    pub fn sync(&self) -> &SyncBridge {
        &self.sync
    }

    /// The error that disabled drawing, if any.
    pub fn fault(&self) -> Option<&SurfaceError> {
        self.fault.as_ref()
    }

    pub fn is_disabled(&self) -> bool {
        self.fault.is_some()
    }

    /// Pending shape outline for the compositor.
    pub fn shape_preview(&self) -> Option<ShapePreview> {
        self.tools.shape_preview()
    }

    /// Return and clear the redraw request.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    // --- Input ---

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        let action = self.router.handle_pointer(event, self.viewport.scale);
        self.apply_gesture(action);
    }

    pub fn handle_wheel(&mut self, wheel: WheelInput) {
        let action = self.router.handle_wheel(wheel);
        self.apply_gesture(action);
    }

    /// New element size in CSS pixels and the device pixel ratio.
    pub fn resize(&mut self, width: f64, height: f64, device_pixel_ratio: f64) {
        self.viewport.resize(Size::new(width, height), device_pixel_ratio);
        self.needs_redraw = true;
    }

    fn apply_gesture(&mut self, action: GestureAction) {
        match action {
            GestureAction::None => {}
            GestureAction::Pan(delta) => {
                self.viewport.pan(delta);
                self.needs_redraw = true;
            }
            GestureAction::ZoomTo { scale, anchor } => {
                self.viewport.set_zoom(scale, ZoomAnchor::Screen(anchor));
                self.needs_redraw = true;
            }
            GestureAction::ZoomBy { factor, anchor } => {
                self.viewport.zoom_by(factor, ZoomAnchor::Screen(anchor));
                self.needs_redraw = true;
            }
            GestureAction::DrawBegin(screen) => {
                if self.is_disabled() {
                    return;
                }
                let world = self.viewport.screen_to_world(screen);
                let result = self
                    .tools
                    .begin(world, self.viewport.scale, &mut self.surface, &mut self.history);
                self.after_draw(result);
            }
            GestureAction::DrawMove(screen) => {
                if self.is_disabled() {
                    return;
                }
                let world = self.viewport.screen_to_world(screen);
                let result = self.tools.update(world, &mut self.surface);
                self.after_draw(result);
            }
            GestureAction::DrawEnd => {
                if self.is_disabled() {
                    return;
                }
                let result = self.tools.end(&mut self.surface);
                self.after_draw(result);
            }
            GestureAction::DrawInterrupt => {
                if let Some(event) = self.tools.interrupt() {
                    self.sync.queue(event);
                }
                self.needs_redraw = true;
            }
        }
    }

    fn after_draw(&mut self, result: Result<Option<DrawEvent>, SurfaceError>) {
        match result {
            Ok(event) => {
                if let Some(event) = event {
                    self.sync.queue(event);
                }
                self.needs_redraw = true;
            }
            Err(e) => self.disable(e),
        }
    }

    fn disable(&mut self, error: SurfaceError) {
        log::error!("Drawing disabled: {}", error);
        self.tools.reset();
        self.remote_strokes.clear();
        self.fault = Some(error);
        self.needs_redraw = true;
    }

    // --- Tool settings ---

    pub fn tool(&self) -> ToolKind {
        self.tools.settings.tool
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tools.settings.tool = tool;
    }

    pub fn color(&self) -> Rgb {
        self.tools.settings.color
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.tools.settings.color = color;
    }

    /// Stroke width in screen pixels.
    pub fn stroke_width(&self) -> f64 {
        self.tools.settings.stroke_width
    }

    /// Set the stroke width in screen pixels (at least 1).
    pub fn set_stroke_width(&mut self, width: f64) {
        if width.is_finite() {
            self.tools.settings.stroke_width = width.max(1.0);
        }
    }

    // --- View ---

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_by(self.config.button_zoom_factor, ZoomAnchor::Center);
        self.needs_redraw = true;
    }

    pub fn zoom_out(&mut self) {
        self.viewport
            .zoom_by(1.0 / self.config.button_zoom_factor, ZoomAnchor::Center);
        self.needs_redraw = true;
    }

    pub fn zoom_reset(&mut self) {
        self.viewport.reset();
        self.needs_redraw = true;
    }

    pub fn set_zoom(&mut self, scale: f64, anchor: ZoomAnchor) {
        self.viewport.set_zoom(scale, anchor);
        self.needs_redraw = true;
    }

    pub fn set_zoom_percent(&mut self, percent: f64) {
        self.viewport.set_zoom_percent(percent);
        self.needs_redraw = true;
    }

    pub fn zoom_percent(&self) -> u32 {
        self.viewport.zoom_percent()
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.viewport.pan(kurbo::Vec2::new(dx, dy));
        self.needs_redraw = true;
    }

    // --- History ---

    /// Restore the previous surface state. Peers receive the result as a snapshot.
    pub fn undo(&mut self) -> bool {
        if self.is_disabled() || !self.history.undo(&mut self.surface) {
            return false;
        }
        self.after_restore();
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.is_disabled() || !self.history.redo(&mut self.surface) {
            return false;
        }
        self.after_restore();
        true
    }

    fn after_restore(&mut self) {
        self.needs_redraw = true;
        if self.sync.is_joined() {
            self.publish_snapshot();
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    /// Erase the whole surface (undoable).
    pub fn clear(&mut self) {
        if self.is_disabled() {
            return;
        }
        clear_surface(&mut self.surface, &mut self.history);
        self.sync.queue(DrawEvent::Clear);
        self.needs_redraw = true;
    }

    // --- Sync ---

    pub fn join(&mut self, session_id: &str) {
        self.sync.join(session_id);
    }

    pub fn leave(&mut self) {
        self.sync.leave();
        self.remote_strokes.clear();
    }

    /// Use a fixed client id instead of a random one.
    pub fn set_client_id(&mut self, client_id: &str) {
        let session = self.sync.session_id().map(str::to_string);
        self.sync = SyncBridge::with_client_id(client_id);
        if let Some(session) = session {
            self.sync.join(&session);
        }
    }

    /// Queue the whole surface as a `snapshot` message.
    pub fn publish_snapshot(&mut self) {
        match Snapshot::capture(&self.surface) {
            Ok(snapshot) => {
                let origin = snapshot.origin();
                self.sync.queue(DrawEvent::Snapshot {
                    data_url: snapshot.to_data_url(),
                    origin_x: origin.x,
                    origin_y: origin.y,
                });
            }
            Err(e) => log::warn!("Could not publish snapshot: {}", e),
        }
    }

    /// Take all pending outgoing messages.
    pub fn take_outgoing(&mut self) -> Vec<DrawMessage> {
        self.sync.take_outgoing()
    }

    /// Publish pending messages and apply everything received from peers.
    ///
    /// Returns how many remote messages were applied.
    pub fn sync_with(&mut self, channel: &mut dyn DrawChannel) -> SyncResult<usize> {
        let incoming = self.sync.exchange(channel)?;
        Ok(incoming.iter().filter(|m| self.apply_remote(m)).count())
    }

    /// Replay a message from a peer. Returns whether it changed anything.
    pub fn apply_remote(&mut self, message: &DrawMessage) -> bool {
        if !self.sync.accepts(message) {
            return false;
        }
        if self.is_disabled() {
            log::debug!("Ignoring remote {} while drawing is disabled", message.event.kind());
            return false;
        }
        log::debug!("Applying remote {} from {}", message.event.kind(), message.client_id);

        let scale = self.viewport.scale;
        let result = match &message.event {
            DrawEvent::StrokeStart {
                stroke_id,
                tool,
                color,
                x,
                y,
                world_width,
            } => {
                if !tool.is_freehand() {
                    log::warn!("Ignoring stroke:start with shape tool {:?}", tool);
                    return false;
                }
                let style = remote_style(*tool, *color, *world_width, &self.tools.settings, scale);
                match FreehandStroke::begin(&mut self.surface, &mut self.history, style, Point::new(*x, *y)) {
                    Ok(stroke) => {
                        let previous = self
                            .remote_strokes
                            .insert(message.client_id.clone(), (stroke_id.clone(), stroke));
                        if let Some((open_id, _)) = previous {
                            log::debug!("Stroke {} from {} ended without stroke:end", open_id, message.client_id);
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            DrawEvent::StrokeSegment { stroke_id, x, y } => {
                let Some(stroke) = self
                    .remote_strokes
                    .get_mut(&message.client_id)
                    .filter(|(open_id, _)| open_id == stroke_id)
                    .map(|(_, stroke)| stroke)
                else {
                    log::warn!("Ignoring segment for unknown stroke {}", stroke_id);
                    return false;
                };
                stroke.extend(&mut self.surface, Point::new(*x, *y)).map(|_| ())
            }
            DrawEvent::StrokeEnd { stroke_id } => {
                let is_open = self
                    .remote_strokes
                    .get(&message.client_id)
                    .is_some_and(|(open_id, _)| open_id == stroke_id);
                if is_open {
                    self.remote_strokes.remove(&message.client_id);
                }
                return is_open;
            }
            DrawEvent::ShapeRect {
                x,
                y,
                x2,
                y2,
                color,
                world_width,
            } => self.replay_shape(ShapeKind::Rect, Point::new(*x, *y), Point::new(*x2, *y2), *color, *world_width),
            DrawEvent::ShapeEllipse {
                x,
                y,
                x2,
                y2,
                color,
                world_width,
            } => self.replay_shape(ShapeKind::Ellipse, Point::new(*x, *y), Point::new(*x2, *y2), *color, *world_width),
            DrawEvent::Clear => {
                clear_surface(&mut self.surface, &mut self.history);
                Ok(())
            }
            DrawEvent::Snapshot {
                data_url,
                origin_x,
                origin_y,
            } => return self.restore_remote_snapshot(data_url, Point::new(*origin_x, *origin_y)),
        };

        match result {
            Ok(()) => {
                self.needs_redraw = true;
                true
            }
            Err(SurfaceError::InvalidBounds) => {
                log::warn!("Ignoring remote {} with non-finite coordinates", message.event.kind());
                false
            }
            Err(e) => {
                self.disable(e);
                false
            }
        }
    }

    fn replay_shape(
        &mut self,
        kind: ShapeKind,
        start: Point,
        end: Point,
        color: Rgb,
        world_width: Option<f64>,
    ) -> Result<(), SurfaceError> {
        let tool = match kind {
            ShapeKind::Rect => ToolKind::Rect,
            ShapeKind::Ellipse => ToolKind::Ellipse,
        };
        let style = remote_style(tool, color, world_width, &self.tools.settings, self.viewport.scale);
        let mut draft = ShapeDraft::begin(&self.surface, &mut self.history, kind, style, start);
        draft.update(end);
        draft.commit(&mut self.surface).map(|_| ())
    }

    fn restore_remote_snapshot(&mut self, data_url: &str, origin: Point) -> bool {
        let snapshot = match Snapshot::from_data_url(data_url, origin) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Ignoring remote snapshot: {}", e);
                return false;
            }
        };
        let inside = origin.x >= 0.0
            && origin.y >= 0.0
            && origin.x <= f64::from(snapshot.width())
            && origin.y <= f64::from(snapshot.height());
        if !inside {
            log::warn!("Ignoring remote snapshot with origin {:?} outside its bitmap", origin);
            return false;
        }

        self.history.push_snapshot(&self.surface);
        if let Err(e) = snapshot.restore_into(&mut self.surface) {
            log::warn!("Failed to restore remote snapshot: {}", e);
            return false;
        }
        self.needs_redraw = true;
        true
    }
}
