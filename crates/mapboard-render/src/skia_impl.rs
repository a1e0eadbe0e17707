//! CPU compositor built on tiny-skia.

use kurbo::{Affine, Point};
use mapboard_core::surface::{ellipse_path, rect_path};
use mapboard_core::{Canvas, ShapeGeometry, ShapePreview};
use peniko::Color;
use tiny_skia::{FilterQuality, LineCap, Paint, PathBuilder, Pixmap, PixmapPaint, StrokeDash, Transform};

use crate::renderer::{GridStyle, RenderContext, RenderResult, Renderer, RendererError};

/// Upper bound on grid lines per axis; beyond it the grid is skipped.
const MAX_GRID_LINES: f64 = 4096.0;

/// Composes frames into an owned pixmap of device-pixel size.
#[derive(Debug, Default)]
pub struct SkiaRenderer {
    frame: Option<Pixmap>,
}

impl SkiaRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last composed frame.
    pub fn frame(&self) -> Option<&Pixmap> {
        self.frame.as_ref()
    }

    /// Encode the last frame as PNG.
    pub fn frame_png(&self) -> RenderResult<Vec<u8>> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| RendererError::RenderFailed("No frame rendered yet".into()))?;
        frame
            .encode_png()
            .map_err(|e| RendererError::RenderFailed(e.to_string()))
    }

    fn frame_for(&mut self, width: u32, height: u32) -> RenderResult<&mut Pixmap> {
        let reuse = self
            .frame
            .as_ref()
            .is_some_and(|f| f.width() == width && f.height() == height);
        if !reuse {
            log::debug!("Allocating {}x{} frame", width, height);
            let pixmap = Pixmap::new(width, height)
                .ok_or_else(|| RendererError::InitFailed(format!("Cannot allocate {width}x{height} frame")))?;
            self.frame = Some(pixmap);
        }
        self.frame
            .as_mut()
            .ok_or_else(|| RendererError::InitFailed("Frame missing".into()))
    }
}

impl Renderer for SkiaRenderer {
    fn render(&mut self, ctx: &RenderContext) -> RenderResult<()> {
        let canvas = ctx.canvas;
        let viewport = canvas.viewport();
        let (width, height) = viewport.device_size();
        let background = to_skia_color(self.background_color(ctx));
        let frame = self.frame_for(width, height)?;

        frame.fill(background);

        let world_to_device = viewport.device_transform();
        draw_grid(frame, ctx, world_to_device);
        blit_surface(frame, canvas, world_to_device);
        if ctx.show_preview {
            if let Some(preview) = canvas.shape_preview() {
                draw_preview(frame, &preview, canvas, world_to_device);
            }
        }

        match canvas.fault() {
            Some(fault) => Err(RendererError::Disabled(fault.to_string())),
            None => Ok(()),
        }
    }
}

fn draw_grid(frame: &mut Pixmap, ctx: &RenderContext, transform: Affine) {
    let canvas = ctx.canvas;
    let viewport = canvas.viewport();
    let grid = canvas.config().grid_size;
    let visible = viewport.visible_world_rect();
    if ctx.grid_style == GridStyle::None
        || visible.width() / grid > MAX_GRID_LINES
        || visible.height() / grid > MAX_GRID_LINES
    {
        return;
    }

    let start_x = (visible.x0 / grid).floor() * grid;
    let start_y = (visible.y0 / grid).floor() * grid;
    let mut pb = PathBuilder::new();
    let mut x = start_x;
    while x <= visible.x1 {
        pb.move_to(x as f32, visible.y0 as f32);
        pb.line_to(x as f32, visible.y1 as f32);
        x += grid;
    }
    let mut y = start_y;
    while y <= visible.y1 {
        pb.move_to(visible.x0 as f32, y as f32);
        pb.line_to(visible.x1 as f32, y as f32);
        y += grid;
    }

    let Some(path) = pb.finish() else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(to_skia_color(ctx.grid_color));
    paint.anti_alias = true;
    let stroke = tiny_skia::Stroke {
        width: (1.0 / viewport.scale) as f32,
        ..Default::default()
    };
    frame.stroke_path(&path, &paint, &stroke, to_skia_transform(transform), None);
}

fn blit_surface(frame: &mut Pixmap, canvas: &Canvas, transform: Affine) {
    let surface = canvas.surface();
    let origin = surface.origin();
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    let placed = transform * Affine::translate((-origin.x, -origin.y));
    frame.draw_pixmap(0, 0, surface.pixmap().as_ref(), &paint, to_skia_transform(placed), None);
}

fn draw_preview(frame: &mut Pixmap, preview: &ShapePreview, canvas: &Canvas, transform: Affine) {
    let bounds = preview.geometry.bounds();
    let (p0, p1) = (Point::new(bounds.x0, bounds.y0), Point::new(bounds.x1, bounds.y1));
    let path = match preview.geometry {
        ShapeGeometry::Rect(_) => rect_path(p0, p1),
        ShapeGeometry::Ellipse { .. } => ellipse_path(p0, p1),
    };
    let Some(path) = path else {
        return;
    };

    let dash = (canvas.config().dash_length / canvas.viewport().scale) as f32;
    let mut stroke = preview.style.stroke();
    stroke.line_cap = LineCap::Butt;
    stroke.dash = StrokeDash::new(vec![dash, dash], 0.0);
    frame.stroke_path(&path, &preview.style.paint(), &stroke, to_skia_transform(transform), None);
}

fn to_skia_transform(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

fn to_skia_color(color: Color) -> tiny_skia::Color {
    let rgba = color.to_rgba8();
    tiny_skia::Color::from_rgba8(rgba.r, rgba.g, rgba.b, rgba.a)
}
