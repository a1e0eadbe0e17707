//! Renderer trait abstraction.

use mapboard_core::Canvas;
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
    /// The canvas stopped accepting drawing; the frame still shows its last state.
    #[error("Canvas disabled: {0}")]
    Disabled(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Grid display style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridStyle {
    /// No grid.
    None,
    /// World-aligned grid lines.
    #[default]
    Lines,
}

/// Context for a single render frame.
pub struct RenderContext<'a> {
    /// The canvas to render; its viewport decides frame size and transform.
    pub canvas: &'a Canvas,
    /// Colour the frame is cleared to.
    pub background_color: Color,
    /// Grid display style.
    pub grid_style: GridStyle,
    pub grid_color: Color,
    /// Draw the dashed outline of a pending shape.
    pub show_preview: bool,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context.
    pub fn new(canvas: &'a Canvas) -> Self {
        Self {
            canvas,
            background_color: Color::from_rgba8(0, 0, 0, 255),
            grid_style: GridStyle::Lines,
            grid_color: Color::from_rgba8(255, 255, 255, 15),
            show_preview: true,
        }
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Set the grid style.
    pub fn with_grid(mut self, style: GridStyle) -> Self {
        self.grid_style = style;
        self
    }

    pub fn with_grid_color(mut self, color: Color) -> Self {
        self.grid_color = color;
        self
    }

    pub fn with_preview(mut self, show: bool) -> Self {
        self.show_preview = show;
        self
    }
}

/// Trait for rendering backends.
pub trait Renderer: Send + Sync {
    /// Compose one frame of the canvas.
    ///
    /// Returns [`RendererError::Disabled`] after the frame is drawn when the
    /// canvas has stopped accepting input.
    fn render(&mut self, ctx: &RenderContext) -> RenderResult<()>;

    /// Get the background color (for clearing).
    fn background_color(&self, ctx: &RenderContext) -> Color {
        ctx.background_color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapboard_core::CanvasConfig;

    #[test]
    fn test_grid_defaults_to_lines() {
        assert_eq!(GridStyle::default(), GridStyle::Lines);
    }

    #[test]
    fn test_context_builder() {
        let config = CanvasConfig {
            initial_surface_size: 256,
            ..CanvasConfig::default()
        };
        let canvas = Canvas::new(config).unwrap();
        let ctx = RenderContext::new(&canvas)
            .with_grid(GridStyle::None)
            .with_background(Color::from_rgba8(1, 2, 3, 255))
            .with_preview(false);
        assert_eq!(ctx.grid_style, GridStyle::None);
        assert!(!ctx.show_preview);
        assert_eq!(ctx.background_color.to_rgba8().b, 3);
    }
}
