//! Mapboard Render Library
//!
//! Composes what the user sees: background grid, the raster surface placed
//! at its world position, and the dashed outline of a shape being dragged.
//! The default implementation rasterizes on the CPU with tiny-skia.

mod renderer;
mod skia_impl;

pub use renderer::{GridStyle, RenderContext, RenderResult, Renderer, RendererError};
pub use skia_impl::SkiaRenderer;
