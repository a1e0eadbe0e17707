//! Mapboard Core Library
//!
//! Platform-agnostic drawing engine for the shared map of a tabletop
//! session room: an unbounded raster canvas with pan/zoom, pencil, eraser
//! and shape tools, snapshot undo/redo, and a draw message contract for
//! keeping every participant's canvas in step.

pub mod canvas;
pub mod collaboration;
pub mod config;
pub mod history;
pub mod input;
pub mod style;
pub mod surface;
pub mod sync;
pub mod tools;
pub mod viewport;

pub use canvas::Canvas;
pub use collaboration::SyncBridge;
pub use config::{CanvasConfig, ConfigError};
pub use history::{HistoryManager, Snapshot, SnapshotError};
pub use input::{GestureAction, GestureRouter, Modifiers, MouseButton, PointerEvent, PointerInput, WheelInput};
pub use style::{CompositeMode, Rgb, StrokeStyle, ToolKind};
pub use surface::{RasterSurface, SurfaceError};
pub use sync::{DrawChannel, DrawEvent, DrawMessage, MemoryChannel, SyncError};
pub use tools::{ShapeGeometry, ShapeKind, ShapePreview, ToolEngine, ToolSettings};
pub use viewport::{Viewport, ZoomAnchor};
