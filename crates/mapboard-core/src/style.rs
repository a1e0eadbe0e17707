//! Colour, tool and stroke style types.

use peniko::Color;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An opaque RGB colour, written on the wire as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Convert to a tiny-skia colour with the given alpha.
    pub fn to_skia(self, alpha: u8) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, alpha)
    }
}

/// Error returned when a colour string is not `#rgb` or `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid colour {0:?}")]
pub struct ParseRgbError(pub String);

impl FromStr for Rgb {
    type Err = ParseRgbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRgbError(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !hex.is_ascii() {
            return Err(err());
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).map_err(|_| err());
        match hex.len() {
            3 => Ok(Self::new(
                channel(0..1)? * 17,
                channel(1..2)? * 17,
                channel(2..3)? * 17,
            )),
            6 => Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<Color> for Rgb {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b)
    }
}

impl From<Rgb> for Color {
    fn from(color: Rgb) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, 255)
    }
}

/// Available drawing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Pencil,
    Eraser,
    Rect,
    Ellipse,
}

impl ToolKind {
    /// Pencil and eraser draw continuously while the pointer moves.
    pub fn is_freehand(self) -> bool {
        matches!(self, ToolKind::Pencil | ToolKind::Eraser)
    }

    /// Rectangle and ellipse preview while dragging and commit on release.
    pub fn is_shape(self) -> bool {
        matches!(self, ToolKind::Rect | ToolKind::Ellipse)
    }

    /// Composite mode this tool paints with.
    pub fn composite(self) -> CompositeMode {
        match self {
            ToolKind::Eraser => CompositeMode::Erase,
            ToolKind::Pencil | ToolKind::Rect | ToolKind::Ellipse => CompositeMode::PaintOver,
        }
    }
}

/// How new pixels combine with the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeMode {
    /// Draw colour over existing content.
    #[default]
    PaintOver,
    /// Replace covered pixels with transparency.
    Erase,
}

impl CompositeMode {
    pub fn blend_mode(self) -> tiny_skia::BlendMode {
        match self {
            CompositeMode::PaintOver => tiny_skia::BlendMode::SourceOver,
            CompositeMode::Erase => tiny_skia::BlendMode::DestinationOut,
        }
    }
}

/// Style passed explicitly into every raster draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgb,
    /// Width in bitmap pixels (world units).
    pub width: f64,
    pub composite: CompositeMode,
}

impl StrokeStyle {
    /// Build the style for `tool`, converting a screen-pixel width to world units.
    ///
    /// The result is never thinner than one bitmap pixel.
    pub fn for_tool(tool: ToolKind, color: Rgb, width_px: f64, scale: f64) -> Self {
        Self {
            color,
            width: world_width(width_px, scale),
            composite: tool.composite(),
        }
    }

    pub fn paint(&self) -> tiny_skia::Paint<'static> {
        let mut paint = tiny_skia::Paint::default();
        paint.set_color(self.color.to_skia(255));
        paint.anti_alias = true;
        paint.blend_mode = self.composite.blend_mode();
        paint
    }

    pub fn stroke(&self) -> tiny_skia::Stroke {
        tiny_skia::Stroke {
            width: self.width as f32,
            line_cap: tiny_skia::LineCap::Round,
            line_join: tiny_skia::LineJoin::Round,
            ..Default::default()
        }
    }
}

/// Screen-constant stroke width expressed in world units.
pub fn world_width(width_px: f64, scale: f64) -> f64 {
    (width_px / scale).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_long_hex() {
        assert_eq!("#e6bd3b".parse::<Rgb>().unwrap(), Rgb::new(0xe6, 0xbd, 0x3b));
        assert_eq!("#FFFFFF".parse::<Rgb>().unwrap(), Rgb::white());
    }

    #[test]
    fn test_parse_short_hex() {
        assert_eq!("#f00".parse::<Rgb>().unwrap(), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("e6bd3b".parse::<Rgb>().is_err());
        assert!("#e6bd3".parse::<Rgb>().is_err());
        assert!("#zzzzzz".parse::<Rgb>().is_err());
        assert!("#ééé".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_display_is_lowercase_hex() {
        assert_eq!(Rgb::new(0xE6, 0x0B, 0x3B).to_string(), "#e60b3b");
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Rgb::new(1, 2, 3)).unwrap();
        assert_eq!(json, "\"#010203\"");
        let back: Rgb = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Rgb::new(1, 2, 3));
    }

    #[test]
    fn test_tool_serde_names() {
        assert_eq!(serde_json::to_string(&ToolKind::Rect).unwrap(), "\"rect\"");
        let tool: ToolKind = serde_json::from_str("\"eraser\"").unwrap();
        assert_eq!(tool, ToolKind::Eraser);
    }

    #[test]
    fn test_eraser_uses_destination_out() {
        assert_eq!(ToolKind::Eraser.composite(), CompositeMode::Erase);
        assert_eq!(CompositeMode::Erase.blend_mode(), tiny_skia::BlendMode::DestinationOut);
        assert_eq!(ToolKind::Rect.composite(), CompositeMode::PaintOver);
    }

    #[test]
    fn test_world_width_is_screen_constant() {
        assert!((world_width(4.0, 1.0) - 4.0).abs() < f64::EPSILON);
        assert!((world_width(4.0, 2.0) - 2.0).abs() < f64::EPSILON);
        // Never thinner than one bitmap pixel.
        assert!((world_width(4.0, 8.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_peniko_conversion() {
        let color: Color = Rgb::new(10, 20, 30).into();
        assert_eq!(Rgb::from(color), Rgb::new(10, 20, 30));
    }
}
