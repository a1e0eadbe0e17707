//! Tunable constants for a canvas instance.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings for the viewport, raster surface, history and tools.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use mapboard_core::CanvasConfig;
///
/// let config = CanvasConfig::from_json(r#"{ "maxHistory": 10 }"#).unwrap();
/// assert_eq!(config.max_history, 10);
/// assert_eq!(config.grid_size, 48.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanvasConfig {
    /// Lowest zoom factor the viewport accepts.
    pub min_scale: f64,
    /// Highest zoom factor the viewport accepts.
    pub max_scale: f64,
    /// Width and height of the raster surface at session start.
    pub initial_surface_size: u32,
    /// Distance in bitmap pixels a drawn point must keep from every edge.
    pub growth_margin: f64,
    /// Upper bound on either surface dimension; growth beyond it disables drawing.
    pub max_surface_dimension: u32,
    /// Upper bound on the RGBA buffer of the surface; growth beyond it disables drawing.
    pub max_surface_bytes: u64,
    /// Depth of the undo and redo stacks.
    pub max_history: usize,
    /// World-space spacing of background grid lines.
    pub grid_size: f64,
    /// Zoom step applied per wheel notch.
    pub wheel_zoom_factor: f64,
    /// Zoom step applied by the zoom in/out buttons.
    pub button_zoom_factor: f64,
    /// Stroke width in screen pixels for a fresh canvas.
    pub default_stroke_width: f64,
    /// Stroke colour for a fresh canvas, as `#rrggbb`.
    pub default_color: String,
    /// Dash and gap length, in screen pixels, of the shape preview outline.
    pub dash_length: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.2,
            max_scale: 4.0,
            initial_surface_size: 4096,
            growth_margin: 64.0,
            max_surface_dimension: 65536,
            max_surface_bytes: 1 << 30,
            max_history: 30,
            grid_size: 48.0,
            wheel_zoom_factor: 1.12,
            button_zoom_factor: 1.15,
            default_stroke_width: 4.0,
            default_color: "#e6bd3b".to_string(),
            dash_length: 8.0,
        }
    }
}

impl CanvasConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the config to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that the values are mutually consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_scale > 0.0) {
            return Err(ConfigError::Invalid("minScale must be positive".into()));
        }
        if self.min_scale > self.max_scale {
            return Err(ConfigError::Invalid("minScale must not exceed maxScale".into()));
        }
        if !(self.growth_margin >= 0.0) {
            return Err(ConfigError::Invalid("growthMargin must not be negative".into()));
        }
        if f64::from(self.initial_surface_size) <= self.growth_margin * 2.0 {
            return Err(ConfigError::Invalid(format!(
                "initialSurfaceSize {} leaves no room inside a {} px margin",
                self.initial_surface_size, self.growth_margin
            )));
        }
        if self.max_surface_dimension < self.initial_surface_size {
            return Err(ConfigError::Invalid(
                "maxSurfaceDimension must be at least initialSurfaceSize".into(),
            ));
        }
        let initial_bytes = u64::from(self.initial_surface_size).pow(2) * 4;
        if self.max_surface_bytes < initial_bytes {
            return Err(ConfigError::Invalid(format!(
                "maxSurfaceBytes {} cannot hold the {} byte initial surface",
                self.max_surface_bytes, initial_bytes
            )));
        }
        if self.max_history == 0 {
            return Err(ConfigError::Invalid("maxHistory must be at least 1".into()));
        }
        if !(self.grid_size > 0.0) {
            return Err(ConfigError::Invalid("gridSize must be positive".into()));
        }
        if !(self.wheel_zoom_factor > 0.0) || !(self.button_zoom_factor > 0.0) {
            return Err(ConfigError::Invalid("zoom factors must be positive".into()));
        }
        if self.default_color.parse::<crate::style::Rgb>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "defaultColor {:?} is not a #rrggbb colour",
                self.default_color
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(CanvasConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = CanvasConfig::from_json(r#"{"minScale": 0.5, "initialSurfaceSize": 512}"#).unwrap();
        assert!((config.min_scale - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.initial_surface_size, 512);
        assert!((config.max_scale - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.max_history, 30);
    }

    #[test]
    fn test_rejects_inverted_scale_range() {
        let result = CanvasConfig::from_json(r#"{"minScale": 5.0, "maxScale": 2.0}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_surface_smaller_than_margin() {
        let result = CanvasConfig::from_json(r#"{"initialSurfaceSize": 100, "growthMargin": 64}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_byte_budget_below_initial_surface() {
        let result = CanvasConfig::from_json(r#"{"initialSurfaceSize": 1024, "maxSurfaceBytes": 1048576}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        let exact = CanvasConfig::from_json(r#"{"initialSurfaceSize": 1024, "maxSurfaceBytes": 4194304}"#);
        assert!(exact.is_ok());
    }

    #[test]
    fn test_rejects_bad_colour() {
        let result = CanvasConfig::from_json(r#"{"defaultColor": "gold"}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(CanvasConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = CanvasConfig { max_history: 12, ..CanvasConfig::default() };
        let json = config.to_json().unwrap();
        assert!(json.contains("maxHistory"));
        assert_eq!(CanvasConfig::from_json(&json).unwrap(), config);
    }
}
