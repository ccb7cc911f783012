//! Signer configuration.
//!
//! Configuration can be created programmatically, read from environment
//! variables, or loaded from a versioned JSON file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default minimum annotation side in points
pub const DEFAULT_MIN_ANNOTATION_SIZE: f32 = 10.0;

const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Tunables shared by placement, rendering and stamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Pages kept rendered on each side of the current page
    pub window_radius: u32,
    /// Minimum annotation width/height in points
    pub min_annotation_size: f32,
    /// Font size for text and date annotations, in points
    pub font_size: f32,
    /// `chrono` format string for the date tool
    pub date_format: String,
    /// Minimum hit box side in display pixels (44 on touch devices, 0 disables)
    pub min_touch_target: f32,
    /// Radius around a resize handle that grabs it, in display pixels
    pub handle_radius: f32,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            window_radius: 1,
            min_annotation_size: DEFAULT_MIN_ANNOTATION_SIZE,
            font_size: 12.0,
            date_format: "%m/%d/%Y".to_string(),
            min_touch_target: 0.0,
            handle_radius: 8.0,
        }
    }
}

impl SignerConfig {
    /// Touch-friendly defaults (44px hit targets)
    pub fn touch() -> Self {
        Self::default().with_min_touch_target(44.0)
    }

    pub fn with_window_radius(mut self, radius: u32) -> Self {
        self.window_radius = radius;
        self
    }

    pub fn with_min_annotation_size(mut self, points: f32) -> Self {
        self.min_annotation_size = points;
        self
    }

    pub fn with_font_size(mut self, points: f32) -> Self {
        self.font_size = points;
        self
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    pub fn with_min_touch_target(mut self, pixels: f32) -> Self {
        self.min_touch_target = pixels;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PDF_SIGNER_WINDOW_RADIUS`: pages rendered around the current page (default: 1)
    /// - `PDF_SIGNER_MIN_SIZE_PT`: minimum annotation side in points (default: 10)
    /// - `PDF_SIGNER_FONT_SIZE`: text font size in points (default: 12)
    /// - `PDF_SIGNER_DATE_FORMAT`: `chrono` date format (default: `%m/%d/%Y`)
    /// - `PDF_SIGNER_TOUCH_TARGET_PX`: minimum hit box in pixels (default: 0)
    ///
    /// # Errors
    /// Returns an error if any variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`SignerConfig::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("PDF_SIGNER_WINDOW_RADIUS") {
            config.window_radius = val
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PDF_SIGNER_WINDOW_RADIUS".to_string()))?;
        }
        if let Some(val) = lookup("PDF_SIGNER_MIN_SIZE_PT") {
            config.min_annotation_size = parse_positive(&val, "PDF_SIGNER_MIN_SIZE_PT")?;
        }
        if let Some(val) = lookup("PDF_SIGNER_FONT_SIZE") {
            config.font_size = parse_positive(&val, "PDF_SIGNER_FONT_SIZE")?;
        }
        if let Some(val) = lookup("PDF_SIGNER_DATE_FORMAT") {
            if val.trim().is_empty() {
                return Err(ConfigError::InvalidValue("PDF_SIGNER_DATE_FORMAT".to_string()));
            }
            config.date_format = val;
        }
        if let Some(val) = lookup("PDF_SIGNER_TOUCH_TARGET_PX") {
            let pixels: f32 = val
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PDF_SIGNER_TOUCH_TARGET_PX".to_string()))?;
            if !pixels.is_finite() || pixels < 0.0 {
                return Err(ConfigError::InvalidValue("PDF_SIGNER_TOUCH_TARGET_PX".to_string()));
            }
            config.min_touch_target = pixels;
        }

        Ok(config)
    }

    /// Loads configuration from a JSON file written by [`SignerConfig::save_to_file`].
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let bytes = fs::read(path.as_ref())?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > CONFIG_SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedVersion(envelope.version));
        }
        Ok(envelope.config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let envelope = ConfigEnvelope {
            version: CONFIG_SCHEMA_VERSION,
            config: self.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(path.as_ref(), bytes)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u32,
    config: SignerConfig,
}

fn parse_positive(val: &str, key: &str) -> Result<f32, ConfigError> {
    match val.trim().parse::<f32>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {0}")]
    InvalidValue(String),

    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
