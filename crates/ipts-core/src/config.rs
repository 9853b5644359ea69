//! Runtime configuration for the processing pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::contacts::ContactsConfig;
use crate::device::DeviceInfo;
use crate::dft::DftConfig;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised while validating a configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// The physical screen size is zero or negative.
    InvalidScreenSize {
        /// Configured width in tenths of a millimeter.
        width: f64,
        /// Configured height in tenths of a millimeter.
        height: f64,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidScreenSize { width, height } => {
                write!(f, "invalid screen size: {}x{}", width, height)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ── Config ─────────────────────────────────────────────────────────────────

/// Top-level pipeline configuration.
///
/// Loaded by a platform-specific loader and passed to the application at
/// construction. `width` and `height` have no usable default and must be
/// provided; everything else falls back to tuned defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Physical screen width in tenths of a millimeter. Must be positive.
    pub width: f64,
    /// Physical screen height in tenths of a millimeter. Must be positive.
    pub height: f64,
    /// Mirror stylus X coordinates.
    #[serde(default)]
    pub invert_x: bool,
    /// Mirror stylus Y coordinates.
    #[serde(default)]
    pub invert_y: bool,
    /// Full opening angle of the touch rejection cone, in radians.
    #[serde(default = "default_cone_angle")]
    pub cone_angle: f64,
    /// Reach of the touch rejection cone, in physical units.
    #[serde(default = "default_cone_distance")]
    pub cone_distance: f64,
    /// Exponential smoothing coefficient for cone direction updates.
    #[serde(default = "default_cone_smoothing")]
    pub cone_smoothing: f64,
    /// How long after the last stylus report the cone keeps rejecting.
    #[serde(default = "default_stylus_active_timeout")]
    pub stylus_active_timeout: Duration,
    /// Run the cone-based palm check on detected contacts.
    #[serde(default = "default_true")]
    pub touch_check_cone: bool,
    /// Contact finder tuning.
    #[serde(default)]
    pub contacts: ContactsConfig,
    /// DFT stylus estimator tuning.
    #[serde(default)]
    pub dft: DftConfig,
    /// Device identity used by sink adapters to create event devices.
    #[serde(default)]
    pub info: DeviceInfo,
}

fn default_cone_angle() -> f64 {
    std::f64::consts::FRAC_PI_2
}

fn default_cone_distance() -> f64 {
    800.0
}

fn default_cone_smoothing() -> f64 {
    0.3
}

fn default_stylus_active_timeout() -> Duration {
    Duration::from_millis(300)
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Build a configuration with default tuning for a screen of the given
    /// physical size (tenths of a millimeter).
    pub fn new(width: f64, height: f64) -> Result<Self, ConfigError> {
        let config = Self {
            width,
            height,
            invert_x: false,
            invert_y: false,
            cone_angle: default_cone_angle(),
            cone_distance: default_cone_distance(),
            cone_smoothing: default_cone_smoothing(),
            stylus_active_timeout: default_stylus_active_timeout(),
            touch_check_cone: true,
            contacts: ContactsConfig::default(),
            dft: DftConfig::default(),
            info: DeviceInfo::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check construction invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(ConfigError::InvalidScreenSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Length of the screen diagonal in physical units.
    pub fn diagonal(&self) -> f64 {
        self.width.hypot(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_screen_size_fails_validation() {
        assert!(Config::new(0.0, 1735.0).is_err());
        assert!(Config::new(2600.0, 0.0).is_err());
        assert!(Config::new(-2600.0, 1735.0).is_err());
        assert!(Config::new(2600.0, 1735.0).is_ok());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = Config::new(2600.0, 1735.0).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.width, config.width);
        assert_eq!(back.cone_angle, config.cone_angle);
        assert_eq!(back.contacts.stability_frames, config.contacts.stability_frames);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"width": 2600.0, "height": 1735.0}"#).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.touch_check_cone);
        assert_eq!(config.contacts.stability_frames, 4);
    }
}
