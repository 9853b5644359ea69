//! DFT-based stylus position estimation.
//!
//! Newer devices do not send processed stylus coordinates. They send raw
//! antenna DFT windows, and the position has to be interpolated manually:
//! the strongest bin of each antenna group gives a coarse grid position,
//! parabolic interpolation over its neighbors the sub-antenna offset.
//! The estimator keeps the last pose between windows so weak frames never
//! fabricate motion.

use serde::{Deserialize, Serialize};

use crate::device::Metadata;
use crate::report::{DftGroup, DftWindow, StylusData, IPTS_MAX_PRESSURE, IPTS_MAX_X, IPTS_MAX_Y};

/// Tuning for the DFT stylus estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DftConfig {
    /// Minimum peak bin amplitude for a window to count as signal.
    pub noise_floor: f64,
    /// Minimum absolute parabolic denominator; below this the window is
    /// treated as signal-free.
    pub interp_epsilon: f64,
    /// Scale from summed squared bin magnitudes to pressure units.
    pub pressure_scale: f64,
    /// Divisor of the tip/base magnitude asymmetry before the arctangent
    /// tilt map; smaller values make tilt react more strongly.
    pub tilt_scale: f64,
}

impl Default for DftConfig {
    fn default() -> Self {
        Self {
            noise_floor: 64.0,
            interp_epsilon: 1e-3,
            pressure_scale: 0.01,
            tilt_scale: 0.5,
        }
    }
}

/// Interpolated position along one axis, in grid units.
#[derive(Debug, Clone, Copy)]
struct AxisEstimate {
    /// Antenna-grid position (`first + peak + δ`).
    position: f64,
    /// Squared-magnitude sum of the three bins around the peak.
    power: f64,
}

/// Stylus state estimator fed by DFT windows.
///
/// Holds the last known pose between calls; [`DftStylus::reset`] clears it
/// when the device disconnects.
#[derive(Debug, Clone)]
pub struct DftStylus {
    config: DftConfig,
    metadata: Option<Metadata>,
    stylus: StylusData,
}

impl DftStylus {
    pub fn new(config: DftConfig, metadata: Option<Metadata>) -> Self {
        Self {
            config,
            metadata,
            stylus: StylusData::default(),
        }
    }

    /// The current stylus pose.
    pub fn get_stylus(&self) -> StylusData {
        self.stylus
    }

    /// Forget the retained pose, e.g. after the device reconnects.
    pub fn reset(&mut self) {
        self.stylus = StylusData::default();
    }

    /// Consume one DFT window and update the stylus state.
    ///
    /// A window without sufficient signal on both axes leaves the pose
    /// unchanged and only clears the in-range flag.
    pub fn input(&mut self, window: &DftWindow) {
        let x = self.estimate_axis(&window.columns);
        let y = self.estimate_axis(&window.rows);

        let (Some(x), Some(y)) = (x, y) else {
            self.stylus.proximity = false;
            return;
        };

        let (dev_x, dev_y) = self.to_device_units(x.position, y.position, window);
        self.stylus.x = dev_x;
        self.stylus.y = dev_y;

        let pressure = (x.power + y.power) * self.config.pressure_scale;
        self.stylus.pressure = pressure.clamp(0.0, f64::from(IPTS_MAX_PRESSURE)) as u16;

        self.stylus.tilt_x = self.estimate_tilt(&window.columns);
        self.stylus.tilt_y = self.estimate_tilt(&window.rows);

        self.stylus.proximity = true;
        self.stylus.contact = self.stylus.pressure > 0;
    }

    /// Interpolate the position along one axis from its antenna groups.
    ///
    /// Uses the group with the strongest peak. Returns `None` when there is
    /// no group, the peak is below the noise floor, or the parabolic
    /// denominator is degenerate.
    fn estimate_axis(&self, groups: &[DftGroup]) -> Option<AxisEstimate> {
        let group = groups
            .iter()
            .max_by(|a, b| a.power(a.peak()).partial_cmp(&b.power(b.peak())).unwrap())?;

        let peak = group.peak();
        let amplitude = group.power(peak).sqrt();
        if amplitude < self.config.noise_floor {
            return None;
        }

        let delta = self.parabolic_offset(group, peak)?;
        let position = f64::from(group.first) + peak as f64 + delta;

        // Power over the three bins used for interpolation; edge peaks only
        // have the bins that exist.
        let mut power = group.power(peak);
        if peak > 0 {
            power += group.power(peak - 1);
        }
        if peak + 1 < crate::report::DFT_BINS {
            power += group.power(peak + 1);
        }

        Some(AxisEstimate { position, power })
    }

    /// Sub-bin peak offset via parabolic interpolation over the peak and
    /// its two neighbors, clamped to `[-1, 1]`.
    fn parabolic_offset(&self, group: &DftGroup, peak: usize) -> Option<f64> {
        // A peak on the group boundary has no neighbor pair to fit.
        if peak == 0 || peak + 1 >= crate::report::DFT_BINS {
            return Some(0.0);
        }

        let left = group.power(peak - 1).sqrt();
        let center = group.power(peak).sqrt();
        let right = group.power(peak + 1).sqrt();

        let denominator = left - 2.0 * center + right;
        if denominator.abs() < self.config.interp_epsilon {
            return None;
        }

        Some((0.5 * (left - right) / denominator).clamp(-1.0, 1.0))
    }

    /// Tilt along one axis from the magnitude asymmetry of the paired tip
    /// and base antenna groups, in hundredths of a degree.
    fn estimate_tilt(&self, groups: &[DftGroup]) -> i16 {
        let [tip, base, ..] = groups else {
            return 0;
        };

        let tip_mag = tip.power(tip.peak()).sqrt();
        let base_mag = base.power(base.peak()).sqrt();
        if tip_mag + base_mag <= 0.0 {
            return 0;
        }

        let asymmetry = (tip_mag - base_mag) / (tip_mag + base_mag);
        let degrees = (asymmetry / self.config.tilt_scale).atan().to_degrees();
        (degrees * 100.0).clamp(-9000.0, 9000.0) as i16
    }

    /// Map grid-unit positions to device units, through the metadata
    /// transform when present or a linear grid map otherwise.
    fn to_device_units(&self, grid_x: f64, grid_y: f64, window: &DftWindow) -> (u16, u16) {
        match &self.metadata {
            Some(meta) => {
                let (px, py) = meta.transform.apply(grid_x, grid_y);
                let x = px / f64::from(meta.width_um) * f64::from(IPTS_MAX_X);
                let y = py / f64::from(meta.height_um) * f64::from(IPTS_MAX_Y);
                (
                    x.round().clamp(0.0, f64::from(IPTS_MAX_X)) as u16,
                    y.round().clamp(0.0, f64::from(IPTS_MAX_Y)) as u16,
                )
            }
            None => {
                let cols = f64::from(window.width.max(2) - 1);
                let rows = f64::from(window.height.max(2) - 1);
                let x = grid_x / cols * f64::from(IPTS_MAX_X);
                let y = grid_y / rows * f64::from(IPTS_MAX_Y);
                (
                    x.round().clamp(0.0, f64::from(IPTS_MAX_X)) as u16,
                    y.round().clamp(0.0, f64::from(IPTS_MAX_Y)) as u16,
                )
            }
        }
    }
}
