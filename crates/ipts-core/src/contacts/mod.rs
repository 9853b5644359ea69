//! Heatmap contact detection.
//!
//! The finder turns a normalized heatmap into a set of tracked contacts:
//! blob detection via Gaussian moment fitting, inter-frame tracking with
//! stable indices, a stability gate, and a palm pre-classification that the
//! rejection cone refines later.

mod config;
mod detect;
mod track;

pub use config::ContactsConfig;

use nalgebra::DMatrix;

use detect::Fit;
use track::Tracker;

/// A detected finger or palm blob.
///
/// Positions are normalized `[0, 1]` grid coordinates; sizes are normalized
/// by the grid diagonal.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Contact {
    /// Center X.
    pub x: f64,
    /// Center Y.
    pub y: f64,
    /// Major principal semi-axis.
    pub major: f64,
    /// Minor principal semi-axis.
    pub minor: f64,
    /// Major-axis direction from +x, in `[0, π)` radians.
    pub orientation: f64,
    /// Tracking index, stable across frames.
    pub index: u32,
    /// The contact has persisted with low motion for the configured window.
    pub stable: bool,
    /// `None` until palm classification has run; then `Some(true)` for a
    /// finger and `Some(false)` for a palm.
    pub valid: Option<bool>,
    /// Frames since the contact appeared.
    pub age: u32,
}

/// Blob detection, tracking and stability gating over normalized heatmaps.
#[derive(Debug, Clone)]
pub struct Finder {
    config: ContactsConfig,
    fits: Vec<Fit>,
    tracker: Tracker,
}

impl Finder {
    pub fn new(config: ContactsConfig) -> Self {
        Self {
            config,
            fits: Vec::new(),
            tracker: Tracker::new(),
        }
    }

    /// Populate `contacts` with every blob detected in the current frame.
    ///
    /// Never fails: degenerate input produces an empty contact set. Output
    /// is ordered by tracking index ascending, indices unique per frame.
    pub fn find(&mut self, heatmap: &DMatrix<f64>, contacts: &mut Vec<Contact>) {
        let (rows, cols) = heatmap.shape();
        if rows == 0 || cols == 0 {
            contacts.clear();
            return;
        }

        detect::detect(heatmap, &self.config, &mut self.fits);

        // Cell coordinates to normalized grid coordinates.
        let diagonal = (rows as f64).hypot(cols as f64);
        for fit in &mut self.fits {
            fit.x /= cols as f64;
            fit.y /= rows as f64;
            fit.major /= diagonal;
            fit.minor /= diagonal;
        }

        self.tracker.update(&self.fits, &self.config, contacts);
    }

    /// Forget all tracked state, e.g. after the device reconnects.
    pub fn reset(&mut self) {
        self.tracker.reset();
    }
}
