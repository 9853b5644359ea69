//! Contact finder tuning.

use serde::{Deserialize, Serialize};

/// Configuration for blob detection, tracking and stability gating.
///
/// Positions are in normalized `[0, 1]` grid coordinates; sizes are
/// normalized by the grid diagonal, so one value covers both axes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactsConfig {
    /// Minimum normalized intensity for a cell to seed a blob.
    pub activation_threshold: f64,
    /// Radius (cells) of the neighborhood a seed must dominate.
    pub neighborhood_radius: usize,
    /// Radius (cells) of the window used for the Gaussian moment fit.
    pub fit_radius: usize,
    /// Minimum normalized major semi-axis; smaller fits are noise.
    pub min_size: f64,
    /// Maximum normalized major semi-axis; larger fits are palms.
    pub max_size: f64,
    /// Maximum major/minor ratio; more elongated fits are palms.
    pub max_aspect: f64,
    /// Maximum normalized center distance for a track match.
    pub match_distance: f64,
    /// Weight of the size difference in the matching cost.
    pub shape_weight: f64,
    /// Frames an unmatched track keeps its index reserved before expiring.
    pub tracking_grace: u32,
    /// Consecutive low-motion frames required before a contact is stable.
    pub stability_frames: u32,
    /// Maximum normalized center drift per frame for stability.
    pub stability_distance: f64,
    /// Maximum normalized size change per frame for stability.
    pub stability_size_delta: f64,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            activation_threshold: 0.24,
            neighborhood_radius: 1,
            fit_radius: 3,
            min_size: 0.02,
            max_size: 0.45,
            max_aspect: 2.5,
            match_distance: 0.15,
            shape_weight: 0.5,
            tracking_grace: 2,
            stability_frames: 4,
            stability_distance: 0.03,
            stability_size_delta: 0.05,
        }
    }
}
