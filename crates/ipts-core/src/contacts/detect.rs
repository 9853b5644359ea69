//! Blob detection: local-maximum seeding and Gaussian moment fitting.

use nalgebra::{DMatrix, Matrix2, Vector2};

use super::ContactsConfig;

/// One fitted blob, in cell coordinates.
#[derive(Debug, Clone, Copy)]
pub(super) struct Fit {
    /// Weighted mean column.
    pub x: f64,
    /// Weighted mean row.
    pub y: f64,
    /// Major principal semi-axis, in cells.
    pub major: f64,
    /// Minor principal semi-axis, in cells.
    pub minor: f64,
    /// Major-axis direction from +x, in `[0, π)`.
    pub orientation: f64,
    /// Pre-classified as a palm by the size/aspect bounds.
    pub palm: bool,
}

/// Detect all blobs in a normalized heatmap.
///
/// Seeds are cells above the activation threshold that strictly dominate
/// their neighborhood; plateau ties go to the lowest row-major index. Each
/// seed gets a windowed Gaussian moment fit. Degenerate fits are dropped;
/// fits violating the size or aspect bounds are kept but flagged as palms.
pub(super) fn detect(heatmap: &DMatrix<f64>, config: &ContactsConfig, fits: &mut Vec<Fit>) {
    fits.clear();

    let (rows, cols) = heatmap.shape();
    if rows == 0 || cols == 0 {
        return;
    }

    let diagonal = (rows as f64).hypot(cols as f64);

    for row in 0..rows {
        for col in 0..cols {
            if !is_seed(heatmap, row, col, config) {
                continue;
            }

            let Some(mut fit) = fit_window(heatmap, row, col, config.fit_radius) else {
                continue;
            };

            // Size bounds are expressed in grid-diagonal units.
            let major = fit.major / diagonal;
            let aspect = fit.major / fit.minor;

            if major < config.min_size {
                continue;
            }

            fit.palm = major > config.max_size || aspect > config.max_aspect;
            fits.push(fit);
        }
    }
}

/// A seed must exceed the activation threshold and strictly dominate its
/// neighborhood; equal-valued neighbors with a lower row-major index win.
fn is_seed(heatmap: &DMatrix<f64>, row: usize, col: usize, config: &ContactsConfig) -> bool {
    let value = heatmap[(row, col)];
    if value <= config.activation_threshold {
        return false;
    }

    let (rows, cols) = heatmap.shape();
    let r = config.neighborhood_radius as isize;
    let index = row * cols + col;

    for dy in -r..=r {
        for dx in -r..=r {
            if dy == 0 && dx == 0 {
                continue;
            }
            let ny = row as isize + dy;
            let nx = col as isize + dx;
            if ny < 0 || nx < 0 || ny >= rows as isize || nx >= cols as isize {
                continue;
            }
            let (ny, nx) = (ny as usize, nx as usize);
            let neighbor = heatmap[(ny, nx)];
            if neighbor > value || (neighbor == value && ny * cols + nx < index) {
                return false;
            }
        }
    }

    true
}

/// Weighted moment fit over a window centered on the seed.
///
/// Returns the weighted mean and the principal axes of the 2×2 intensity
/// covariance. `None` when the window carries no weight or an eigenvalue is
/// not positive.
fn fit_window(heatmap: &DMatrix<f64>, row: usize, col: usize, radius: usize) -> Option<Fit> {
    let (rows, cols) = heatmap.shape();

    let row_min = row.saturating_sub(radius);
    let row_max = (row + radius).min(rows - 1);
    let col_min = col.saturating_sub(radius);
    let col_max = (col + radius).min(cols - 1);

    let mut weight_sum = 0.0;
    let mut mean = Vector2::zeros();
    for r in row_min..=row_max {
        for c in col_min..=col_max {
            let w = heatmap[(r, c)];
            weight_sum += w;
            mean += w * Vector2::new(c as f64, r as f64);
        }
    }
    if weight_sum <= f64::EPSILON {
        return None;
    }
    mean /= weight_sum;

    let mut cov = Matrix2::zeros();
    for r in row_min..=row_max {
        for c in col_min..=col_max {
            let w = heatmap[(r, c)];
            let d = Vector2::new(c as f64, r as f64) - mean;
            cov += w * d * d.transpose();
        }
    }
    cov /= weight_sum;

    let eigen = cov.symmetric_eigen();
    let (major_idx, minor_idx) = if eigen.eigenvalues[0] >= eigen.eigenvalues[1] {
        (0, 1)
    } else {
        (1, 0)
    };

    let major_var = eigen.eigenvalues[major_idx];
    let minor_var = eigen.eigenvalues[minor_idx];
    if major_var <= 0.0 || minor_var <= 0.0 {
        return None;
    }

    // Two-sigma footprint of the fitted Gaussian.
    let major = 2.0 * major_var.sqrt();
    let minor = 2.0 * minor_var.sqrt();

    let axis = eigen.eigenvectors.column(major_idx);
    let mut orientation = axis[1].atan2(axis[0]);
    if orientation < 0.0 {
        orientation += std::f64::consts::PI;
    }

    Some(Fit {
        x: mean[0],
        y: mean[1],
        major,
        minor,
        orientation,
        palm: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heatmap::Normalizer;
    use crate::report::Heatmap;
    use crate::test_utils::gaussian_bump;

    fn normalized(height: u8, width: u8, cells: &[u8]) -> DMatrix<f64> {
        let mut normalizer = Normalizer::new();
        normalizer
            .normalize(&Heatmap {
                height,
                width,
                z_min: 0,
                z_max: 255,
                data: cells,
            })
            .clone()
    }

    #[test]
    fn empty_heatmap_yields_no_fits() {
        let cells = vec![0xFF_u8; 64];
        let map = normalized(8, 8, &cells);

        let mut fits = Vec::new();
        detect(&map, &ContactsConfig::default(), &mut fits);
        assert!(fits.is_empty());
    }

    #[test]
    fn single_bump_yields_one_centered_fit() {
        let cells = gaussian_bump(8, 8, 3.5, 3.5, 1.2, 0x20);
        let map = normalized(8, 8, &cells);

        let mut fits = Vec::new();
        detect(&map, &ContactsConfig::default(), &mut fits);

        assert_eq!(fits.len(), 1);
        let fit = &fits[0];
        assert!((fit.x - 3.5).abs() < 0.4, "x = {}", fit.x);
        assert!((fit.y - 3.5).abs() < 0.4, "y = {}", fit.y);
        assert!(!fit.palm);

        let aspect = fit.major / fit.minor;
        assert!(aspect < 1.3, "aspect = {}", aspect);
    }

    #[test]
    fn plateau_ties_produce_a_single_seed() {
        // A symmetric bump centered between cells makes a 2x2 plateau; the
        // row-major tie-break must keep exactly one seed.
        let cells = gaussian_bump(8, 8, 3.5, 3.5, 0.9, 0x10);
        let map = normalized(8, 8, &cells);

        let mut fits = Vec::new();
        detect(&map, &ContactsConfig::default(), &mut fits);
        assert_eq!(fits.len(), 1);
    }

    #[test]
    fn two_separated_bumps_yield_two_fits() {
        let mut cells = gaussian_bump(12, 20, 4.0, 4.0, 1.1, 0x20);
        let second = gaussian_bump(12, 20, 15.0, 7.0, 1.1, 0x20);
        for (cell, other) in cells.iter_mut().zip(second) {
            *cell = (*cell).min(other);
        }
        let map = normalized(12, 20, &cells);

        let mut fits = Vec::new();
        detect(&map, &ContactsConfig::default(), &mut fits);
        assert_eq!(fits.len(), 2);
    }

    #[test]
    fn oversized_blob_is_flagged_palm_but_kept() {
        let cells = gaussian_bump(16, 16, 8.0, 8.0, 4.5, 0x08);
        let map = normalized(16, 16, &cells);

        let mut config = ContactsConfig::default();
        config.max_size = 0.15;

        let mut fits = Vec::new();
        detect(&map, &config, &mut fits);

        assert_eq!(fits.len(), 1);
        assert!(fits[0].palm);
    }

    #[test]
    fn sub_threshold_bump_is_ignored() {
        // Peak intensity 0xF0 normalizes to ~0.06, below the threshold.
        let cells = gaussian_bump(8, 8, 3.5, 3.5, 1.2, 0xF0);
        let map = normalized(8, 8, &cells);

        let mut fits = Vec::new();
        detect(&map, &ContactsConfig::default(), &mut fits);
        assert!(fits.is_empty());
    }
}
