//! Device identity and vendor metadata.

use serde::{Deserialize, Serialize};

/// Identity of the digitizer that produced the incoming data.
///
/// Queried from the device by the runner and passed in at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// USB vendor ID.
    pub vendor: u16,
    /// USB product ID.
    pub product: u16,
    /// Firmware version.
    pub version: u32,
    /// Upper bound on simultaneous touch contacts.
    pub max_contacts: u8,
}

/// 2×3 affine transform from logical grid indices to physical coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub xx: f32,
    pub yx: f32,
    pub tx: f32,
    pub xy: f32,
    pub yy: f32,
    pub ty: f32,
}

impl Transform {
    /// Map a logical grid position to physical coordinates.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let px = f64::from(self.xx) * x + f64::from(self.yx) * y + f64::from(self.tx);
        let py = f64::from(self.xy) * x + f64::from(self.yy) * y + f64::from(self.ty);
        (px, py)
    }
}

/// Per-device metadata block. Not present on all devices.
///
/// Immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Number of rows in the logical sensor grid.
    pub rows: u32,
    /// Number of columns in the logical sensor grid.
    pub columns: u32,
    /// Physical sensor width in micrometers.
    pub width_um: u32,
    /// Physical sensor height in micrometers.
    pub height_um: u32,
    /// Grid-to-physical affine transform.
    pub transform: Transform,
    /// Opaque vendor byte.
    pub unknown_byte: u8,
    /// Opaque vendor blob.
    pub unknown: [u8; 16],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_applies_affine_map() {
        let t = Transform {
            xx: 2.0,
            yx: 0.0,
            tx: 10.0,
            xy: 0.0,
            yy: 3.0,
            ty: -5.0,
        };
        let (px, py) = t.apply(4.0, 2.0);
        assert!((px - 18.0).abs() < 1e-12);
        assert!((py - 1.0).abs() < 1e-12);
    }
}
