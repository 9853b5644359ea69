//! Wire-level report layouts and device constants.
//!
//! An IPTS device delivers self-framed buffers: a frame header with a magic
//! tag and payload size, followed by a sequence of records. Each record is
//! prefixed by a type tag and a length, so unknown record types can be
//! skipped without understanding their contents.

/// Magic tag at the start of every raw frame (`IPTS` in little-endian order).
pub const FRAME_MAGIC: u32 = 0x5354_5049;

/// Record type for capacitive heatmap data.
pub const REPORT_HEATMAP: u16 = 0x0403;

/// Record type for legacy stylus reports with pressure and tilt.
pub const REPORT_STYLUS: u16 = 0x0460;

/// Record type for DFT antenna windows.
pub const REPORT_DFT: u16 = 0x045C;

/// Maximum X coordinate in device units.
pub const IPTS_MAX_X: u16 = 9600;

/// Maximum Y coordinate in device units.
pub const IPTS_MAX_Y: u16 = 7200;

/// Device-unit range of the touchscreen diagonal.
pub const IPTS_DIAGONAL: u16 = 12000;

/// Maximum stylus pressure value.
pub const IPTS_MAX_PRESSURE: u16 = 4096;

/// Number of complex bins in one DFT antenna group.
pub const DFT_BINS: usize = 9;

/// Upper bound on antenna groups in a single DFT window.
pub const DFT_MAX_GROUPS: usize = 16;

/// Axis tag for row (Y) antenna groups.
pub const DFT_AXIS_ROW: u8 = 0;

/// Axis tag for column (X) antenna groups.
pub const DFT_AXIS_COLUMN: u8 = 1;

/// Stylus button bit: the tip is in sensing range.
pub const STYLUS_MODE_PROXIMITY: u16 = 1 << 0;

/// Stylus button bit: the tip is touching the screen.
pub const STYLUS_MODE_CONTACT: u16 = 1 << 1;

/// Stylus button bit: the barrel button is pressed.
pub const STYLUS_MODE_BUTTON: u16 = 1 << 2;

/// Stylus button bit: the eraser end is in use.
pub const STYLUS_MODE_RUBBER: u16 = 1 << 3;

/// Axis resolution for an event device: units per millimeter, where the
/// physical extent is given in tenths of a millimeter.
pub fn res(virt: i32, phys: i32) -> i32 {
    let res = f64::from(virt * 10) / f64::from(phys);
    res.round() as i32
}

/// A raw capacitive heatmap, borrowed from the input buffer.
///
/// Cells are row-major, one byte each. Intensities follow the inverted
/// device convention: `z_max` means no contact, `z_min` strongest contact.
#[derive(Debug, Clone, Copy)]
pub struct Heatmap<'a> {
    /// Number of rows in the sensor grid.
    pub height: u8,
    /// Number of columns in the sensor grid.
    pub width: u8,
    /// Lowest raw intensity the device will report.
    pub z_min: u8,
    /// Highest raw intensity the device will report.
    pub z_max: u8,
    /// Row-major cell data of length `height * width`.
    pub data: &'a [u8],
}

/// Decoded stylus state in device units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StylusData {
    /// The stylus is within sensing range of the screen.
    pub proximity: bool,
    /// The tip is touching the screen.
    pub contact: bool,
    /// The barrel button is pressed.
    pub button: bool,
    /// The eraser end is in use.
    pub rubber: bool,
    /// X position in `[0, IPTS_MAX_X]`.
    pub x: u16,
    /// Y position in `[0, IPTS_MAX_Y]`.
    pub y: u16,
    /// Contact pressure in `[0, IPTS_MAX_PRESSURE]`.
    pub pressure: u16,
    /// Tilt around the X axis in hundredths of a degree.
    pub tilt_x: i16,
    /// Tilt around the Y axis in hundredths of a degree.
    pub tilt_y: i16,
    /// Identifier of the current pen stroke/session.
    pub serial: u32,
}

impl StylusData {
    /// Decode the wire button bitfield into the boolean fields.
    pub(crate) fn set_mode(&mut self, mode: u16) {
        self.proximity = mode & STYLUS_MODE_PROXIMITY != 0;
        self.contact = mode & STYLUS_MODE_CONTACT != 0;
        self.button = mode & STYLUS_MODE_BUTTON != 0;
        self.rubber = mode & STYLUS_MODE_RUBBER != 0;
    }
}

/// One antenna group of a DFT window: `DFT_BINS` complex measurements
/// around the strongest antenna, plus frequency and magnitude metadata.
#[derive(Debug, Clone, Copy)]
pub struct DftGroup {
    /// Grid index of the first antenna covered by the bins.
    pub first: u8,
    /// Grid index of the last antenna covered by the bins.
    pub last: u8,
    /// Grid index of the antenna the device considered strongest.
    pub mid: u8,
    /// Carrier frequency metadata reported by the device.
    pub frequency: u32,
    /// Aggregate magnitude metadata reported by the device.
    pub magnitude: u32,
    /// Real parts of the complex bins.
    pub real: [i16; DFT_BINS],
    /// Imaginary parts of the complex bins.
    pub imag: [i16; DFT_BINS],
}

impl DftGroup {
    /// Squared magnitude of bin `i`.
    pub fn power(&self, i: usize) -> f64 {
        let re = f64::from(self.real[i]);
        let im = f64::from(self.imag[i]);
        re * re + im * im
    }

    /// Index of the bin with the largest squared magnitude.
    pub fn peak(&self) -> usize {
        let mut best = 0;
        let mut best_power = self.power(0);
        for i in 1..DFT_BINS {
            let p = self.power(i);
            if p > best_power {
                best = i;
                best_power = p;
            }
        }
        best
    }
}

/// A per-frame collection of antenna measurements.
///
/// Row groups measure along the Y axis, column groups along X. The antenna
/// counts describe the sensor grid the group indices refer to.
#[derive(Debug, Clone, Default)]
pub struct DftWindow {
    /// Number of column antennas (X axis).
    pub width: u8,
    /// Number of row antennas (Y axis).
    pub height: u8,
    /// Row (Y) antenna groups, in wire order.
    pub rows: Vec<DftGroup>,
    /// Column (X) antenna groups, in wire order.
    pub columns: Vec<DftGroup>,
}
