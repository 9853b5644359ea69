//! Shared test helpers: wire-buffer construction and synthetic heatmaps.
//!
//! Consolidated here so parser, finder and application tests build their
//! inputs the same way instead of each carrying its own encoder.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::application::Clock;
use crate::report::{
    DftGroup, StylusData, DFT_BINS, FRAME_MAGIC, REPORT_DFT, REPORT_HEATMAP, REPORT_STYLUS,
    STYLUS_MODE_BUTTON, STYLUS_MODE_CONTACT, STYLUS_MODE_PROXIMITY, STYLUS_MODE_RUBBER,
};

/// Builder for self-framed raw report buffers.
pub(crate) struct FrameBuilder {
    records: Vec<u8>,
}

impl FrameBuilder {
    pub(crate) fn new() -> Self {
        Self { records: Vec::new() }
    }

    /// Append a record with an arbitrary type tag and payload.
    pub(crate) fn record(mut self, ty: u16, payload: &[u8]) -> Self {
        self.records.extend_from_slice(&ty.to_le_bytes());
        self.records.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        self.records.extend_from_slice(payload);
        self
    }

    /// Append a heatmap record with the given dimensions and cells.
    pub(crate) fn heatmap(self, height: u8, width: u8, z_min: u8, z_max: u8, cells: &[u8]) -> Self {
        assert_eq!(cells.len(), usize::from(height) * usize::from(width));
        let mut payload = vec![height, width, z_min, z_max];
        payload.extend_from_slice(cells);
        self.record(REPORT_HEATMAP, &payload)
    }

    /// Append a heatmap record whose declared cell count exceeds the
    /// actually-present `cells` bytes.
    pub(crate) fn truncated_heatmap(self, height: u8, width: u8, cells: usize) -> Self {
        assert!(cells < usize::from(height) * usize::from(width));
        let mut payload = vec![height, width, 0, 255];
        payload.extend_from_slice(&vec![0xFF; cells]);
        self.record(REPORT_HEATMAP, &payload)
    }

    /// Append a legacy stylus record.
    pub(crate) fn stylus(self, stylus: StylusData) -> Self {
        let mut mode = 0_u16;
        if stylus.proximity {
            mode |= STYLUS_MODE_PROXIMITY;
        }
        if stylus.contact {
            mode |= STYLUS_MODE_CONTACT;
        }
        if stylus.button {
            mode |= STYLUS_MODE_BUTTON;
        }
        if stylus.rubber {
            mode |= STYLUS_MODE_RUBBER;
        }

        let mut payload = Vec::with_capacity(16);
        payload.extend_from_slice(&mode.to_le_bytes());
        payload.extend_from_slice(&stylus.x.to_le_bytes());
        payload.extend_from_slice(&stylus.y.to_le_bytes());
        payload.extend_from_slice(&stylus.pressure.to_le_bytes());
        payload.extend_from_slice(&stylus.tilt_x.to_le_bytes());
        payload.extend_from_slice(&stylus.tilt_y.to_le_bytes());
        payload.extend_from_slice(&stylus.serial.to_le_bytes());
        self.record(REPORT_STYLUS, &payload)
    }

    /// Append a DFT window built from `(axis, mid)` pairs with a synthetic
    /// peak on the middle bin of each group.
    pub(crate) fn dft(self, width: u8, height: u8, groups: &[(u8, u8)]) -> Self {
        let num_groups = groups.len();
        let mut payload = vec![num_groups as u8, width, height, 0];

        for &(axis, mid) in groups {
            let group = synthetic_group(mid, 400);
            payload.push(axis);
            payload.push(group.first);
            payload.push(group.last);
            payload.push(group.mid);
            payload.extend_from_slice(&group.frequency.to_le_bytes());
            payload.extend_from_slice(&group.magnitude.to_le_bytes());
            for i in 0..DFT_BINS {
                payload.extend_from_slice(&group.real[i].to_le_bytes());
                payload.extend_from_slice(&group.imag[i].to_le_bytes());
            }
        }

        self.record(REPORT_DFT, &payload)
    }

    /// Finish the frame: magic, payload size, records.
    pub(crate) fn build(self) -> Vec<u8> {
        let mut data = Vec::with_capacity(8 + self.records.len());
        data.extend_from_slice(&FRAME_MAGIC.to_le_bytes());
        data.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        data.extend_from_slice(&self.records);
        data
    }
}

/// Build a DFT group with a single-bin peak of the given amplitude on the
/// center bin, covering antennas `[mid - 4, mid + 4]`.
pub(crate) fn synthetic_group(mid: u8, amplitude: i16) -> DftGroup {
    let first = mid.saturating_sub(4);
    let mut group = DftGroup {
        first,
        last: first + (DFT_BINS as u8 - 1),
        mid,
        frequency: 0,
        magnitude: 0,
        real: [0; DFT_BINS],
        imag: [0; DFT_BINS],
    };
    group.real[usize::from(mid - first)] = amplitude;
    group
}

/// Render a raw heatmap with a Gaussian dip (device convention: background
/// `0xFF` means no contact, lower values mean stronger contact).
pub(crate) fn gaussian_bump(
    height: usize,
    width: usize,
    cx: f64,
    cy: f64,
    sigma: f64,
    peak: u8,
) -> Vec<u8> {
    let mut cells = Vec::with_capacity(height * width);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f64 - cx;
            let dy = row as f64 - cy;
            let g = (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
            cells.push((255.0 - (255.0 - f64::from(peak)) * g).round() as u8);
        }
    }
    cells
}

/// A clock whose current instant is set by the test.
#[derive(Clone)]
pub(crate) struct ManualClock(Rc<Cell<Instant>>);

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self(Rc::new(Cell::new(Instant::now())))
    }

    pub(crate) fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.0.get()
    }
}
