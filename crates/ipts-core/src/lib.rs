//! ipts-core — signal processing for IPTS touchscreen/pen digitizers.
//!
//! Turns raw device reports into validated finger contacts and interpolated
//! stylus poses. The pipeline stages are:
//!
//! 1. **Parser** – demultiplex a raw buffer into heatmap, stylus and DFT
//!    frames.
//! 2. **Normalizer** – map raw 8-bit heatmap cells into `[0, 1]`, inverted.
//! 3. **Contacts** – blob detection via Gaussian moment fitting, inter-frame
//!    tracking, stability gating, palm pre-classification.
//! 4. **DFT** – interpolate stylus position, pressure and tilt from antenna
//!    frequency bins.
//! 5. **Cone** – stylus-rooted spatial predicate that reclassifies touches
//!    near the pen hand as palms.
//!
//! The [`Application`] orchestrator owns all of it and feeds an
//! [`EventSink`], the seam where a platform adapter turns the typed events
//! into OS input. Reading the device, loading configuration files and
//! creating event devices are the runner's job, not this crate's.

mod application;
mod cone;
mod config;
mod contacts;
mod device;
mod dft;
mod heatmap;
mod parser;
mod report;

#[cfg(test)]
pub(crate) mod test_utils;

pub use application::{Application, Clock, EventSink, MonotonicClock};
pub use cone::Cone;
pub use config::{Config, ConfigError};
pub use contacts::{Contact, ContactsConfig, Finder};
pub use device::{DeviceInfo, Metadata, Transform};
pub use dft::{DftConfig, DftStylus};
pub use heatmap::Normalizer;
pub use parser::{Frame, ParseError, Parser};
pub use report::{
    res, DftGroup, DftWindow, Heatmap, StylusData, DFT_BINS, IPTS_DIAGONAL, IPTS_MAX_PRESSURE,
    IPTS_MAX_X, IPTS_MAX_Y,
};
