//! The application orchestrator.
//!
//! Owns the whole pipeline (parser, normalizer, contact finder, DFT stylus,
//! rejection cone) and routes every decoded frame through it. The processed
//! results are handed to an [`EventSink`], the seam where a platform
//! adapter injects events into the operating system.

use std::time::Instant;

use crate::cone::Cone;
use crate::config::{Config, ConfigError};
use crate::contacts::{Contact, Finder};
use crate::device::Metadata;
use crate::dft::DftStylus;
use crate::heatmap::Normalizer;
use crate::parser::{Frame, ParseError, Parser};
use crate::report::{DftWindow, Heatmap, StylusData, IPTS_MAX_X, IPTS_MAX_Y};

/// Source of monotonic time, injected so tests can drive it.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Consumer of processed input events.
///
/// All methods default to no-ops; a platform adapter overrides the ones it
/// needs. Slices and references passed in are valid only for the duration
/// of the call; copy anything that has to outlive it.
pub trait EventSink {
    /// The runner has started delivering buffers.
    fn on_start(&mut self) {}

    /// The runner has stopped.
    fn on_stop(&mut self) {}

    /// A heatmap frame finished processing; validated contacts in
    /// tracking-index order.
    fn on_contacts(&mut self, contacts: &[Contact]) {
        let _ = contacts;
    }

    /// A stylus sample, either from a legacy report or synthesized from a
    /// DFT window.
    fn on_stylus(&mut self, stylus: &StylusData) {
        let _ = stylus;
    }
}

/// Scale a stylus position from device units to physical coordinates.
fn stylus_to_physical(config: &Config, stylus: &StylusData) -> (f64, f64) {
    let mut x = f64::from(stylus.x);
    let mut y = f64::from(stylus.y);

    if config.invert_x {
        x = f64::from(IPTS_MAX_X) - x;
    }
    if config.invert_y {
        y = f64::from(IPTS_MAX_Y) - y;
    }

    (
        x / f64::from(IPTS_MAX_X) * config.width,
        y / f64::from(IPTS_MAX_Y) * config.height,
    )
}

/// Pipeline owner: processes raw buffers to completion, one at a time.
///
/// All state mutation happens inside the [`Application::process`] call
/// chain; no operation suspends or blocks on I/O.
pub struct Application<S: EventSink, C: Clock = MonotonicClock> {
    config: Config,
    metadata: Option<Metadata>,
    parser: Parser,
    normalizer: Normalizer,
    finder: Finder,
    dft: DftStylus,
    cone: Cone,
    contacts: Vec<Contact>,
    /// Serial of the stroke currently being delivered.
    current_serial: Option<u32>,
    /// Last stylus sample handed to the sink.
    last_stylus: StylusData,
    sink: S,
    clock: C,
}

impl<S: EventSink> Application<S> {
    /// Build an application with the production clock.
    pub fn new(
        config: Config,
        metadata: Option<Metadata>,
        sink: S,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(config, metadata, sink, MonotonicClock)
    }
}

impl<S: EventSink, C: Clock> Application<S, C> {
    /// Build an application with an injected clock.
    pub fn with_clock(
        config: Config,
        metadata: Option<Metadata>,
        sink: S,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let finder = Finder::new(config.contacts.clone());
        let dft = DftStylus::new(config.dft.clone(), metadata);
        let cone = Cone::new(
            config.cone_angle,
            config.cone_distance,
            config.cone_smoothing,
            config.stylus_active_timeout,
        );

        Ok(Self {
            config,
            metadata,
            parser: Parser::new(),
            normalizer: Normalizer::new(),
            finder,
            dft,
            cone,
            contacts: Vec::new(),
            current_serial: None,
            last_stylus: StylusData::default(),
            sink,
            clock,
        })
    }

    /// The configuration this application runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read access to the sink, e.g. to collect what it consumed.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Invoked by the runner once before the first buffer.
    pub fn start(&mut self) {
        tracing::info!(
            "Connected to device {:04X}:{:04X}",
            self.config.info.vendor,
            self.config.info.product
        );

        if let Some(meta) = &self.metadata {
            let t = &meta.transform;
            tracing::info!("Metadata:");
            tracing::info!("rows={}, columns={}", meta.rows, meta.columns);
            tracing::info!("width={}um, height={}um", meta.width_um, meta.height_um);
            tracing::info!(
                "transform=[{},{},{},{},{},{}]",
                t.xx, t.yx, t.tx, t.xy, t.yy, t.ty
            );
        }

        self.sink.on_start();
    }

    /// Invoked by the runner after the last buffer.
    pub fn stop(&mut self) {
        self.sink.on_stop();
    }

    /// Forget all per-device state, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.finder.reset();
        self.dft.reset();
        self.contacts.clear();
        self.current_serial = None;
        self.last_stylus = StylusData::default();
    }

    /// Parse and process one raw buffer to completion.
    ///
    /// Records preceding a malformed one are still delivered; the rest of
    /// the buffer is lost.
    pub fn process(&mut self, data: &[u8]) -> Result<(), ParseError> {
        let parser = self.parser;
        parser.parse(data, &mut |frame| match frame {
            Frame::Heatmap(heatmap) => self.on_heatmap(&heatmap),
            Frame::Stylus(stylus) => self.on_stylus(stylus),
            Frame::Dft(window) => self.on_dft(&window),
        })
    }

    /// Contact detection on one heatmap, followed by the palm pass.
    fn on_heatmap(&mut self, heatmap: &Heatmap<'_>) {
        {
            let map = self.normalizer.normalize(heatmap);
            self.finder.find(map, &mut self.contacts);
        }

        self.update_touch_cone();
        self.sink.on_contacts(&self.contacts);
    }

    /// One stylus sample: cone update, stroke bookkeeping, delivery.
    fn on_stylus(&mut self, stylus: StylusData) {
        // A serial change starts an independent stroke. End the previous
        // one first so the sink sees a fresh in-range transition.
        if let Some(serial) = self.current_serial {
            if serial != stylus.serial && self.last_stylus.proximity {
                let mut lift = self.last_stylus;
                lift.proximity = false;
                lift.contact = false;
                lift.button = false;
                lift.rubber = false;
                lift.pressure = 0;
                self.sink.on_stylus(&lift);
            }
        }

        let (x, y) = stylus_to_physical(&self.config, &stylus);
        self.cone.update_position(x, y, self.clock.now());

        self.current_serial = Some(stylus.serial);
        self.last_stylus = stylus;
        self.sink.on_stylus(&stylus);
    }

    /// One DFT window: update the estimator, then treat the synthesized
    /// pose exactly like a legacy stylus sample.
    fn on_dft(&mut self, window: &DftWindow) {
        self.dft.input(window);
        self.on_stylus(self.dft.get_stylus());
    }

    /// Rotate the cone toward known palms, then classify the rest.
    fn update_touch_cone(&mut self) {
        if !self.config.touch_check_cone {
            return;
        }
        if !self.cone.alive() {
            return;
        }

        let now = self.clock.now();
        if !self.cone.active(now) {
            return;
        }

        for contact in &self.contacts {
            if contact.valid != Some(false) {
                continue;
            }
            let x = contact.x * self.config.width;
            let y = contact.y * self.config.height;
            self.cone.update_direction(x, y, now);
        }

        for contact in &mut self.contacts {
            if contact.valid == Some(false) {
                continue;
            }
            let x = contact.x * self.config.width;
            let y = contact.y * self.config.height;
            contact.valid = Some(self.cone.check(x, y, now));
        }
    }
}
