//! Stylus-rooted touch rejection cone.
//!
//! The cone has its origin at the last stylus position and is rotated
//! toward palm inputs, so the hand holding the pen has less chance of
//! triggering accidental touches. All methods take the current instant
//! instead of reading a clock, so tests can drive time deterministically.

use std::time::{Duration, Instant};

/// Spatial palm predicate rooted at the stylus position.
#[derive(Debug, Clone)]
pub struct Cone {
    /// Full opening angle, radians.
    angle: f64,
    /// Reach from the origin, physical units.
    distance: f64,
    /// Exponential smoothing coefficient for direction updates.
    smoothing: f64,
    /// How long after the last stylus report the cone stays active.
    timeout: Duration,

    x: f64,
    y: f64,
    dx: f64,
    dy: f64,
    /// Timestamp of the last stylus position update.
    position_updated: Option<Instant>,
    /// Timestamp of the last palm direction update.
    direction_updated: Option<Instant>,
}

impl Cone {
    pub fn new(angle: f64, distance: f64, smoothing: f64, timeout: Duration) -> Self {
        Self {
            angle,
            distance,
            smoothing,
            timeout,
            x: 0.0,
            y: 0.0,
            dx: 0.0,
            dy: 0.0,
            position_updated: None,
            direction_updated: None,
        }
    }

    /// Whether the cone has ever received a stylus position.
    pub fn alive(&self) -> bool {
        self.position_updated.is_some()
    }

    /// Whether the stylus was seen within the configured timeout.
    pub fn active(&self, now: Instant) -> bool {
        match self.position_updated {
            Some(updated) => now.duration_since(updated) < self.timeout,
            None => false,
        }
    }

    /// Move the cone origin to the current stylus position.
    pub fn update_position(&mut self, x: f64, y: f64, now: Instant) {
        self.x = x;
        self.y = y;
        self.position_updated = Some(now);
    }

    /// Blend the offset toward a palm position into the cone direction.
    pub fn update_direction(&mut self, px: f64, py: f64, now: Instant) {
        let dx = px - self.x;
        let dy = py - self.y;

        let norm = dx.hypot(dy);
        if norm <= 0.0 {
            return;
        }

        self.dx = (1.0 - self.smoothing) * self.dx + self.smoothing * dx / norm;
        self.dy = (1.0 - self.smoothing) * self.dy + self.smoothing * dy / norm;

        let blended = self.dx.hypot(self.dy);
        if blended > 0.0 {
            self.dx /= blended;
            self.dy /= blended;
        }

        self.direction_updated = Some(now);
    }

    /// Classify a point: `true` means finger, `false` means palm.
    ///
    /// A point is a palm when the cone is alive and active, lies within
    /// the cone's reach and within half the opening angle of its
    /// direction. Without a direction everything is accepted.
    pub fn check(&self, x: f64, y: f64, now: Instant) -> bool {
        if !self.alive() || !self.active(now) {
            return true;
        }

        if self.dx == 0.0 && self.dy == 0.0 {
            return true;
        }

        let dx = x - self.x;
        let dy = y - self.y;
        let norm = dx.hypot(dy);

        if norm > self.distance {
            return true;
        }
        if norm <= 0.0 {
            // The point is on the stylus itself.
            return false;
        }

        let cos = (dx * self.dx + dy * self.dy) / norm;
        cos < (self.angle / 2.0).cos()
    }
}
