//! Inter-frame contact tracking and stability gating.

use super::detect::Fit;
use super::{Contact, ContactsConfig};

/// One tracked contact, persisted across frames.
#[derive(Debug, Clone, Copy)]
struct Track {
    index: u32,
    x: f64,
    y: f64,
    major: f64,
    minor: f64,
    orientation: f64,
    age: u32,
    /// Consecutive matched frames with low drift and low size change.
    calm_frames: u32,
    /// Sticky: set once `calm_frames` reaches the configured window.
    stable: bool,
    /// Sticky: a contact that was ever classified palm stays a palm.
    palm: bool,
    /// Frames since the track last matched a fit.
    misses: u32,
}

/// Matches per-frame fits against tracked contacts and assigns stable
/// tracking indices.
#[derive(Debug, Clone, Default)]
pub(super) struct Tracker {
    tracks: Vec<Track>,
    next_index: u32,
}

impl Tracker {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Drop all tracks and start numbering from scratch.
    pub(super) fn reset(&mut self) {
        self.tracks.clear();
        self.next_index = 0;
    }

    /// Consume one frame of fits (normalized coordinates) and emit the
    /// resulting contacts, ordered by tracking index.
    pub(super) fn update(
        &mut self,
        fits: &[Fit],
        config: &ContactsConfig,
        contacts: &mut Vec<Contact>,
    ) {
        contacts.clear();

        let assignment = self.match_fits(fits, config);

        let mut matched = vec![false; self.tracks.len()];
        for (fit, &track_idx) in fits.iter().zip(&assignment) {
            match track_idx {
                Some(t) => {
                    matched[t] = true;
                    self.tracks[t].advance(fit, config);
                }
                None => {
                    let track = Track::new(self.next_index, fit, config);
                    self.next_index = self.next_index.wrapping_add(1);
                    matched.push(true);
                    self.tracks.push(track);
                }
            }
        }

        // Unmatched tracks keep their index reserved for a grace period so
        // a briefly-lost blob does not get renumbered.
        let mut kept = 0;
        for i in 0..self.tracks.len() {
            if !matched[i] {
                self.tracks[i].misses += 1;
                if !self.tracks[i].stable {
                    self.tracks[i].calm_frames = 0;
                }
                if self.tracks[i].misses > config.tracking_grace {
                    continue;
                }
            }
            self.tracks[kept] = self.tracks[i];
            matched[kept] = matched[i];
            kept += 1;
        }
        self.tracks.truncate(kept);
        matched.truncate(kept);

        for (track, emitted) in self.tracks.iter().zip(&matched) {
            if *emitted {
                contacts.push(track.to_contact());
            }
        }
        contacts.sort_by_key(|contact| contact.index);
    }

    /// Greedy stable assignment: candidate pairs within the distance gate,
    /// sorted by cost ascending, each committed when both endpoints are
    /// still free.
    fn match_fits(&self, fits: &[Fit], config: &ContactsConfig) -> Vec<Option<usize>> {
        let mut pairs = Vec::new();
        for (f, fit) in fits.iter().enumerate() {
            for (t, track) in self.tracks.iter().enumerate() {
                let distance = (fit.x - track.x).hypot(fit.y - track.y);
                if distance > config.match_distance {
                    continue;
                }
                let shape = (fit.major - track.major).abs() + (fit.minor - track.minor).abs();
                let cost = distance + config.shape_weight * shape;
                pairs.push((cost, t, f));
            }
        }
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        let mut assignment = vec![None; fits.len()];
        let mut track_taken = vec![false; self.tracks.len()];
        for (_, t, f) in pairs {
            if track_taken[t] || assignment[f].is_some() {
                continue;
            }
            track_taken[t] = true;
            assignment[f] = Some(t);
        }
        assignment
    }
}

impl Track {
    fn new(index: u32, fit: &Fit, config: &ContactsConfig) -> Self {
        Self {
            index,
            x: fit.x,
            y: fit.y,
            major: fit.major,
            minor: fit.minor,
            orientation: fit.orientation,
            age: 0,
            calm_frames: 1,
            stable: 1 >= config.stability_frames,
            palm: fit.palm,
            misses: 0,
        }
    }

    fn advance(&mut self, fit: &Fit, config: &ContactsConfig) {
        let drift = (fit.x - self.x).hypot(fit.y - self.y);
        let size_delta =
            (fit.major - self.major).abs() + (fit.minor - self.minor).abs();

        if drift <= config.stability_distance && size_delta <= config.stability_size_delta {
            self.calm_frames += 1;
        } else {
            self.calm_frames = 1;
        }
        if self.calm_frames >= config.stability_frames {
            self.stable = true;
        }

        self.x = fit.x;
        self.y = fit.y;
        self.major = fit.major;
        self.minor = fit.minor;
        self.orientation = fit.orientation;
        self.palm |= fit.palm;
        self.age += 1;
        self.misses = 0;
    }

    fn to_contact(&self) -> Contact {
        Contact {
            x: self.x,
            y: self.y,
            major: self.major,
            minor: self.minor,
            orientation: self.orientation,
            index: self.index,
            stable: self.stable,
            valid: if self.palm { Some(false) } else { None },
            age: self.age,
        }
    }
}
