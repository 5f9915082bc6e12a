// Note - a piano-roll note on a track

use serde::{Deserialize, Serialize};

/// A piano-roll note
///
/// Positions are in steps. Several notes may share a start step (chords).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// First step (0..track length)
    pub start: usize,
    /// Length in steps (1..=track length - start)
    pub length: usize,
    /// Semitone offset from the engine's base pitch
    pub pitch: i32,
    /// Velocity (0.0 to 1.0)
    #[serde(default = "full")]
    pub vel: f64,
    /// Probability of playing (0.0 to 1.0)
    #[serde(default = "full")]
    pub chance: f64,
}

fn full() -> f64 {
    1.0
}

impl Note {
    pub fn new(start: usize, length: usize, pitch: i32, vel: f64) -> Self {
        Self {
            start,
            length: length.max(1),
            pitch,
            vel: vel.clamp(0.0, 1.0),
            chance: 1.0,
        }
    }

    pub fn with_chance(mut self, chance: f64) -> Self {
        self.chance = if chance.is_finite() { chance.clamp(0.0, 1.0) } else { 1.0 };
        self
    }

    /// Exclusive end step
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    /// Fit the note inside a track of `track_len` steps
    pub fn normalize(&mut self, track_len: usize) {
        let track_len = track_len.max(1);
        self.start = self.start.min(track_len - 1);
        self.length = self.length.clamp(1, track_len - self.start);
        self.vel = if self.vel.is_finite() { self.vel.clamp(0.0, 1.0) } else { 1.0 };
        self.chance = if self.chance.is_finite() {
            self.chance.clamp(0.0, 1.0)
        } else {
            1.0
        };
    }
}
