// Timeline - tempo and step timing
// One sequencer step is a sixteenth note: four steps per beat.

use std::fmt;

/// Steps per quarter-note beat
pub const STEPS_PER_BEAT: f64 = 4.0;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub const DEFAULT_BPM: f64 = 120.0;
    pub const MAX_BPM: f64 = 300.0;

    /// Tempo from a user value; unusable input falls back to the default,
    /// values above `MAX_BPM` are clamped
    pub fn new(bpm: f64) -> Self {
        Self::sanitized(bpm, Self::DEFAULT_BPM, Self::MAX_BPM)
    }

    /// Like [`Tempo::new`] with caller-provided fallback and ceiling
    pub fn sanitized(bpm: f64, fallback: f64, max_bpm: f64) -> Self {
        let max_bpm = if max_bpm.is_finite() && max_bpm > 0.0 {
            max_bpm
        } else {
            Self::MAX_BPM
        };
        let bpm = if bpm.is_finite() && bpm > 0.0 {
            bpm
        } else if fallback.is_finite() && fallback > 0.0 {
            fallback
        } else {
            Self::DEFAULT_BPM
        };
        Self {
            bpm: bpm.min(max_bpm),
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one step (sixteenth note) in seconds
    pub fn step_duration_seconds(&self) -> f64 {
        60.0 / (self.bpm * STEPS_PER_BEAT)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BPM)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}
