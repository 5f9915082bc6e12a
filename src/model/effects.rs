// Track bus effects - compression and 3-band EQ settings
//
// The sequencer never processes audio; these settings are carried with the
// track so the sound engine can read them, and are normalised like the rest
// of the data model.

use serde::{Deserialize, Serialize};

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Bus compressor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Compression {
    pub enabled: bool,
    /// Threshold in dB (-60 to 0)
    pub threshold: f64,
    /// Knee width in dB (0 to 40)
    pub knee: f64,
    /// Ratio (1 to 20)
    pub ratio: f64,
    /// Attack in seconds (0.001 to 1)
    pub attack: f64,
    /// Release in seconds (0.01 to 2)
    pub release: f64,
}

impl Default for Compression {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: -24.0,
            knee: 30.0,
            ratio: 4.0,
            attack: 0.003,
            release: 0.25,
        }
    }
}

impl Compression {
    pub fn normalize(&mut self) {
        let d = Self::default();
        self.threshold = clamp_or(self.threshold, -60.0, 0.0, d.threshold);
        self.knee = clamp_or(self.knee, 0.0, 40.0, d.knee);
        self.ratio = clamp_or(self.ratio, 1.0, 20.0, d.ratio);
        self.attack = clamp_or(self.attack, 0.001, 1.0, d.attack);
        self.release = clamp_or(self.release, 0.01, 2.0, d.release);
    }
}

/// Three-band EQ, gains in dB (-24 to 24)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Eq3 {
    pub enabled: bool,
    pub low_gain: f64,
    pub mid_gain: f64,
    pub high_gain: f64,
}

impl Eq3 {
    pub fn normalize(&mut self) {
        self.low_gain = clamp_or(self.low_gain, -24.0, 24.0, 0.0);
        self.mid_gain = clamp_or(self.mid_gain, -24.0, 24.0, 0.0);
        self.high_gain = clamp_or(self.high_gain, -24.0, 24.0, 0.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackEffects {
    pub compression: Compression,
    pub eq3: Eq3,
}

impl TrackEffects {
    pub fn normalize(&mut self) {
        self.compression.normalize();
        self.eq3.normalize();
    }
}
