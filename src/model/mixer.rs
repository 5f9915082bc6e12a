// Mixer - per-track gain, pan, mute and solo

use crate::model::track::Track;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerState {
    /// Linear gain (0.0 to 2.0)
    pub gain: f64,
    /// Stereo position (-1.0 = left, 1.0 = right)
    pub pan: f64,
    pub mute: bool,
    pub solo: bool,
}

impl Default for MixerState {
    fn default() -> Self {
        Self {
            gain: 0.9,
            pan: 0.0,
            mute: false,
            solo: false,
        }
    }
}

impl MixerState {
    pub fn normalize(&mut self) {
        self.gain = if self.gain.is_finite() { self.gain.clamp(0.0, 2.0) } else { 0.9 };
        self.pan = if self.pan.is_finite() { self.pan.clamp(-1.0, 1.0) } else { 0.0 };
    }

    /// Gain the bus should run at, given the track's audibility
    pub fn effective_gain(&self, audible: bool) -> f64 {
        if audible { self.gain } else { 0.0 }
    }
}

/// Recompute every track's audibility from mute/solo
///
/// With any track soloed, only soloed and unmuted tracks are audible.
pub fn apply_mixer(tracks: &mut [Track]) {
    let any_solo = tracks.iter().any(|t| t.mixer.solo);
    for track in tracks.iter_mut() {
        let audible = !track.mixer.mute && (!any_solo || track.mixer.solo);
        track.set_audible(audible);
    }
}
