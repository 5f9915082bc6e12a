// Duck step effects - attack/hold/release gain dips on the track bus
//
// The dip is scheduled on the triggering track's own duck controls.
// `include_self` is carried through the config but no cross-track routing
// reads it.

use super::{FxConfig, clamp_number, flag};
use crate::audio::trigger::{GainControl, GainEnvelope};
use crate::model::params::ParamValue;

const MAX_DEPTH_DB: f64 = 36.0;
const MAX_SEGMENT_STEPS: f64 = 8.0;

/// Convert a positive attenuation in dB to a linear gain
pub fn db_to_gain(depth_db: f64) -> f64 {
    10f64.powf(-depth_db / 20.0)
}

/// Shared attack/hold/release timing, in steps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuckShape {
    pub attack: f64,
    pub hold: f64,
    pub release: f64,
}

impl DuckShape {
    fn from_params(raw: &ParamValue, defaults: DuckShape) -> Self {
        Self {
            attack: clamp_number(raw.child("attack"), 0.0, MAX_SEGMENT_STEPS, defaults.attack),
            hold: clamp_number(raw.child("hold"), 0.0, MAX_SEGMENT_STEPS, defaults.hold),
            release: clamp_number(raw.child("release"), 0.0, MAX_SEGMENT_STEPS, defaults.release),
        }
    }

    fn is_flat(&self) -> bool {
        self.attack <= 0.0 && self.hold <= 0.0 && self.release <= 0.0
    }

    fn envelope(
        &self,
        control: GainControl,
        start: f64,
        step_duration: f64,
        rest: f64,
        target: f64,
    ) -> GainEnvelope {
        GainEnvelope {
            control,
            start,
            attack: self.attack * step_duration,
            hold: self.hold * step_duration,
            release: self.release * step_duration,
            rest,
            target,
        }
    }
}

const DEFAULT_SHAPE: DuckShape = DuckShape {
    attack: 0.05,
    hold: 0.2,
    release: 0.3,
};

/// Full-band duck
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuckConfig {
    /// Attenuation at the bottom of the dip (0 to 36 dB)
    pub depth_db: f64,
    pub shape: DuckShape,
    pub include_self: bool,
}

impl Default for DuckConfig {
    fn default() -> Self {
        Self {
            depth_db: 12.0,
            shape: DEFAULT_SHAPE,
            include_self: false,
        }
    }
}

impl DuckConfig {
    /// Linear-gain dip on the duck control, or `None` when it would do nothing
    pub fn envelope(&self, start: f64, step_duration: f64) -> Option<GainEnvelope> {
        if self.depth_db <= 0.0 || self.shape.is_flat() {
            return None;
        }
        Some(self.shape.envelope(
            GainControl::Duck,
            start,
            step_duration,
            1.0,
            db_to_gain(self.depth_db),
        ))
    }
}

impl FxConfig for DuckConfig {
    fn from_params(raw: &ParamValue) -> Self {
        let d = Self::default();
        Self {
            depth_db: clamp_number(raw.child("depthDb"), 0.0, MAX_DEPTH_DB, d.depth_db),
            shape: DuckShape::from_params(raw, d.shape),
            include_self: flag(raw.child("includeSelf")),
        }
    }

    fn to_params(&self) -> ParamValue {
        ParamValue::from_pairs([
            ("depthDb", ParamValue::Number(self.depth_db)),
            ("attack", ParamValue::Number(self.shape.attack)),
            ("hold", ParamValue::Number(self.shape.hold)),
            ("release", ParamValue::Number(self.shape.release)),
            ("includeSelf", ParamValue::Bool(self.include_self)),
        ])
    }
}

/// Three-band duck (low shelf, peaking mid, high shelf)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultibandDuckConfig {
    pub low_depth_db: f64,
    pub mid_depth_db: f64,
    pub high_depth_db: f64,
    pub shape: DuckShape,
    pub include_self: bool,
}

impl Default for MultibandDuckConfig {
    fn default() -> Self {
        Self {
            low_depth_db: 14.0,
            mid_depth_db: 8.0,
            high_depth_db: 4.0,
            shape: DEFAULT_SHAPE,
            include_self: false,
        }
    }
}

impl MultibandDuckConfig {
    /// One dB-domain dip per band with a non-zero depth
    pub fn envelopes(&self, start: f64, step_duration: f64) -> Vec<GainEnvelope> {
        if self.shape.is_flat() {
            return Vec::new();
        }
        [
            (GainControl::DuckLow, self.low_depth_db),
            (GainControl::DuckMid, self.mid_depth_db),
            (GainControl::DuckHigh, self.high_depth_db),
        ]
        .into_iter()
        .filter(|(_, depth)| *depth > 0.0)
        .map(|(control, depth)| self.shape.envelope(control, start, step_duration, 0.0, -depth))
        .collect()
    }
}

impl FxConfig for MultibandDuckConfig {
    fn from_params(raw: &ParamValue) -> Self {
        let d = Self::default();
        Self {
            low_depth_db: clamp_number(raw.child("lowDepthDb"), 0.0, MAX_DEPTH_DB, d.low_depth_db),
            mid_depth_db: clamp_number(raw.child("midDepthDb"), 0.0, MAX_DEPTH_DB, d.mid_depth_db),
            high_depth_db: clamp_number(
                raw.child("highDepthDb"),
                0.0,
                MAX_DEPTH_DB,
                d.high_depth_db,
            ),
            shape: DuckShape::from_params(raw, d.shape),
            include_self: flag(raw.child("includeSelf")),
        }
    }

    fn to_params(&self) -> ParamValue {
        ParamValue::from_pairs([
            ("lowDepthDb", ParamValue::Number(self.low_depth_db)),
            ("midDepthDb", ParamValue::Number(self.mid_depth_db)),
            ("highDepthDb", ParamValue::Number(self.high_depth_db)),
            ("attack", ParamValue::Number(self.shape.attack)),
            ("hold", ParamValue::Number(self.shape.hold)),
            ("release", ParamValue::Number(self.shape.release)),
            ("includeSelf", ParamValue::Bool(self.include_self)),
        ])
    }
}
