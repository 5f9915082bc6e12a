// LFO modulation source
//
// Phase advances with elapsed audio-clock time between evaluations, not per
// sample. A rate of 0 pins the phase to the `phase` option, which turns the
// LFO into a static offset.

use crate::model::params::{ParamPath, ParamValue};
use crate::stepfx::{clamp_number, flag};
use std::f64::consts::TAU;

/// Highest accepted rate in Hz
pub const MAX_LFO_RATE: f64 = 100.0;

fn wrap_phase(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.rem_euclid(1.0)
}

/// LFO waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfoShape {
    #[default]
    Sine,
    Triangle,
    Square,
    Saw,
    /// Same rising ramp as `Saw`; kept as its own name for stored patterns
    Ramp,
}

impl LfoShape {
    /// Case-insensitive; unknown names fall back to sine
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "triangle" => LfoShape::Triangle,
            "square" => LfoShape::Square,
            "saw" => LfoShape::Saw,
            "ramp" => LfoShape::Ramp,
            _ => LfoShape::Sine,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LfoShape::Sine => "sine",
            LfoShape::Triangle => "triangle",
            LfoShape::Square => "square",
            LfoShape::Saw => "saw",
            LfoShape::Ramp => "ramp",
        }
    }

    /// Map a phase in [0, 1) to [-1, 1]
    pub fn value_at(&self, phase: f64) -> f64 {
        let phase = wrap_phase(phase);
        match self {
            LfoShape::Sine => (phase * TAU).sin(),
            LfoShape::Triangle => 1.0 - 4.0 * (0.5 - phase).abs(),
            LfoShape::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoShape::Saw | LfoShape::Ramp => phase * 2.0 - 1.0,
        }
    }
}

/// LFO options as stored on a modulator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LfoOptions {
    /// Hz, 0 holds the phase
    pub rate: f64,
    pub depth: f64,
    /// Start phase, and the held phase when `rate` is 0
    pub phase: f64,
    pub shape: LfoShape,
    /// Remap the waveform to [0, 1]
    pub unipolar: bool,
    /// Added after the unipolar remap, before depth
    pub bias: f64,
}

impl Default for LfoOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            depth: 1.0,
            phase: 0.0,
            shape: LfoShape::Sine,
            unipolar: false,
            bias: 0.0,
        }
    }
}

/// Phase accumulator of one LFO
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LfoState {
    pub phase: f64,
    /// Time of the previous evaluation; `None` until the first one
    pub last_time: Option<f64>,
}

impl LfoOptions {
    pub fn from_params(raw: &ParamValue) -> Self {
        let defaults = Self::default();
        let get = |key: &str| raw.get(&ParamPath::parse(key));
        let shape = match get("shape") {
            Some(ParamValue::Text(name)) => LfoShape::parse(name),
            _ => defaults.shape,
        };
        Self {
            rate: clamp_number(get("rate"), 0.0, MAX_LFO_RATE, defaults.rate),
            depth: clamp_number(get("depth"), f64::MIN, f64::MAX, defaults.depth),
            phase: wrap_phase(clamp_number(get("phase"), f64::MIN, f64::MAX, 0.0)),
            shape,
            unipolar: flag(get("unipolar")),
            bias: clamp_number(get("bias"), f64::MIN, f64::MAX, defaults.bias),
        }
    }

    pub fn to_params(&self) -> ParamValue {
        ParamValue::from_pairs([
            ("rate", ParamValue::Number(self.rate)),
            ("depth", ParamValue::Number(self.depth)),
            ("phase", ParamValue::Number(self.phase)),
            ("shape", ParamValue::Text(self.shape.name().to_string())),
            ("unipolar", ParamValue::Bool(self.unipolar)),
            ("bias", ParamValue::Number(self.bias)),
        ])
    }

    /// Advance `state` to `now` and return the shaped value
    pub fn evaluate(&self, state: &mut LfoState, now: f64) -> f64 {
        let last = match state.last_time {
            Some(last) => last,
            None => {
                state.phase = self.phase;
                now
            }
        };

        let elapsed = (now - last).max(0.0);
        if self.rate > 0.0 {
            state.phase = wrap_phase(state.phase + elapsed * self.rate);
        } else {
            state.phase = self.phase;
        }
        state.last_time = Some(now);

        let mut value = self.shape.value_at(state.phase);
        if self.unipolar {
            value = (value + 1.0) / 2.0;
        }
        (value + self.bias) * self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn options(shape: LfoShape, rate: f64) -> LfoOptions {
        LfoOptions {
            shape,
            rate,
            ..LfoOptions::default()
        }
    }

    #[test]
    fn test_shapes() {
        assert!((LfoShape::Sine.value_at(0.25) - 1.0).abs() < EPSILON);
        assert_eq!(LfoShape::Triangle.value_at(0.0), -1.0);
        assert_eq!(LfoShape::Triangle.value_at(0.5), 1.0);
        assert_eq!(LfoShape::Square.value_at(0.1), 1.0);
        assert_eq!(LfoShape::Square.value_at(0.6), -1.0);
        assert_eq!(LfoShape::Saw.value_at(0.75), 0.5);
        assert_eq!(LfoShape::Ramp.value_at(0.75), LfoShape::Saw.value_at(0.75));
    }

    #[test]
    fn test_shape_parse_falls_back_to_sine() {
        assert_eq!(LfoShape::parse("TRIANGLE"), LfoShape::Triangle);
        assert_eq!(LfoShape::parse("wobble"), LfoShape::Sine);
    }

    #[test]
    fn test_phase_advances_with_elapsed_time() {
        let lfo = options(LfoShape::Saw, 2.0);
        let mut state = LfoState::default();

        // First evaluation starts at the configured phase
        assert_eq!(lfo.evaluate(&mut state, 10.0), -1.0);
        // 0.125 s at 2 Hz is a quarter cycle
        assert!((lfo.evaluate(&mut state, 10.125) - (-0.5)).abs() < EPSILON);
        assert!((state.phase - 0.25).abs() < EPSILON);
    }

    #[test]
    fn test_time_going_backwards_does_not_rewind() {
        let lfo = options(LfoShape::Saw, 1.0);
        let mut state = LfoState::default();
        lfo.evaluate(&mut state, 5.0);
        lfo.evaluate(&mut state, 5.5);
        lfo.evaluate(&mut state, 5.0);
        assert!((state.phase - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_zero_rate_holds_phase() {
        let lfo = LfoOptions {
            phase: 0.25,
            ..options(LfoShape::Sine, 0.0)
        };
        let mut state = LfoState::default();
        for t in [0.0, 1.0, 7.3] {
            assert!((lfo.evaluate(&mut state, t) - 1.0).abs() < EPSILON);
        }
    }

    #[test]
    fn test_unipolar_bias_and_depth() {
        let lfo = LfoOptions {
            rate: 0.0,
            phase: 0.75,
            unipolar: true,
            bias: 0.5,
            depth: 2.0,
            shape: LfoShape::Sine,
        };
        let mut state = LfoState::default();
        // sine(0.75) = -1 -> unipolar 0 -> +0.5 -> *2
        assert!((lfo.evaluate(&mut state, 0.0) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_from_params_repairs() {
        let raw = ParamValue::from_pairs([
            ("rate", ParamValue::Number(-3.0)),
            ("phase", ParamValue::Number(1.25)),
            ("shape", ParamValue::Text("Square".into())),
            ("unipolar", ParamValue::Text("yes".into())),
        ]);
        let lfo = LfoOptions::from_params(&raw);
        assert_eq!(lfo.rate, 0.0);
        assert_eq!(lfo.phase, 0.25);
        assert_eq!(lfo.shape, LfoShape::Square);
        assert!(!lfo.unipolar);
        assert_eq!(lfo.depth, 1.0);

        assert_eq!(LfoOptions::from_params(&lfo.to_params()), lfo);
    }
}
