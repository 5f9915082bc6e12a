// Sample & hold modulation source
//
// Holds a sampled value for a number of steps. The countdown moves once per
// distinct step index, so several evaluations inside one step agree.

use crate::model::params::{ParamPath, ParamValue};
use crate::stepfx::clamp_int;
use rand::Rng;

pub const MAX_HOLD_STEPS: u32 = 128;

/// What a fresh sample is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleInput {
    /// Uniform in [-1, 1]
    #[default]
    Random,
    /// Current step velocity mapped from [0, 1] to [-1, 1]
    StepVelocity,
}

impl SampleInput {
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "stepvelocity" | "velocity" => SampleInput::StepVelocity,
            _ => SampleInput::Random,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SampleInput::Random => "random",
            SampleInput::StepVelocity => "stepVelocity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleHoldOptions {
    pub input: SampleInput,
    /// Steps a sample is held for (1..=128)
    pub hold: u32,
}

impl Default for SampleHoldOptions {
    fn default() -> Self {
        Self {
            input: SampleInput::Random,
            hold: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SampleHoldState {
    pub remaining: u32,
    pub held: f64,
    pub last_step: Option<u64>,
}

impl SampleHoldState {
    /// Drop the step marker so the next evaluation counts as a new step
    ///
    /// Step indices restart at 0 on every run; the held value and the
    /// countdown are kept.
    pub fn forget_step(&mut self) {
        self.last_step = None;
    }
}

impl SampleHoldOptions {
    pub fn from_params(raw: &ParamValue) -> Self {
        let get = |key: &str| raw.get(&ParamPath::parse(key));
        let input = match get("sampleInput").or_else(|| get("input")) {
            Some(ParamValue::Text(name)) => SampleInput::parse(name),
            _ => SampleInput::Random,
        };
        Self {
            input,
            hold: clamp_int(get("hold"), 1, MAX_HOLD_STEPS as i64, 1) as u32,
        }
    }

    pub fn to_params(&self) -> ParamValue {
        ParamValue::from_pairs([
            ("sampleInput", ParamValue::Text(self.input.name().to_string())),
            ("hold", ParamValue::Number(self.hold as f64)),
        ])
    }

    /// Held value for `step_index`, resampling when the hold ran out
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        state: &mut SampleHoldState,
        step_index: u64,
        step_velocity: f64,
        rng: &mut R,
    ) -> f64 {
        if state.last_step == Some(step_index) {
            return state.held;
        }
        state.last_step = Some(step_index);
        state.remaining = state.remaining.saturating_sub(1);

        if state.remaining == 0 {
            state.held = match self.input {
                SampleInput::Random => rng.gen_range(-1.0..=1.0),
                SampleInput::StepVelocity => {
                    let velocity = if step_velocity.is_finite() {
                        step_velocity.clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                    velocity * 2.0 - 1.0
                }
            };
            state.remaining = self.hold.clamp(1, MAX_HOLD_STEPS);
        }
        state.held
    }
}
