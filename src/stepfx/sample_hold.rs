// Sample & hold step effect - a held random velocity offset per step

use super::{FxConfig, clamp_int, clamp_number};
use crate::model::params::{ParamPath, ParamValue};
use crate::modulation::offsets::OffsetTree;
use rand::Rng;
use std::collections::HashMap;

/// Random velocity offset range, resampled every `hold` passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleHoldFxConfig {
    /// Lower bound of the offset (-1.0 to 1.0)
    pub min: f64,
    /// Upper bound of the offset (-1.0 to 1.0)
    pub max: f64,
    /// Largest magnitude of the range
    pub amount: f64,
    /// Probability of drawing a new value when the hold expires
    pub chance: f64,
    /// Number of passes a drawn value is held (1 to 128)
    pub hold: u32,
}

impl Default for SampleHoldFxConfig {
    fn default() -> Self {
        Self {
            min: -0.25,
            max: 0.25,
            amount: 0.25,
            chance: 1.0,
            hold: 1,
        }
    }
}

impl FxConfig for SampleHoldFxConfig {
    fn from_params(raw: &ParamValue) -> Self {
        let d = Self::default();
        let mut min = clamp_number(raw.child("min"), -1.0, 1.0, d.min);
        let mut max = clamp_number(raw.child("max"), -1.0, 1.0, d.max);
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }
        let amount = clamp_number(raw.child("amount"), 0.0, 1.0, d.amount)
            .max(min.abs())
            .max(max.abs());
        Self {
            min,
            max,
            amount,
            chance: clamp_number(raw.child("chance"), 0.0, 1.0, d.chance),
            hold: clamp_int(raw.child("hold"), 1, 128, d.hold as i64) as u32,
        }
    }

    fn to_params(&self) -> ParamValue {
        ParamValue::from_pairs([
            ("min", ParamValue::Number(self.min)),
            ("max", ParamValue::Number(self.max)),
            ("amount", ParamValue::Number(self.amount)),
            ("chance", ParamValue::Number(self.chance)),
            ("hold", ParamValue::Number(self.hold as f64)),
        ])
    }

    /// Offsets on `amount` rescale whichever of `min`/`max` were not
    /// themselves offset, keeping the range's proportions.
    fn with_offsets(&self, offsets: Option<&OffsetTree>) -> Self {
        let Some(tree) = offsets.filter(|t| !t.is_empty()) else {
            return *self;
        };

        let mut raw = self.to_params();
        let applied = tree.apply_to(&mut raw);
        let touched = |key: &str| applied.iter().any(|a| a.path.to_string() == key);

        let read = |raw: &ParamValue, key: &str, fallback: f64| {
            raw.child(key).and_then(ParamValue::as_number).unwrap_or(fallback)
        };

        let mut min = read(&raw, "min", self.min);
        let mut max = read(&raw, "max", self.max);
        let mut amount = read(&raw, "amount", self.amount);

        if touched("amount") {
            amount = amount.abs();
            if self.amount > 0.0 {
                if !touched("min") {
                    min = self.min / self.amount * amount;
                }
                if !touched("max") {
                    max = self.max / self.amount * amount;
                }
            }
        }

        let mut merged = raw;
        merged.insert(&ParamPath::parse("min"), ParamValue::Number(min));
        merged.insert(&ParamPath::parse("max"), ParamValue::Number(max));
        merged.insert(&ParamPath::parse("amount"), ParamValue::Number(amount));
        Self::from_params(&merged)
    }
}

impl SampleHoldFxConfig {
    /// Advance the hold slot for one pass and return the held offset
    pub fn next_offset<R: Rng + ?Sized>(&self, slot: &mut HoldSlot, rng: &mut R) -> f64 {
        if !slot.value.is_finite() {
            slot.value = 0.0;
        }
        if slot.remaining == 0 {
            if rng.gen_bool(self.chance.clamp(0.0, 1.0)) {
                let span = self.max - self.min;
                slot.value = if span > 0.0 {
                    self.min + rng.gen_range(0.0..1.0) * span
                } else {
                    self.min
                };
                slot.remaining = self.hold;
            } else {
                slot.remaining = 1;
            }
        }
        slot.remaining = slot.remaining.saturating_sub(1);
        slot.value
    }
}

/// Held value for one step position
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HoldSlot {
    pub remaining: u32,
    pub value: f64,
}

/// Runtime step-effect state owned by a track (never serialised)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepFxState {
    pub sample_hold: HashMap<usize, HoldSlot>,
}

impl StepFxState {
    pub fn slot(&mut self, step: usize) -> &mut HoldSlot {
        self.sample_hold.entry(step).or_default()
    }

    pub fn clear(&mut self) {
        self.sample_hold.clear();
    }
}
