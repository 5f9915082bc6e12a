// Delay step effect - a trigger repeated as decaying echoes

use super::{FxConfig, clamp_int, clamp_number};
use crate::model::params::ParamValue;

/// Echoes quieter than this are not scheduled
pub const ECHO_FLOOR: f64 = 0.0001;

/// Delay parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayConfig {
    /// Wet level relative to the dry hit (0.0 to 1.0)
    pub mix: f64,
    /// Level ratio between consecutive echoes (0.0 to 0.95)
    pub feedback: f64,
    /// Distance between echoes in steps (0.05 to 4.0)
    pub spacing: f64,
    /// Number of echoes (0 to 8)
    pub repeats: u32,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            mix: 0.5,
            feedback: 0.45,
            spacing: 0.5,
            repeats: 2,
        }
    }
}

impl DelayConfig {
    pub fn new(mix: f64, feedback: f64, spacing: f64, repeats: u32) -> Self {
        Self {
            mix: mix.clamp(0.0, 1.0),
            feedback: feedback.clamp(0.0, 0.95),
            spacing: spacing.clamp(0.05, 4.0),
            repeats: repeats.min(8),
        }
    }

    /// Echo cascade for one hit at `time`
    ///
    /// Echo `n` (1-based) has velocity `base * mix * feedback^n` and sits
    /// `n * spacing` steps after the hit.
    pub fn echoes(&self, base_velocity: f64, time: f64, step_duration: f64) -> Vec<Echo> {
        let wet = base_velocity * self.mix;
        if self.repeats == 0 || !(wet > 0.0) {
            return Vec::new();
        }

        let mut echoes = Vec::with_capacity(self.repeats as usize);
        for i in 0..self.repeats {
            // First echo already carries one feedback factor: 0.5/0.5 gives 0.25, 0.125, 0.0625
            let velocity = wet * self.feedback.powi(i as i32 + 1);
            if velocity <= ECHO_FLOOR {
                break;
            }
            echoes.push(Echo {
                time: time + step_duration * self.spacing * (i + 1) as f64,
                velocity: velocity.clamp(0.0, 1.0),
            });
        }
        echoes
    }
}

impl FxConfig for DelayConfig {
    fn from_params(raw: &ParamValue) -> Self {
        let d = Self::default();
        Self {
            mix: clamp_number(raw.child("mix"), 0.0, 1.0, d.mix),
            feedback: clamp_number(raw.child("feedback"), 0.0, 0.95, d.feedback),
            spacing: clamp_number(raw.child("spacing"), 0.05, 4.0, d.spacing),
            repeats: clamp_int(raw.child("repeats"), 0, 8, d.repeats as i64) as u32,
        }
    }

    fn to_params(&self) -> ParamValue {
        ParamValue::from_pairs([
            ("mix", ParamValue::Number(self.mix)),
            ("feedback", ParamValue::Number(self.feedback)),
            ("spacing", ParamValue::Number(self.spacing)),
            ("repeats", ParamValue::Number(self.repeats as f64)),
        ])
    }
}

/// One scheduled echo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Echo {
    pub time: f64,
    pub velocity: f64,
}
