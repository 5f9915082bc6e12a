// Step - one cell of a step-mode track

use crate::model::params::{ParamPath, ParamValue};
use crate::stepfx::StepFx;
use serde::{Deserialize, Serialize};

const VELOCITY_KEY: &str = "velocity";

/// A step in a step-mode track
///
/// The velocity lives in two places: the flat `vel` field and
/// `params.velocity`. Only [`Step::set_velocity`] writes it, keeping both in
/// sync; [`Step::velocity`] prefers the params copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub on: bool,
    #[serde(default = "unset_velocity")]
    vel: f64,
    /// Free-form per-step overrides
    #[serde(default)]
    pub params: ParamValue,
    #[serde(default)]
    pub fx: StepFx,
}

fn unset_velocity() -> f64 {
    f64::NAN
}

impl Default for Step {
    fn default() -> Self {
        let mut step = Self {
            on: false,
            vel: 0.0,
            params: ParamValue::node(),
            fx: StepFx::None,
        };
        step.set_velocity(0.0);
        step
    }
}

impl Step {
    /// An active step at the given velocity
    pub fn on(velocity: f64) -> Self {
        let mut step = Self::default();
        step.on = true;
        step.set_velocity(velocity);
        step
    }

    /// Stored velocity, or `fallback` when neither copy is a finite number
    pub fn velocity_or(&self, fallback: f64) -> f64 {
        let from_params = self
            .params
            .child(VELOCITY_KEY)
            .and_then(ParamValue::as_number)
            .filter(|v| v.is_finite());
        match from_params {
            Some(v) => v.max(0.0),
            None if self.vel.is_finite() => self.vel.max(0.0),
            None => fallback.max(0.0),
        }
    }

    pub fn velocity(&self) -> f64 {
        self.velocity_or(if self.on { 1.0 } else { 0.0 })
    }

    /// Write the velocity to both locations; returns the stored value
    pub fn set_velocity(&mut self, velocity: f64) -> f64 {
        let next = if velocity.is_finite() { velocity.max(0.0) } else { 0.0 };
        if !matches!(self.params, ParamValue::Node(_)) {
            self.params = ParamValue::node();
        }
        self.params
            .insert(&ParamPath::parse(VELOCITY_KEY), ParamValue::Number(next));
        self.vel = next;
        next
    }

    /// Flip the step, keeping its velocity across off and on
    ///
    /// Turning on restores the stored velocity, or full velocity when
    /// nothing audible is stored.
    pub fn toggle(&mut self) {
        if self.on {
            self.on = false;
            return;
        }
        let previous = self.velocity_or(1.0);
        self.on = true;
        self.set_velocity(if previous > 0.0 { previous } else { 1.0 });
    }

    /// Repair params, effect and velocity mirrors
    pub fn normalize(&mut self) {
        if !matches!(self.params, ParamValue::Node(_)) {
            self.params = ParamValue::node();
        }
        self.fx.normalize();
        let velocity = self.velocity();
        self.set_velocity(velocity);
    }
}
