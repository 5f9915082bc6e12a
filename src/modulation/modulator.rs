// Modulator - a signal source routed to one target with a signed amount

use super::lfo::{LfoOptions, LfoState};
use super::sample_hold::{SampleHoldOptions, SampleHoldState};
use super::target::ModTarget;
use crate::model::params::{ParamPath, ParamValue};
use crate::stepfx::clamp_number;
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Signal generator of a modulator, with its options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModSource {
    Lfo(LfoOptions),
    SampleHold(SampleHoldOptions),
}

impl ModSource {
    /// Build from a source tag and raw options; unknown tags become an LFO
    pub fn from_raw(tag: &str, options: &ParamValue) -> Self {
        let key: String = tag
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "lfo" => ModSource::Lfo(LfoOptions::from_params(options)),
            "samplehold" | "samplenhold" | "sh" => {
                ModSource::SampleHold(SampleHoldOptions::from_params(options))
            }
            _ => {
                warn!("Unknown modulation source '{}', using an LFO", tag);
                ModSource::Lfo(LfoOptions::from_params(options))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModSource::Lfo(_) => "lfo",
            ModSource::SampleHold(_) => "sampleHold",
        }
    }

    pub fn options(&self) -> ParamValue {
        match self {
            ModSource::Lfo(options) => options.to_params(),
            ModSource::SampleHold(options) => options.to_params(),
        }
    }
}

/// Per-modulator runtime state; never serialised
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModState {
    pub lfo: LfoState,
    pub hold: SampleHoldState,
}

/// Inputs a modulator may read during one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModContext {
    /// Scheduled audio-clock time of the tick
    pub now: f64,
    /// Scheduler step index (monotonic across the run)
    pub step_index: u64,
    /// Velocity of the track's current step
    pub step_velocity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawModulator", into = "RawModulator")]
pub struct Modulator {
    pub id: String,
    pub source: ModSource,
    /// Signed gain applied to the source signal
    pub amount: f64,
    pub target: ModTarget,
    pub enabled: bool,
    state: ModState,
}

impl Modulator {
    /// A modulator without an id; the track assigns one when it is added
    pub fn new(source: ModSource, target: &str, amount: f64) -> Self {
        let mut modulator = Self {
            id: String::new(),
            source,
            amount,
            target: ModTarget::parse(target),
            enabled: true,
            state: ModState::default(),
        };
        modulator.normalize();
        modulator
    }

    pub fn lfo(target: &str, amount: f64) -> Self {
        Self::new(ModSource::Lfo(LfoOptions::default()), target, amount)
    }

    pub fn sample_hold(target: &str, amount: f64) -> Self {
        Self::new(
            ModSource::SampleHold(SampleHoldOptions::default()),
            target,
            amount,
        )
    }

    pub fn normalize(&mut self) {
        if !self.amount.is_finite() {
            self.amount = 0.0;
        }
        self.source = ModSource::from_raw(self.source.name(), &self.source.options());
    }

    pub fn reset_state(&mut self) {
        self.state = ModState::default();
    }

    /// Called on stop; the next run numbers its steps from 0 again
    pub fn end_run(&mut self) {
        self.state.hold.forget_step();
    }

    pub fn state(&self) -> &ModState {
        &self.state
    }

    /// Raw source signal, before `amount`
    pub fn signal<R: Rng + ?Sized>(&mut self, ctx: &ModContext, rng: &mut R) -> f64 {
        match &self.source {
            ModSource::Lfo(options) => options.evaluate(&mut self.state.lfo, ctx.now),
            ModSource::SampleHold(options) => options.evaluate(
                &mut self.state.hold,
                ctx.step_index,
                ctx.step_velocity,
                rng,
            ),
        }
    }

    /// Signed delta for this evaluation; `None` when disabled, unroutable
    /// or when it would change nothing
    pub fn delta<R: Rng + ?Sized>(&mut self, ctx: &ModContext, rng: &mut R) -> Option<f64> {
        if !self.enabled || !self.target.is_valid() {
            return None;
        }
        if !self.amount.is_finite() || self.amount == 0.0 {
            return None;
        }
        let delta = self.signal(ctx, rng) * self.amount;
        (delta.is_finite() && delta != 0.0).then_some(delta)
    }
}

/// Hands out `mod-N` ids unique within a song
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModIdAllocator {
    last: u64,
}

impl ModIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        self.last += 1;
        format!("mod-{}", self.last)
    }

    /// Make sure future ids skip past an existing `mod-N`
    pub fn observe(&mut self, id: &str) {
        if let Some(n) = id
            .trim()
            .strip_prefix("mod-")
            .and_then(|n| n.parse::<u64>().ok())
        {
            self.last = self.last.max(n);
        }
    }

    /// Keep a non-empty id (recording it), otherwise allocate a new one
    pub fn assign(&mut self, id: &str) -> String {
        if id.trim().is_empty() {
            self.next_id()
        } else {
            self.observe(id);
            id.to_string()
        }
    }
}

/// Stored shape: `{ id, source, amount, target, options, enabled }`
///
/// `target` is a dotted string or an array of segments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawModulator {
    #[serde(default)]
    id: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    amount: Option<ParamValue>,
    #[serde(default)]
    target: Option<ParamValue>,
    #[serde(default)]
    options: ParamValue,
    #[serde(default)]
    enabled: Option<ParamValue>,
}

fn segment_text(value: &ParamValue) -> Option<String> {
    match value {
        ParamValue::Text(s) => Some(s.clone()),
        ParamValue::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(format!("{}", *n as i64)),
        ParamValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn target_path(raw: Option<&ParamValue>) -> ParamPath {
    match raw {
        Some(ParamValue::Text(s)) => ParamPath::parse(s),
        Some(ParamValue::List(items)) => {
            ParamPath::from_segments(items.iter().filter_map(segment_text))
        }
        _ => ParamPath::default(),
    }
}

impl From<RawModulator> for Modulator {
    fn from(raw: RawModulator) -> Self {
        let source_tag = if raw.source.trim().is_empty() {
            "lfo"
        } else {
            raw.source.as_str()
        };
        let mut modulator = Modulator {
            id: raw.id.trim().to_string(),
            source: ModSource::from_raw(source_tag, &raw.options),
            amount: clamp_number(raw.amount.as_ref(), f64::MIN, f64::MAX, 0.0),
            target: ModTarget::resolve(target_path(raw.target.as_ref())),
            enabled: !matches!(raw.enabled, Some(ParamValue::Bool(false))),
            state: ModState::default(),
        };
        modulator.normalize();
        modulator
    }
}

impl From<Modulator> for RawModulator {
    fn from(modulator: Modulator) -> Self {
        RawModulator {
            id: modulator.id,
            source: modulator.source.name().to_string(),
            amount: Some(ParamValue::Number(modulator.amount)),
            target: Some(ParamValue::Text(modulator.target.to_path().to_string())),
            options: modulator.source.options(),
            enabled: Some(ParamValue::Bool(modulator.enabled)),
        }
    }
}
