// Module stepfx - per-step effects applied at trigger time
//
// A step carries at most one effect. Configs are always re-derivable from
// partial input: unknown types collapse to `None` and every numeric field is
// clamped or defaulted.

pub mod delay;
pub mod duck;
pub mod evaluator;
pub mod sample_hold;

pub use delay::{DelayConfig, Echo};
pub use duck::{DuckConfig, MultibandDuckConfig};
pub use evaluator::{FxContext, FxEvent, StepFxPlan, evaluate_step_fx};
pub use sample_hold::{HoldSlot, SampleHoldFxConfig, StepFxState};

use crate::model::params::ParamValue;
use crate::modulation::offsets::OffsetTree;
use serde::{Deserialize, Serialize};

/// Clamp a raw config value, falling back when it is missing or not a finite number
pub fn clamp_number(value: Option<&ParamValue>, min: f64, max: f64, fallback: f64) -> f64 {
    let number = match value {
        Some(ParamValue::Number(n)) => *n,
        Some(ParamValue::Text(s)) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    };
    if !number.is_finite() {
        return fallback;
    }
    number.clamp(min, max)
}

/// Integer flavour of [`clamp_number`]: rounds to nearest before clamping
pub fn clamp_int(value: Option<&ParamValue>, min: i64, max: i64, fallback: i64) -> i64 {
    let raw = clamp_number(value, f64::MIN, f64::MAX, fallback as f64);
    (raw.round() as i64).clamp(min, max)
}

/// Strict boolean read: only a literal `true` enables
pub fn flag(value: Option<&ParamValue>) -> bool {
    matches!(value, Some(ParamValue::Bool(true)))
}

/// Conversion between a typed effect config and its raw parameter form
pub trait FxConfig: Sized {
    /// Normalise raw input (missing or bad fields take defaults)
    fn from_params(raw: &ParamValue) -> Self;

    fn to_params(&self) -> ParamValue;

    /// Add modulation offsets to the raw numeric fields, then re-clamp
    fn with_offsets(&self, offsets: Option<&OffsetTree>) -> Self {
        match offsets {
            Some(tree) if !tree.is_empty() => {
                let mut raw = self.to_params();
                tree.apply_to(&mut raw);
                Self::from_params(&raw)
            }
            _ => Self::from_params(&self.to_params()),
        }
    }
}

/// Effect type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepFxKind {
    None,
    Delay,
    Duck,
    MultibandDuck,
    SampleHold,
}

impl StepFxKind {
    /// Lenient parse: case, dashes and underscores are ignored;
    /// anything unrecognised is `None`
    pub fn parse(raw: &str) -> Self {
        match Self::offset_key(raw).as_str() {
            "delay" => StepFxKind::Delay,
            "duck" => StepFxKind::Duck,
            "multibandduck" => StepFxKind::MultibandDuck,
            "samplehold" | "samplenhold" => StepFxKind::SampleHold,
            _ => StepFxKind::None,
        }
    }

    /// Canonical name used when serialising
    pub fn name(&self) -> &'static str {
        match self {
            StepFxKind::None => "none",
            StepFxKind::Delay => "delay",
            StepFxKind::Duck => "duck",
            StepFxKind::MultibandDuck => "multibandDuck",
            StepFxKind::SampleHold => "sampleHold",
        }
    }

    /// Key of this type's bucket in the effect offsets
    pub fn key(&self) -> String {
        Self::offset_key(self.name())
    }

    /// Normalise a raw type name into an effect-offset bucket key
    pub fn offset_key(raw: &str) -> String {
        raw.trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect()
    }
}

/// The effect attached to one step
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawStepFx", into = "RawStepFx")]
pub enum StepFx {
    #[default]
    None,
    Delay(DelayConfig),
    Duck(DuckConfig),
    MultibandDuck(MultibandDuckConfig),
    SampleHold(SampleHoldFxConfig),
}

impl StepFx {
    /// Effect of the given type with default config
    pub fn create(kind: StepFxKind) -> Self {
        Self::from_raw(kind.name(), &ParamValue::node())
    }

    /// Build from a type name and a raw (possibly partial) config
    pub fn from_raw(type_name: &str, config: &ParamValue) -> Self {
        match StepFxKind::parse(type_name) {
            StepFxKind::None => StepFx::None,
            StepFxKind::Delay => StepFx::Delay(DelayConfig::from_params(config)),
            StepFxKind::Duck => StepFx::Duck(DuckConfig::from_params(config)),
            StepFxKind::MultibandDuck => {
                StepFx::MultibandDuck(MultibandDuckConfig::from_params(config))
            }
            StepFxKind::SampleHold => StepFx::SampleHold(SampleHoldFxConfig::from_params(config)),
        }
    }

    pub fn kind(&self) -> StepFxKind {
        match self {
            StepFx::None => StepFxKind::None,
            StepFx::Delay(_) => StepFxKind::Delay,
            StepFx::Duck(_) => StepFxKind::Duck,
            StepFx::MultibandDuck(_) => StepFxKind::MultibandDuck,
            StepFx::SampleHold(_) => StepFxKind::SampleHold,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, StepFx::None)
    }

    /// Raw config tree (empty node for `None`)
    pub fn config_params(&self) -> ParamValue {
        match self {
            StepFx::None => ParamValue::node(),
            StepFx::Delay(c) => c.to_params(),
            StepFx::Duck(c) => c.to_params(),
            StepFx::MultibandDuck(c) => c.to_params(),
            StepFx::SampleHold(c) => c.to_params(),
        }
    }

    /// Re-run normalisation on the current config
    pub fn normalize(&mut self) {
        *self = Self::from_raw(self.kind().name(), &self.config_params());
    }
}

/// Wire shape: `{ "type": "...", "config": { ... } }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawStepFx {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    config: ParamValue,
}

impl From<RawStepFx> for StepFx {
    fn from(raw: RawStepFx) -> Self {
        StepFx::from_raw(&raw.kind, &raw.config)
    }
}

impl From<StepFx> for RawStepFx {
    fn from(fx: StepFx) -> Self {
        RawStepFx {
            kind: fx.kind().name().to_string(),
            config: fx.config_params(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_is_lenient() {
        assert_eq!(StepFxKind::parse("Delay"), StepFxKind::Delay);
        assert_eq!(StepFxKind::parse(" duck "), StepFxKind::Duck);
        assert_eq!(StepFxKind::parse("multiband-duck"), StepFxKind::MultibandDuck);
        assert_eq!(StepFxKind::parse("multibandDuck"), StepFxKind::MultibandDuck);
        assert_eq!(StepFxKind::parse("sample_hold"), StepFxKind::SampleHold);
        assert_eq!(StepFxKind::parse(""), StepFxKind::None);
        assert_eq!(StepFxKind::parse("reverb"), StepFxKind::None);
    }

    #[test]
    fn test_offset_keys() {
        assert_eq!(StepFxKind::MultibandDuck.key(), "multibandduck");
        assert_eq!(StepFxKind::offset_key("Multiband-Duck"), "multibandduck");
        assert_eq!(StepFxKind::Delay.key(), "delay");
    }

    #[test]
    fn test_clamp_number() {
        assert_eq!(clamp_number(Some(&ParamValue::Number(5.0)), 0.0, 1.0, 0.5), 1.0);
        assert_eq!(clamp_number(Some(&ParamValue::Number(f64::NAN)), 0.0, 1.0, 0.5), 0.5);
        assert_eq!(clamp_number(Some(&ParamValue::Text("0.25".into())), 0.0, 1.0, 0.5), 0.25);
        assert_eq!(clamp_number(Some(&ParamValue::Bool(true)), 0.0, 1.0, 0.5), 0.5);
        assert_eq!(clamp_number(None, 0.0, 1.0, 0.5), 0.5);
        assert_eq!(clamp_int(Some(&ParamValue::Number(2.6)), 0, 8, 2), 3);
        assert_eq!(clamp_int(Some(&ParamValue::Number(99.0)), 0, 8, 2), 8);
    }

    #[test]
    fn test_serde_roundtrip_and_repair() {
        let json = r#"{"type":"delay","config":{"mix":3,"repeats":2.4}}"#;
        let fx: StepFx = serde_json::from_str(json).unwrap();
        match &fx {
            StepFx::Delay(c) => {
                assert_eq!(c.mix, 1.0);
                assert_eq!(c.repeats, 2);
                assert_eq!(c.feedback, 0.45);
            }
            other => panic!("unexpected fx {:?}", other),
        }

        let back = serde_json::to_string(&fx).unwrap();
        let again: StepFx = serde_json::from_str(&back).unwrap();
        assert_eq!(fx, again);
    }

    #[test]
    fn test_unknown_type_becomes_none() {
        let fx: StepFx = serde_json::from_str(r#"{"type":"chorus"}"#).unwrap();
        assert!(fx.is_none());
        let fx: StepFx = serde_json::from_str("{}").unwrap();
        assert!(fx.is_none());
    }

    #[test]
    fn test_create_uses_defaults() {
        match StepFx::create(StepFxKind::Duck) {
            StepFx::Duck(c) => assert_eq!(c.depth_db, 12.0),
            other => panic!("unexpected fx {:?}", other),
        }
    }
}
