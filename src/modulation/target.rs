// Modulation targets - where a modulator's delta lands
//
// Targets are written as dot paths. They are resolved once, when the
// modulator is built or normalised, into one of three buckets.

use super::offsets::{NoteField, NoteKey};
use crate::model::params::ParamPath;
use crate::stepfx::StepFxKind;
use log::warn;
use std::fmt;

const EFFECT_PREFIXES: [&str; 4] = ["fx", "stepfx", "effects", "effect"];

/// Resolved destination of a modulator
#[derive(Debug, Clone, PartialEq)]
pub enum ModTarget {
    /// Leaf of the track's parameter tree
    Param(ParamPath),
    /// Field of a step-effect config, bucketed by effect key
    Effect { key: String, path: ParamPath },
    /// Attribute of the piano-roll note at `note`
    Note { note: NoteKey, field: NoteField },
    /// Path that cannot address anything; kept so it round-trips
    Invalid(ParamPath),
}

impl ModTarget {
    pub fn parse(raw: &str) -> Self {
        Self::resolve(ParamPath::parse(raw))
    }

    /// Classify a path
    ///
    /// `fx.<type>[.config].<field...>` routes to an effect bucket,
    /// `note.<step>.<pitch>.<field>` to a note, anything else to the
    /// parameter tree.
    pub fn resolve(path: ParamPath) -> Self {
        let segments = path.segments();
        let Some(first) = segments.first() else {
            return ModTarget::Invalid(path);
        };
        let prefix = first.to_ascii_lowercase();

        if EFFECT_PREFIXES.contains(&prefix.as_str()) {
            return Self::resolve_effect(path);
        }
        if prefix == "note" {
            if let Some(target) = Self::resolve_note(segments) {
                return target;
            }
        }
        ModTarget::Param(path)
    }

    fn resolve_effect(path: ParamPath) -> Self {
        let segments = path.segments();
        if segments.len() < 3 {
            warn!("Modulation target '{}' names no effect field, ignoring", path);
            return ModTarget::Invalid(path);
        }
        let key = StepFxKind::offset_key(&segments[1]);
        let mut rest = &segments[2..];
        if rest
            .first()
            .is_some_and(|s| s.eq_ignore_ascii_case("config"))
        {
            rest = &rest[1..];
        }
        if key.is_empty() || rest.is_empty() {
            warn!("Modulation target '{}' names no effect field, ignoring", path);
            return ModTarget::Invalid(path);
        }
        ModTarget::Effect {
            key,
            path: ParamPath::from_segments(rest),
        }
    }

    fn resolve_note(segments: &[String]) -> Option<Self> {
        let [_, step, pitch, field] = segments else {
            return None;
        };
        let step = step.parse::<usize>().ok()?;
        let pitch = pitch.parse::<i32>().ok()?;
        let field = NoteField::parse(field)?;
        Some(ModTarget::Note {
            note: NoteKey { step, pitch },
            field,
        })
    }

    /// Dot path form, as it is stored
    pub fn to_path(&self) -> ParamPath {
        match self {
            ModTarget::Param(path) | ModTarget::Invalid(path) => path.clone(),
            ModTarget::Effect { key, path } => {
                let mut segments = vec!["fx".to_string(), key.clone()];
                segments.extend(path.segments().iter().cloned());
                ParamPath::from_segments(segments)
            }
            ModTarget::Note { note, field } => ParamPath::from_segments([
                "note".to_string(),
                note.step.to_string(),
                note.pitch.to_string(),
                field.name().to_string(),
            ]),
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, ModTarget::Invalid(_))
    }
}

impl Default for ModTarget {
    fn default() -> Self {
        ModTarget::Invalid(ParamPath::default())
    }
}

impl fmt::Display for ModTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_target() {
        assert_eq!(
            ModTarget::parse("synth.cutoff"),
            ModTarget::Param(ParamPath::parse("synth.cutoff"))
        );
    }

    #[test]
    fn test_effect_target_strips_config() {
        let target = ModTarget::parse("fx.Delay.config.mix");
        assert_eq!(
            target,
            ModTarget::Effect {
                key: "delay".to_string(),
                path: ParamPath::parse("mix"),
            }
        );
        assert_eq!(target.to_path().to_string(), "fx.delay.mix");

        let target = ModTarget::parse("stepfx.multibandDuck.lowDepthDb");
        assert!(matches!(target, ModTarget::Effect { ref key, .. } if key == "multibandduck"));
    }

    #[test]
    fn test_short_effect_target_is_invalid() {
        assert!(!ModTarget::parse("fx.delay").is_valid());
        assert!(!ModTarget::parse("effects.delay.config").is_valid());
        assert!(!ModTarget::parse("").is_valid());
        assert!(!ModTarget::parse(" . ").is_valid());
    }

    #[test]
    fn test_note_target() {
        assert_eq!(
            ModTarget::parse("note.4.-2.vel"),
            ModTarget::Note {
                note: NoteKey { step: 4, pitch: -2 },
                field: NoteField::Velocity,
            }
        );
        assert_eq!(ModTarget::parse("note.4.-2.vel").to_path().to_string(), "note.4.-2.vel");
    }

    #[test]
    fn test_malformed_note_target_is_a_param() {
        assert!(matches!(ModTarget::parse("note.x.0.vel"), ModTarget::Param(_)));
        assert!(matches!(ModTarget::parse("note.1.0.pan"), ModTarget::Param(_)));
    }
}
