// Module model - tracks, steps, notes, patterns and the song
//
// Every entity is built through a constructor or repaired by `normalize`;
// malformed input is clamped or defaulted, never rejected.

pub mod effects;
pub mod mixer;
pub mod note;
pub mod params;
pub mod pattern;
pub mod song;
pub mod step;
pub mod track;

pub use effects::{Compression, Eq3, TrackEffects};
pub use mixer::{MixerState, apply_mixer};
pub use note::Note;
pub use params::{ParamPath, ParamValue};
pub use pattern::Pattern;
pub use song::Song;
pub use step::Step;
pub use track::{EngineKind, MAX_TRACK_STEPS, MIN_TRACK_STEPS, StepAdvance, Track, TrackId, TrackMode};
