// Module modulation - LFO and sample & hold sources routed to parameters,
// step-effect configs and piano-roll notes
//
// Modulators are evaluated once per track per tick. Their deltas live only
// for that tick: they are applied, the hits are issued, and they are reverted.

pub mod engine;
pub mod lfo;
pub mod modulator;
pub mod offsets;
pub mod sample_hold;
pub mod target;

pub use engine::evaluate;
pub use lfo::{LfoOptions, LfoShape, LfoState};
pub use modulator::{ModContext, ModIdAllocator, ModSource, ModState, Modulator};
pub use offsets::{ModOffsets, ModulatedTrack, NoteField, NoteKey, NoteOffset, Offset, OffsetTree};
pub use sample_hold::{SampleHoldOptions, SampleHoldState, SampleInput};
pub use target::ModTarget;
