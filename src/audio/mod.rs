// Module audio - clock sources and the trigger boundary to the sound engine

pub mod clock;
pub mod trigger;

pub use clock::{AudioClock, ManualClock, SampleClock, SystemClock};
pub use trigger::{GainControl, GainEnvelope, GainPoint, TriggerHit, TriggerLog, TriggerSink};
