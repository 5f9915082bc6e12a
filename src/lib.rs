// MyMusic Groove - Library exports for tests, benchmarks and the headless player

pub mod audio;
pub mod config;
pub mod error;
pub mod messaging;
pub mod model;
pub mod modulation;
pub mod sequencer;
pub mod stepfx;

// Re-export commonly used types for convenience
pub use audio::{AudioClock, ManualClock, SampleClock, SystemClock, TriggerHit, TriggerLog, TriggerSink};
pub use config::SequencerConfig;
pub use error::{ConfigError, PatternError, PlaybackError};
pub use messaging::{Command, Notification};
pub use model::{EngineKind, Note, ParamPath, ParamValue, Pattern, Song, Step, Track, TrackId, TrackMode};
pub use modulation::{ModTarget, Modulator};
pub use sequencer::{
    ArpConfig, ArpDirection, Chain, ChainSlot, LookaheadScheduler, PlaybackThread, Sequencer,
    SharedTransportState, Tempo, Tick, TickReport, TransportState,
};
