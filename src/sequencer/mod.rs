// Sequencer module
// Lookahead scheduling, per-tick orchestration, arpeggiator, chain and the
// playback thread that drives them.

pub mod arpeggiator;
pub mod chain;
pub mod driver;
pub mod engine;
pub mod scheduler;
pub mod timeline;
pub mod transport;

pub use arpeggiator::{ArpConfig, ArpDirection, ArpHit, ArpNote, arpeggiate};
pub use chain::{Chain, ChainSlot};
pub use driver::PlaybackThread;
pub use engine::{Sequencer, TickReport};
pub use scheduler::{LookaheadScheduler, Tick};
pub use timeline::{STEPS_PER_BEAT, Tempo};
pub use transport::{SharedTransportState, TransportState};
