// Transport - Playback state shared with other threads
// The playback thread owns the sequencer; everyone else reads these atomics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Transport state (play/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }
}

/// Shared transport state
/// Thread-safe via atomics; written by the playback thread only
#[derive(Debug)]
pub struct SharedTransportState {
    playing: AtomicBool,
    /// Scheduler step index of the latest emitted tick
    step_index: AtomicU64,
    /// Ticks emitted since the last start
    ticks: AtomicU64,
    /// Tempo of the current run, as f64 bits
    bpm_bits: AtomicU64,
    /// Current chain slot
    chain_pos: AtomicU64,
}

impl SharedTransportState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> TransportState {
        if self.playing.load(Ordering::Acquire) {
            TransportState::Playing
        } else {
            TransportState::Stopped
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state().is_playing()
    }

    pub fn step_index(&self) -> u64 {
        self.step_index.load(Ordering::Relaxed)
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn bpm(&self) -> f64 {
        f64::from_bits(self.bpm_bits.load(Ordering::Relaxed))
    }

    pub fn chain_pos(&self) -> usize {
        self.chain_pos.load(Ordering::Relaxed) as usize
    }

    pub(crate) fn set_started(&self, bpm: f64) {
        self.bpm_bits.store(bpm.to_bits(), Ordering::Relaxed);
        self.step_index.store(0, Ordering::Relaxed);
        self.ticks.store(0, Ordering::Relaxed);
        self.playing.store(true, Ordering::Release);
    }

    pub(crate) fn set_stopped(&self) {
        self.playing.store(false, Ordering::Release);
        self.step_index.store(0, Ordering::Relaxed);
    }

    pub(crate) fn publish_tick(&self, step_index: u64) {
        self.step_index.store(step_index, Ordering::Relaxed);
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn publish_chain_pos(&self, pos: usize) {
        self.chain_pos.store(pos as u64, Ordering::Relaxed);
    }
}

impl Default for SharedTransportState {
    fn default() -> Self {
        Self {
            playing: AtomicBool::new(false),
            step_index: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            bpm_bits: AtomicU64::new(0.0f64.to_bits()),
            chain_pos: AtomicU64::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state() {
        assert!(TransportState::Playing.is_playing());
        assert!(!TransportState::Stopped.is_playing());
        assert_eq!(TransportState::default(), TransportState::Stopped);
    }

    #[test]
    fn test_shared_state_lifecycle() {
        let shared = SharedTransportState::new();
        assert_eq!(shared.state(), TransportState::Stopped);

        shared.set_started(128.0);
        assert!(shared.is_playing());
        assert_eq!(shared.bpm(), 128.0);

        shared.publish_tick(0);
        shared.publish_tick(1);
        assert_eq!(shared.step_index(), 1);
        assert_eq!(shared.tick_count(), 2);

        shared.publish_chain_pos(3);
        assert_eq!(shared.chain_pos(), 3);

        shared.set_stopped();
        assert!(!shared.is_playing());
        assert_eq!(shared.step_index(), 0);
    }
}
