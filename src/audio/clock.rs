// Audio clock - read-only monotonic time sources for the scheduler
// The sequencer never blocks on or controls the clock, it only reads `now()`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic audio-clock in seconds
pub trait AudioClock {
    fn now(&self) -> f64;
}

/// Clock driven by an audio callback counting rendered frames
#[derive(Clone)]
pub struct SampleClock {
    /// Current sample position (incremented by audio callback)
    sample_position: Arc<AtomicU64>,
    /// Sample rate (for timestamp conversions)
    sample_rate: f64,
}

impl SampleClock {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_position: Arc::new(AtomicU64::new(0)),
            sample_rate: if sample_rate.is_finite() && sample_rate > 0.0 {
                sample_rate
            } else {
                48000.0
            },
        }
    }

    /// Get current sample position
    pub fn current_sample(&self) -> u64 {
        self.sample_position.load(Ordering::Relaxed)
    }

    /// Advance sample position (called from audio callback)
    pub fn advance(&self, frames: usize) {
        self.sample_position
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Convert an absolute clock time into a sample position
    pub fn seconds_to_samples(&self, seconds: f64) -> u64 {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        (seconds * self.sample_rate).round() as u64
    }

    /// Samples between now and an absolute clock time (0 if already past)
    pub fn samples_until(&self, seconds: f64) -> u32 {
        let target = self.seconds_to_samples(seconds);
        let delta = target.saturating_sub(self.current_sample());
        delta.min(u32::MAX as u64) as u32
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

impl AudioClock for SampleClock {
    fn now(&self) -> f64 {
        self.current_sample() as f64 / self.sample_rate
    }
}

/// Clock that only moves when told to (tests, offline rendering)
#[derive(Clone, Default)]
pub struct ManualClock {
    seconds_bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        let clock = Self::default();
        clock.set(start);
        clock
    }

    /// Jump to an absolute time; going backwards is ignored
    pub fn set(&self, seconds: f64) {
        if !seconds.is_finite() || seconds < self.now() {
            return;
        }
        self.seconds_bits
            .store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, seconds: f64) {
        if seconds > 0.0 {
            self.set(self.now() + seconds);
        }
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds_bits.load(Ordering::Relaxed))
    }
}

/// Wall-clock backed clock for headless playback
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_clock_creation() {
        let clock = SampleClock::new(48000.0);
        assert_eq!(clock.current_sample(), 0);
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn test_sample_clock_advance() {
        let clock = SampleClock::new(48000.0);
        clock.advance(24000);
        assert!((clock.now() - 0.5).abs() < 1e-12);
        clock.advance(24000);
        assert!((clock.now() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_samples_until() {
        let clock = SampleClock::new(48000.0);
        clock.advance(48000);

        // 10ms ahead = 480 samples @ 48kHz
        assert_eq!(clock.samples_until(1.01), 480);
        // In the past: play immediately
        assert_eq!(clock.samples_until(0.5), 0);
    }

    #[test]
    fn test_invalid_sample_rate_falls_back() {
        let clock = SampleClock::new(0.0);
        assert_eq!(clock.sample_rate(), 48000.0);
    }

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new(1.0);
        clock.advance(0.25);
        assert_eq!(clock.now(), 1.25);

        clock.set(0.5);
        assert_eq!(clock.now(), 1.25);

        clock.set(f64::NAN);
        assert_eq!(clock.now(), 1.25);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock::new();
        let a = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.now() > a);
    }
}
