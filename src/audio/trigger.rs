// Trigger interface - the boundary between the sequencer and the sound engine
//
// The sequencer never renders audio. For every decision it calls a sink with
// an absolute audio-clock time; echoes and gain envelopes use the same
// absolute timestamps, so they inherit the scheduler's sample accuracy.

use crate::model::track::{EngineKind, Track, TrackId};

/// One sound to fire at an absolute audio-clock time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerHit {
    /// Step position of the track when the hit was decided
    pub step: usize,
    /// Velocity in [0, 1]
    pub velocity: f64,
    /// Semitone offset relative to the engine's base pitch
    pub semitones: i32,
    /// Absolute audio-clock time in seconds
    pub time: f64,
    /// Optional note length in seconds
    pub gate: Option<f64>,
}

/// Gain controls on a track bus that step effects may automate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GainControl {
    /// Linear duck gain (1.0 = untouched)
    Duck,
    /// Low-shelf duck band gain in dB (0.0 = untouched)
    DuckLow,
    /// Peaking duck band gain in dB
    DuckMid,
    /// High-shelf duck band gain in dB
    DuckHigh,
}

/// A point on a scheduled gain automation curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainPoint {
    pub time: f64,
    pub level: f64,
}

/// Attack-hold-release automation for one gain control
///
/// The level ramps linearly from `rest` to `target` over `attack`, stays at
/// `target` for `hold`, then ramps back to `rest` over `release`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainEnvelope {
    pub control: GainControl,
    pub start: f64,
    pub attack: f64,
    pub hold: f64,
    pub release: f64,
    pub rest: f64,
    pub target: f64,
}

impl GainEnvelope {
    /// Breakpoints: start, end of attack, end of hold, end of release
    pub fn points(&self) -> [GainPoint; 4] {
        let attack_end = self.start + self.attack;
        let hold_end = attack_end + self.hold;
        let release_end = hold_end + self.release;
        [
            GainPoint { time: self.start, level: self.rest },
            GainPoint { time: attack_end, level: self.target },
            GainPoint { time: hold_end, level: self.target },
            GainPoint { time: release_end, level: self.rest },
        ]
    }

    pub fn end_time(&self) -> f64 {
        self.start + self.attack + self.hold + self.release
    }

    /// Level of the curve at an absolute time
    pub fn level_at(&self, time: f64) -> f64 {
        let [start, attack_end, hold_end, release_end] = self.points();
        if time <= start.time || time >= release_end.time {
            return self.rest;
        }
        if time < attack_end.time {
            let t = (time - start.time) / self.attack;
            return self.rest + (self.target - self.rest) * t;
        }
        if time <= hold_end.time {
            return self.target;
        }
        let t = (time - hold_end.time) / self.release;
        self.target + (self.rest - self.target) * t
    }
}

/// Consumer of sequencer decisions (the sound engine)
///
/// `track` is passed with the current tick's modulation offsets applied, so
/// the engine sees the modulated parameter tree. Implementations must accept
/// several calls for the same track with different future timestamps.
pub trait TriggerSink {
    fn trigger(&mut self, track: &Track, hit: TriggerHit);

    fn schedule_gain(&mut self, track: &Track, envelope: GainEnvelope);
}

impl<T: TriggerSink + ?Sized> TriggerSink for Box<T> {
    fn trigger(&mut self, track: &Track, hit: TriggerHit) {
        (**self).trigger(track, hit);
    }

    fn schedule_gain(&mut self, track: &Track, envelope: GainEnvelope) {
        (**self).schedule_gain(track, envelope);
    }
}

/// A hit as recorded by [`TriggerLog`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedHit {
    pub track: TrackId,
    pub engine: EngineKind,
    pub audible: bool,
    pub hit: TriggerHit,
}

/// An envelope as recorded by [`TriggerLog`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedEnvelope {
    pub track: TrackId,
    pub envelope: GainEnvelope,
}

/// Sink that records everything it receives, in call order
#[derive(Debug, Clone, Default)]
pub struct TriggerLog {
    pub hits: Vec<LoggedHit>,
    pub envelopes: Vec<LoggedEnvelope>,
}

impl TriggerLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hits for one track, in call order
    pub fn hits_for(&self, track: TrackId) -> Vec<&TriggerHit> {
        self.hits
            .iter()
            .filter(|h| h.track == track)
            .map(|h| &h.hit)
            .collect()
    }

    pub fn clear(&mut self) {
        self.hits.clear();
        self.envelopes.clear();
    }
}

impl TriggerSink for TriggerLog {
    fn trigger(&mut self, track: &Track, hit: TriggerHit) {
        self.hits.push(LoggedHit {
            track: track.id,
            engine: track.engine,
            audible: track.is_audible(),
            hit,
        });
    }

    fn schedule_gain(&mut self, track: &Track, envelope: GainEnvelope) {
        self.envelopes.push(LoggedEnvelope {
            track: track.id,
            envelope,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> GainEnvelope {
        GainEnvelope {
            control: GainControl::Duck,
            start: 1.0,
            attack: 0.1,
            hold: 0.2,
            release: 0.4,
            rest: 1.0,
            target: 0.5,
        }
    }

    #[test]
    fn test_envelope_points() {
        let points = envelope().points();
        assert_eq!(points[0], GainPoint { time: 1.0, level: 1.0 });
        assert!((points[1].time - 1.1).abs() < 1e-12);
        assert_eq!(points[1].level, 0.5);
        assert!((points[2].time - 1.3).abs() < 1e-12);
        assert!((points[3].time - 1.7).abs() < 1e-12);
        assert_eq!(points[3].level, 1.0);
    }

    #[test]
    fn test_envelope_level_at() {
        let env = envelope();
        assert_eq!(env.level_at(0.5), 1.0);
        assert!((env.level_at(1.05) - 0.75).abs() < 1e-9);
        assert_eq!(env.level_at(1.2), 0.5);
        assert!((env.level_at(1.5) - 0.75).abs() < 1e-9);
        assert_eq!(env.level_at(2.0), 1.0);
    }

    #[test]
    fn test_zero_length_segments() {
        let env = GainEnvelope {
            attack: 0.0,
            hold: 0.0,
            release: 0.0,
            ..envelope()
        };
        assert_eq!(env.end_time(), env.start);
        assert_eq!(env.level_at(1.0), 1.0);
    }

    #[test]
    fn test_log_records_hits() {
        let track = Track::new(TrackId(3), "Kick", EngineKind::Kick808, 16);
        let mut log = TriggerLog::new();
        let hit = TriggerHit {
            step: 0,
            velocity: 0.8,
            semitones: 0,
            time: 0.5,
            gate: None,
        };
        log.trigger(&track, hit);
        log.schedule_gain(&track, envelope());

        assert_eq!(log.hits.len(), 1);
        assert_eq!(log.hits[0].engine, EngineKind::Kick808);
        assert_eq!(log.hits_for(TrackId(3)), vec![&hit]);
        assert_eq!(log.envelopes.len(), 1);

        log.clear();
        assert!(log.hits.is_empty());
    }
}
