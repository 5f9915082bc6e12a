// Sequencer - per-tick orchestration
//
// For every tick: advance each track, evaluate its modulators, resolve the
// step effect and arpeggiator, shift the parameters, issue the hits, revert.
// After all tracks ran, a wrap of the first track counts one pattern loop
// for the chain.

use crate::audio::trigger::{TriggerHit, TriggerSink};
use crate::config::SequencerConfig;
use crate::model::song::Song;
use crate::model::track::{Track, TrackMode};
use crate::modulation::{self, ModOffsets, ModulatedTrack, NoteKey};
use crate::sequencer::arpeggiator::{ArpConfig, ArpNote, arpeggiate, chance_passes};
use crate::sequencer::scheduler::{LookaheadScheduler, Tick};
use crate::sequencer::timeline::Tempo;
use crate::sequencer::transport::SharedTransportState;
use crate::stepfx::{FxContext, FxEvent, StepFxPlan, evaluate_step_fx};
use log::{debug, error, trace};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub step_index: u64,
    pub time: f64,
    /// Hits sent to the sink: primary hits, echoes and arpeggio notes
    pub hits: usize,
    /// New chain slot when the chain moved on this tick
    pub chain_pos: Option<usize>,
}

/// A piano-roll note after note offsets were applied
#[derive(Debug, Clone, Copy)]
struct ResolvedNote {
    pitch: i32,
    velocity: f64,
    chance: f64,
    /// Length in steps
    length: f64,
}

pub struct Sequencer {
    song: Song,
    scheduler: LookaheadScheduler,
    config: SequencerConfig,
    rng: StdRng,
    transport: Arc<SharedTransportState>,
}

impl Sequencer {
    pub fn new(mut song: Song, mut config: SequencerConfig) -> Self {
        config.validate();
        song.normalize();
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            song,
            scheduler: LookaheadScheduler::new(config.schedule_ahead_secs),
            config,
            rng,
            transport: SharedTransportState::new(),
        }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Direct access for edits; call the model's `normalize` after raw edits
    pub fn song_mut(&mut self) -> &mut Song {
        &mut self.song
    }

    pub fn into_song(self) -> Song {
        self.song
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &LookaheadScheduler {
        &self.scheduler
    }

    pub fn transport(&self) -> Arc<SharedTransportState> {
        Arc::clone(&self.transport)
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Start playback at `bpm` from audio-clock time `now`; false if already playing
    pub fn start(&mut self, bpm: f64, now: f64) -> bool {
        let tempo = Tempo::sanitized(bpm, self.config.default_bpm, self.config.max_bpm);
        if !self.scheduler.start(tempo, now) {
            return false;
        }
        self.transport.set_started(tempo.bpm());
        self.transport.publish_chain_pos(self.song.chain.pos);
        debug!("Transport started at {}", tempo);
        true
    }

    /// Halt tick emission and reset every playhead
    ///
    /// Hits already handed to the sink are not recalled. Safe to call
    /// repeatedly.
    pub fn stop(&mut self) -> bool {
        let was_running = self.scheduler.stop();
        self.song.reset_positions();
        self.transport.set_stopped();
        if was_running {
            debug!("Transport stopped");
        }
        was_running
    }

    /// Jump to a chain slot now, reseeding its repeat countdown
    pub fn goto_chain_slot(&mut self, index: isize) -> bool {
        let loaded = self.song.goto_chain_slot(index);
        self.transport.publish_chain_pos(self.song.chain.pos);
        loaded
    }

    pub fn set_follow_chain(&mut self, follow: bool) {
        self.song.set_follow_chain(follow);
    }

    pub fn set_loop_chain(&mut self, looping: bool) {
        self.song.set_loop_chain(looping);
    }

    /// Process every tick that entered the lookahead window by `now`
    pub fn poll<S: TriggerSink + ?Sized>(&mut self, now: f64, sink: &mut S) -> Vec<TickReport> {
        let mut due = Vec::new();
        self.scheduler.poll(now, |tick| due.push(tick));
        due.into_iter()
            .map(|tick| self.process_tick(tick, sink))
            .collect()
    }

    /// Run one tick against every track
    pub fn process_tick<S: TriggerSink + ?Sized>(&mut self, tick: Tick, sink: &mut S) -> TickReport {
        let step_duration = self.scheduler.step_duration();
        self.song.apply_mixer();

        let rng = &mut self.rng;
        let mut hits = 0;
        let mut anchor_wrapped = false;
        for (index, track) in self.song.tracks.iter_mut().enumerate() {
            let advance = track.advance_position();
            if index == 0 {
                anchor_wrapped = advance.wrapped;
            }
            let offsets = modulation::evaluate(track, tick.time, tick.step_index, rng);
            let ctx = FxContext {
                step: advance.pos,
                time: tick.time,
                step_duration,
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                play_track(track, offsets.as_ref(), &ctx, rng, sink)
            }));
            match outcome {
                Ok(count) => hits += count,
                Err(_) => error!(
                    "Trigger sink panicked on {} at step {}, tick abandoned for this track",
                    track.id, advance.pos
                ),
            }
        }

        let chain_pos = if anchor_wrapped {
            self.song.on_pattern_completed()
        } else {
            None
        };
        if let Some(pos) = chain_pos {
            debug!("Chain advanced to slot {}", pos);
            self.transport.publish_chain_pos(pos);
        }
        self.transport.publish_tick(tick.step_index);
        trace!(
            "tick {} at {:.4}s: {} hits",
            tick.step_index, tick.time, hits
        );

        TickReport {
            step_index: tick.step_index,
            time: tick.time,
            hits,
            chain_pos,
        }
    }
}

fn play_track<S: TriggerSink + ?Sized>(
    track: &mut Track,
    offsets: Option<&ModOffsets>,
    ctx: &FxContext,
    rng: &mut StdRng,
    sink: &mut S,
) -> usize {
    let (hits, plan) = match track.mode {
        TrackMode::Steps => plan_step(track, offsets, ctx, rng),
        TrackMode::Piano => plan_notes(track, offsets, ctx, rng),
    };
    if hits.is_empty() && plan.is_empty() {
        return 0;
    }

    let modulated = ModulatedTrack::apply(track, offsets.map(|o| &o.params));
    for hit in &hits {
        sink.trigger(&modulated, *hit);
    }
    for echo in &plan.echoes {
        sink.trigger(&modulated, *echo);
    }
    for envelope in &plan.envelopes {
        trace!(
            "{:?} envelope on {} at {:.4}s",
            envelope.control, modulated.id, envelope.start
        );
        sink.schedule_gain(&modulated, *envelope);
    }
    hits.len() + plan.echoes.len()
}

/// Step mode: one hit (or an arpeggio of the root) when the step is on
fn plan_step(
    track: &mut Track,
    offsets: Option<&ModOffsets>,
    ctx: &FxContext,
    rng: &mut StdRng,
) -> (Vec<TriggerHit>, StepFxPlan) {
    let velocity = match track.steps.get(ctx.step) {
        Some(step) if step.on => step.velocity(),
        _ => return (Vec::new(), StepFxPlan::default()),
    };
    let event = FxEvent {
        velocity,
        semitones: 0,
        gate: None,
    };
    let plan = evaluate_step_fx(
        &track.steps[ctx.step].fx,
        offsets,
        &[event],
        ctx,
        &mut track.fx_state,
        rng,
    );

    let hits = if track.arp.enabled {
        let root = ArpNote {
            pitch: 0,
            velocity,
            chance: 1.0,
        };
        arp_hits(&[root], &track.arp, ctx, plan.velocity_offset, rng)
    } else {
        let velocity = (velocity + plan.velocity_offset).clamp(0.0, 1.0);
        if velocity > 0.0 {
            vec![TriggerHit {
                step: ctx.step,
                velocity,
                semitones: 0,
                time: ctx.time,
                gate: None,
            }]
        } else {
            Vec::new()
        }
    };
    (hits, plan)
}

/// Piano mode: every note starting here, through the arpeggiator when enabled
///
/// Notes use the step effect of the step they start on.
fn plan_notes(
    track: &mut Track,
    offsets: Option<&ModOffsets>,
    ctx: &FxContext,
    rng: &mut StdRng,
) -> (Vec<TriggerHit>, StepFxPlan) {
    let notes = resolve_notes(track, offsets, ctx.step);
    if notes.is_empty() {
        return (Vec::new(), StepFxPlan::default());
    }

    let arp = track.arp;
    let playing: Vec<ResolvedNote> = if arp.enabled {
        notes.clone()
    } else {
        notes
            .iter()
            .copied()
            .filter(|note| chance_passes(note.chance, rng))
            .collect()
    };
    let events: Vec<FxEvent> = playing
        .iter()
        .map(|note| FxEvent {
            velocity: note.velocity,
            semitones: note.pitch,
            gate: Some(note.length * ctx.step_duration),
        })
        .collect();
    let plan = match track.steps.get(ctx.step) {
        Some(step) if !events.is_empty() => {
            evaluate_step_fx(&step.fx, offsets, &events, ctx, &mut track.fx_state, rng)
        }
        _ => StepFxPlan::default(),
    };

    let hits = if arp.enabled {
        let arp_notes: Vec<ArpNote> = notes
            .iter()
            .map(|note| ArpNote {
                pitch: note.pitch,
                velocity: note.velocity,
                chance: note.chance,
            })
            .collect();
        arp_hits(&arp_notes, &arp, ctx, plan.velocity_offset, rng)
    } else {
        playing
            .iter()
            .filter_map(|note| {
                let velocity = (note.velocity + plan.velocity_offset).clamp(0.0, 1.0);
                (velocity > 0.0).then(|| TriggerHit {
                    step: ctx.step,
                    velocity,
                    semitones: note.pitch,
                    time: ctx.time,
                    gate: Some(note.length * ctx.step_duration),
                })
            })
            .collect()
    };
    (hits, plan)
}

fn resolve_notes(track: &Track, offsets: Option<&ModOffsets>, step: usize) -> Vec<ResolvedNote> {
    track
        .notes
        .iter()
        .filter(|note| note.start == step)
        .map(|note| {
            let offset = offsets
                .and_then(|o| o.note(NoteKey { step, pitch: note.pitch }))
                .copied()
                .unwrap_or_default();
            let max_length = track.length.saturating_sub(note.start).max(1) as f64;
            ResolvedNote {
                pitch: note.pitch,
                velocity: finite_or(note.vel + offset.vel, note.vel).clamp(0.0, 1.0),
                chance: finite_or(note.chance + offset.chance, note.chance).clamp(0.0, 1.0),
                length: finite_or(note.length as f64 + offset.length, note.length as f64)
                    .clamp(1.0, max_length),
            }
        })
        .collect()
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

fn arp_hits(
    notes: &[ArpNote],
    arp: &ArpConfig,
    ctx: &FxContext,
    velocity_offset: f64,
    rng: &mut StdRng,
) -> Vec<TriggerHit> {
    arpeggiate(notes, arp, ctx.step_duration, velocity_offset, rng)
        .into_iter()
        .map(|hit| TriggerHit {
            step: ctx.step,
            velocity: hit.velocity,
            semitones: hit.pitch,
            time: ctx.time + hit.offset,
            gate: Some(hit.gate),
        })
        .collect()
}
