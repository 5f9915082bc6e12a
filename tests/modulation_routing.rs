// Integration test: modulation routing through a running sequencer
//
// Param, effect and note targets each land in their own bucket, are visible
// to the sound engine for exactly one tick, and never persist.

use mymusic_groove::audio::trigger::GainEnvelope;
use mymusic_groove::audio::{TriggerHit, TriggerLog, TriggerSink};
use mymusic_groove::model::{EngineKind, Note, ParamPath, ParamValue, Song, Step, Track, TrackMode};
use mymusic_groove::modulation::{
    self, LfoOptions, ModContext, ModSource, ModTarget, ModulatedTrack, Modulator, OffsetTree,
    SampleHoldOptions,
};
use mymusic_groove::sequencer::{Sequencer, Tick};
use mymusic_groove::stepfx::StepFx;
use mymusic_groove::{SequencerConfig, TrackId};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Constant +1 signal: a stopped sine held at its peak
fn constant(target: &str, amount: f64) -> Modulator {
    let options = LfoOptions {
        rate: 0.0,
        phase: 0.25,
        ..LfoOptions::default()
    };
    Modulator::new(ModSource::Lfo(options), target, amount)
}

fn sequencer(song: Song) -> Sequencer {
    let config = SequencerConfig {
        rng_seed: Some(99),
        ..SequencerConfig::default()
    };
    Sequencer::new(song, config)
}

fn tick(step_index: u64) -> Tick {
    Tick {
        step_index,
        time: step_index as f64 * 0.125,
    }
}

/// Records the value of one parameter as the engine sees it at trigger time
struct ParamRecorder {
    path: ParamPath,
    seen: Vec<Option<f64>>,
}

impl TriggerSink for ParamRecorder {
    fn trigger(&mut self, track: &Track, _hit: TriggerHit) {
        self.seen.push(track.params.number_at(&self.path));
    }

    fn schedule_gain(&mut self, _track: &Track, _envelope: GainEnvelope) {}
}

#[test]
fn test_target_classification() {
    assert!(matches!(ModTarget::parse("hat808.hpf"), ModTarget::Param(_)));
    assert!(matches!(
        ModTarget::parse("fx.Delay.config.mix"),
        ModTarget::Effect { ref key, .. } if key == "delay"
    ));
    assert!(matches!(
        ModTarget::parse("stepfx.multiband-duck.lowDepthDb"),
        ModTarget::Effect { ref key, .. } if key == "multibandduck"
    ));
    assert!(matches!(ModTarget::parse("note.3.-5.vel"), ModTarget::Note { .. }));
    assert!(!ModTarget::parse("fx.delay").is_valid());
}

#[test]
fn test_param_offset_lives_for_one_tick() {
    let mut song = Song::new();
    let hat = song.add_track("Hat", EngineKind::Hat808, 2);
    if let Some(track) = song.track_mut(hat) {
        track.steps[0] = Step::on(0.8);
        track.steps[1] = Step::on(0.8);
    }
    song.add_modulator(hat, constant("hat808.hpf", 1500.0));
    let before = song.tracks[0].params.clone();

    let mut seq = sequencer(song);
    let mut recorder = ParamRecorder {
        path: ParamPath::parse("hat808.hpf"),
        seen: Vec::new(),
    };
    for i in 0..3 {
        seq.process_tick(tick(i), &mut recorder);
    }

    // 8000 default + 1500, never accumulating across ticks
    assert_eq!(recorder.seen, vec![Some(9500.0); 3]);
    assert_eq!(seq.song().tracks[0].params, before);
}

#[test]
fn test_disabled_and_unroutable_modulators_do_nothing() {
    let mut song = Song::new();
    let kick = song.add_track("Kick", EngineKind::Kick808, 1);
    if let Some(track) = song.track_mut(kick) {
        track.steps[0] = Step::on(1.0);
    }
    let mut off = constant("kick808.freq", 20.0);
    off.enabled = false;
    song.add_modulator(kick, off);
    song.add_modulator(kick, constant("fx", 20.0));
    song.add_modulator(kick, constant("kick808.freq", 0.0));

    let mut rng = StdRng::seed_from_u64(0);
    let track = &mut song.tracks[0];
    track.advance_position();
    assert!(modulation::evaluate(track, 0.0, 0, &mut rng).is_none());
}

#[test]
fn test_effect_offset_reshapes_step_effect_without_persisting() {
    let mut song = Song::new();
    let kick = song.add_track("Kick", EngineKind::Kick808, 1);
    if let Some(track) = song.track_mut(kick) {
        track.steps[0] = Step::on(1.0);
        track.steps[0].fx = StepFx::from_raw(
            "delay",
            &ParamValue::from_pairs([
                ("mix", ParamValue::Number(0.5)),
                ("feedback", ParamValue::Number(0.5)),
                ("repeats", ParamValue::Number(3.0)),
            ]),
        );
    }
    // Pushes repeats far past its ceiling; the merged config is re-clamped
    song.add_modulator(kick, constant("fx.delay.config.repeats", 40.0));
    let stored_fx = song.tracks[0].steps[0].fx.clone();

    let mut seq = sequencer(song);
    let mut log = TriggerLog::new();
    let report = seq.process_tick(tick(0), &mut log);

    // One primary hit plus the 8 echoes the clamped config allows
    let hits = log.hits_for(kick);
    assert_eq!(report.hits, 9);
    assert_eq!(hits.len(), 9);
    assert_eq!(seq.song().tracks[0].steps[0].fx, stored_fx);
}

#[test]
fn test_note_offsets_adjust_only_their_note() {
    let mut song = Song::new();
    let synth = song.add_track("Keys", EngineKind::Synth, 4);
    if let Some(track) = song.track_mut(synth) {
        track.mode = TrackMode::Piano;
        track.notes.push(Note::new(0, 1, 0, 0.5));
        track.notes.push(Note::new(0, 1, 7, 0.5));
    }
    song.add_modulator(synth, constant("note.0.7.vel", 0.25));
    song.add_modulator(synth, constant("note.0.7.length", 2.0));
    // Names a note that does not exist
    song.add_modulator(synth, constant("note.2.5.vel", 0.25));

    let mut seq = sequencer(song);
    let mut log = TriggerLog::new();
    seq.process_tick(tick(0), &mut log);

    let hits = log.hits_for(synth);
    assert_eq!(hits.len(), 2);
    let root = **hits.iter().find(|h| h.semitones == 0).unwrap();
    let fifth = **hits.iter().find(|h| h.semitones == 7).unwrap();
    assert_eq!(root.velocity, 0.5);
    assert_eq!(root.gate, Some(0.125));
    assert_eq!(fifth.velocity, 0.75);
    assert_eq!(fifth.gate, Some(0.375));

    // Stored notes untouched
    let notes = &seq.song().tracks[0].notes;
    assert!(notes.iter().all(|n| n.vel == 0.5 && n.length == 1));
}

#[test]
fn test_sample_hold_is_stable_within_a_step() {
    let options = SampleHoldOptions {
        hold: 2,
        ..SampleHoldOptions::default()
    };
    let mut modulator = Modulator::new(ModSource::SampleHold(options), "synth.cutoff", 1.0);
    let mut rng = StdRng::seed_from_u64(5);
    let ctx = |step_index| ModContext {
        now: 0.0,
        step_index,
        step_velocity: 0.0,
    };

    let first = modulator.signal(&ctx(0), &mut rng);
    assert_eq!(modulator.signal(&ctx(0), &mut rng), first);
    assert_eq!(modulator.signal(&ctx(0), &mut rng), first);
    assert!((-1.0..=1.0).contains(&first));
    // Held for a second step, then resampled
    assert_eq!(modulator.signal(&ctx(1), &mut rng), first);
    let third = modulator.signal(&ctx(2), &mut rng);
    assert_eq!(modulator.signal(&ctx(2), &mut rng), third);
}

#[test]
fn test_apply_then_revert_is_byte_identical() {
    let mut track = Track::new(TrackId(1), "Keys", EngineKind::Synth, 16);
    let before = serde_json::to_string(&track.params).unwrap();

    let mut tree = OffsetTree::new();
    tree.add(&ParamPath::parse("synth.cutoff"), 1234.5);
    tree.add(&ParamPath::parse("synth.oscillators.1.q"), -0.3);
    tree.add(&ParamPath::parse("synth.wavetable"), 1.0);
    tree.add(&ParamPath::parse("missing.branch.leaf"), 2.0);
    tree.add(&ParamPath::parse("kick808.freq"), 0.1);

    {
        let modulated = ModulatedTrack::apply(&mut track, Some(&tree));
        assert!(modulated.applied_count() >= 3);
        assert_eq!(
            modulated.params.number_at(&ParamPath::parse("synth.cutoff")),
            Some(3234.5)
        );
    }
    assert_eq!(serde_json::to_string(&track.params).unwrap(), before);
}
