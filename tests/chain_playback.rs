// Integration test: chain playback and pattern persistence
//
// The chain moves on only after the anchor track completed the slot's
// repeat count, and every switch loads a fresh copy of the pattern.

use mymusic_groove::audio::TriggerLog;
use mymusic_groove::model::{EngineKind, Pattern, Song, Step};
use mymusic_groove::sequencer::{Sequencer, Tick, TickReport};
use mymusic_groove::{PatternError, SequencerConfig, TrackId};

const LEN: usize = 4;

/// Two patterns: P1 kicks on step 0, P2 also on step 2.
/// Chain: P1 x3, then P2 once.
fn chained_song(looping: bool) -> (Song, TrackId) {
    let mut song = Song::new();
    let kick = song.add_track("Kick", EngineKind::Kick808, LEN);
    if let Some(track) = song.track_mut(kick) {
        track.steps[0] = Step::on(1.0);
    }
    song.add_pattern(LEN);
    song.add_pattern(LEN);
    if let Some(track) = song.track_mut(kick) {
        track.steps[2] = Step::on(0.5);
    }
    song.chain_push(0, 3);
    song.chain_push(1, 1);
    song.set_loop_chain(looping);
    song.set_follow_chain(true);
    song.goto_chain_slot(0);
    (song, kick)
}

fn run(seq: &mut Sequencer, log: &mut TriggerLog, ticks: u64) -> Vec<TickReport> {
    (0..ticks)
        .map(|i| {
            seq.process_tick(
                Tick {
                    step_index: i,
                    time: i as f64 * 0.125,
                },
                log,
            )
        })
        .collect()
}

fn sequencer(song: Song) -> Sequencer {
    let config = SequencerConfig {
        rng_seed: Some(3),
        ..SequencerConfig::default()
    };
    Sequencer::new(song, config)
}

#[test]
fn test_repeats_three_loops_before_advancing() {
    let (song, kick) = chained_song(false);
    assert_eq!(song.current_pattern, 0);
    let mut seq = sequencer(song);
    let mut log = TriggerLog::new();
    let reports = run(&mut seq, &mut log, 16);

    // Wraps happen on ticks 4, 8 and 12; only the third moves the chain
    let advanced: Vec<usize> = reports
        .iter()
        .enumerate()
        .filter(|(_, r)| r.chain_pos.is_some())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(advanced, vec![12]);
    assert_eq!(reports[12].chain_pos, Some(1));
    assert_eq!(seq.song().chain.pos, 1);
    assert_eq!(seq.song().current_pattern, 1);
    assert_eq!(seq.transport().chain_pos(), 1);

    // P1 plays step 0 four times (ticks 0, 4, 8, 12), then P2 starts fresh
    let steps: Vec<(usize, f64)> = log
        .hits_for(kick)
        .iter()
        .map(|h| (h.step, h.velocity))
        .collect();
    assert_eq!(
        steps,
        vec![(0, 1.0), (0, 1.0), (0, 1.0), (0, 1.0), (0, 1.0), (2, 0.5)]
    );
}

#[test]
fn test_chain_waits_when_not_following() {
    let (mut song, _) = chained_song(false);
    song.set_follow_chain(false);
    let mut seq = sequencer(song);
    let mut log = TriggerLog::new();
    let reports = run(&mut seq, &mut log, 40);
    assert!(reports.iter().all(|r| r.chain_pos.is_none()));
    assert_eq!(seq.song().chain.pos, 0);
}

#[test]
fn test_looping_chain_returns_to_first_slot() {
    let (song, _) = chained_song(true);
    let mut seq = sequencer(song);
    let mut log = TriggerLog::new();
    let reports = run(&mut seq, &mut log, 24);

    let moves: Vec<(usize, usize)> = reports
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.chain_pos.map(|pos| (i, pos)))
        .collect();
    // P2 is loaded on tick 12, starts on tick 13 and wraps on tick 17
    assert_eq!(moves, vec![(12, 1), (17, 0)]);
    assert_eq!(seq.song().current_pattern, 0);
}

#[test]
fn test_manual_navigation_reseeds_countdown() {
    let (song, _) = chained_song(false);
    let mut seq = sequencer(song);
    let mut log = TriggerLog::new();
    run(&mut seq, &mut log, 9);

    // Two loops counted; jumping back to slot 0 starts a fresh count of 3
    assert!(seq.goto_chain_slot(0));
    let reports = run(&mut seq, &mut log, 13);
    let advanced: Vec<usize> = reports
        .iter()
        .enumerate()
        .filter(|(_, r)| r.chain_pos.is_some())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(advanced, vec![12]);
}

#[test]
fn test_out_of_range_slots_clamp_without_looping() {
    let (song, _) = chained_song(false);
    let mut seq = sequencer(song);
    assert!(seq.goto_chain_slot(9));
    assert_eq!(seq.song().chain.pos, 1);
    assert!(seq.goto_chain_slot(-4));
    assert_eq!(seq.song().chain.pos, 0);
}

#[test]
fn test_pattern_json_roundtrip_and_errors() {
    let (song, kick) = chained_song(false);
    let json = song.patterns[1].to_json().unwrap();
    let restored = Pattern::from_json(&json).unwrap();
    assert_eq!(restored.length_16ths, LEN);
    let tracks = restored.instantiate();
    let track = tracks.iter().find(|t| t.id == kick).unwrap();
    assert!(track.steps[2].on);
    assert!(track.pos.is_none());

    assert!(matches!(
        Pattern::from_json(r#"{"name":"empty","tracks":[],"len16":16}"#),
        Err(PatternError::Empty)
    ));
    assert!(matches!(
        Pattern::from_json("not json"),
        Err(PatternError::Json(_))
    ));
}
