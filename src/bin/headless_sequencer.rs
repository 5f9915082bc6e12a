//! Headless sequencer
//!
//! Plays a small demo song against the wall clock and logs every trigger
//! instead of rendering audio.
//!
//! Usage: `headless_sequencer [config.ron|config.json] [seconds]`

use log::{debug, info};
use mymusic_groove::audio::trigger::GainEnvelope;
use mymusic_groove::messaging::Notification;
use mymusic_groove::model::{EngineKind, Note, ParamValue, Song, Step, Track, TrackMode};
use mymusic_groove::modulation::{LfoOptions, LfoShape, ModSource, Modulator};
use mymusic_groove::sequencer::{ArpDirection, PlaybackThread, Sequencer};
use mymusic_groove::stepfx::StepFx;
use mymusic_groove::{SequencerConfig, SystemClock, TriggerHit, TriggerSink};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::thread;
use std::time::Duration;

/// Sink that prints what a sound engine would play
#[derive(Default)]
struct LoggingSink {
    hits: usize,
    envelopes: usize,
}

impl TriggerSink for LoggingSink {
    fn trigger(&mut self, track: &Track, hit: TriggerHit) {
        self.hits += 1;
        if track.is_audible() {
            info!(
                "{:>8.3}s  {:<6} step {:>2}  vel {:.2}  semis {:+}",
                hit.time, track.name, hit.step, hit.velocity, hit.semitones
            );
        }
    }

    fn schedule_gain(&mut self, track: &Track, envelope: GainEnvelope) {
        self.envelopes += 1;
        debug!(
            "{:>8.3}s  {:<6} {:?} to {:.2}",
            envelope.start, track.name, envelope.control, envelope.target
        );
    }
}

fn demo_song() -> Song {
    let mut song = Song::new();

    let kick = song.add_track("Kick", EngineKind::Kick808, 16);
    let hat = song.add_track("Hat", EngineKind::Hat808, 16);
    let bass = song.add_track("Bass", EngineKind::Synth, 16);

    if let Some(track) = song.track_mut(kick) {
        for i in (0..16).step_by(4) {
            track.steps[i] = Step::on(1.0);
        }
        track.steps[12].fx = StepFx::from_raw(
            "delay",
            &ParamValue::from_pairs([("repeats", ParamValue::Number(3.0))]),
        );
    }
    if let Some(track) = song.track_mut(hat) {
        for i in (2..16).step_by(4) {
            track.steps[i] = Step::on(0.7);
            track.steps[i].fx = StepFx::from_raw("duck", &ParamValue::node());
        }
    }
    if let Some(track) = song.track_mut(bass) {
        track.mode = TrackMode::Piano;
        for pitch in [0, 3, 7] {
            track.notes.push(Note::new(0, 4, pitch, 0.8));
        }
        track.notes.push(Note::new(8, 2, -5, 0.9).with_chance(0.5));
        track.arp.enabled = true;
        track.arp.direction = ArpDirection::UpDown;
        track.arp.octaves = 2;
    }

    let sweep = LfoOptions {
        rate: 0.5,
        shape: LfoShape::Triangle,
        ..LfoOptions::default()
    };
    song.add_modulator(hat, Modulator::new(ModSource::Lfo(sweep), "hat808.hpf", 2000.0));
    song.add_modulator(bass, Modulator::sample_hold("synth.cutoff", 800.0));

    // Second pattern: same groove, kick on every other beat only
    song.add_pattern(16);
    song.add_pattern(16);
    if let Some(track) = song.track_mut(kick) {
        track.steps[4] = Step::default();
        track.steps[12] = Step::default();
    }
    song.chain_push(0, 2);
    song.chain_push(1, 1);
    song.set_loop_chain(true);
    song.set_follow_chain(true);
    song.goto_chain_slot(0);
    song
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => SequencerConfig::load(path)?,
        None => SequencerConfig::default(),
    };
    let seconds: f64 = match args.next() {
        Some(raw) => raw.parse()?,
        None => 8.0,
    };

    TermLogger::init(
        config.level_filter(),
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let bpm = config.default_bpm;
    let sequencer = Sequencer::new(demo_song(), config);
    let mut playback = PlaybackThread::spawn(sequencer, SystemClock::new(), LoggingSink::default())?;

    info!("Playing demo song for {:.1}s", seconds);
    playback.start(bpm)?;

    let mut elapsed = 0.0;
    while elapsed < seconds {
        thread::sleep(Duration::from_millis(250));
        elapsed += 0.25;
        for notification in playback.drain_notifications() {
            match notification {
                Notification::ChainAdvanced { pos } => info!("Chain slot {}", pos),
                Notification::Started { bpm } => info!("Started at {:.1} BPM", bpm),
                Notification::Stopped => info!("Stopped"),
                Notification::Tick { .. } => {}
            }
        }
    }

    let (sequencer, sink) = playback.shutdown()?;
    info!(
        "Done: {} hits, {} gain envelopes, chain slot {}",
        sink.hits,
        sink.envelopes,
        sequencer.song().chain.pos
    );
    Ok(())
}
