// Track - one sequencer lane: steps or piano-roll notes plus sound settings

use crate::model::effects::TrackEffects;
use crate::model::mixer::MixerState;
use crate::model::note::Note;
use crate::model::params::ParamValue;
use crate::model::step::Step;
use crate::modulation::{ModIdAllocator, Modulator};
use crate::sequencer::arpeggiator::ArpConfig;
use crate::stepfx::StepFxState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shortest allowed track
pub const MIN_TRACK_STEPS: usize = 1;
/// Longest allowed track
pub const MAX_TRACK_STEPS: usize = 128;

/// Stable track identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

/// Sound engine a track drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Synth,
    Noise,
    Kick808,
    Snare808,
    Hat808,
    Clap909,
    Sampler,
}

impl EngineKind {
    pub const ALL: [EngineKind; 7] = [
        EngineKind::Synth,
        EngineKind::Noise,
        EngineKind::Kick808,
        EngineKind::Snare808,
        EngineKind::Hat808,
        EngineKind::Clap909,
        EngineKind::Sampler,
    ];

    /// Key of this engine's subtree in a track's params
    pub fn name(&self) -> &'static str {
        match self {
            EngineKind::Synth => "synth",
            EngineKind::Noise => "noise",
            EngineKind::Kick808 => "kick808",
            EngineKind::Snare808 => "snare808",
            EngineKind::Hat808 => "hat808",
            EngineKind::Clap909 => "clap909",
            EngineKind::Sampler => "sampler",
        }
    }

    /// Default parameter subtree for this engine
    pub fn default_params(&self) -> ParamValue {
        let n = ParamValue::Number;
        match self {
            EngineKind::Synth => {
                let mut synth = synth_osc_defaults();
                if let ParamValue::Node(map) = &mut synth {
                    map.insert("threeOsc".into(), ParamValue::Bool(false));
                    map.insert("activeOsc".into(), n(0.0));
                    map.insert(
                        "oscillators".into(),
                        ParamValue::List(vec![synth_osc_defaults(); 3]),
                    );
                }
                synth
            }
            EngineKind::Noise => ParamValue::from_pairs([
                ("cutoff", n(4000.0)),
                ("q", n(0.8)),
                ("a", n(0.01)),
                ("d", n(0.2)),
                ("s", n(0.3)),
                ("r", n(0.2)),
                ("gain", n(0.8)),
            ]),
            EngineKind::Kick808 => ParamValue::from_pairs([
                ("freq", n(55.0)),
                ("pitchDecay", n(0.08)),
                ("ampDecay", n(0.45)),
                ("click", n(0.12)),
            ]),
            EngineKind::Snare808 => ParamValue::from_pairs([
                ("tone", n(180.0)),
                ("noise", n(0.6)),
                ("decay", n(0.22)),
            ]),
            EngineKind::Hat808 => {
                ParamValue::from_pairs([("decay", n(0.06)), ("hpf", n(8000.0))])
            }
            EngineKind::Clap909 => ParamValue::from_pairs([
                ("bursts", n(3.0)),
                ("spread", n(0.02)),
                ("decay", n(0.10)),
            ]),
            EngineKind::Sampler => ParamValue::from_pairs([
                ("start", n(0.0)),
                ("end", n(1.0)),
                ("semis", n(0.0)),
                ("gain", n(1.0)),
                ("loop", ParamValue::Bool(false)),
                ("advanced", ParamValue::Bool(false)),
            ]),
        }
    }

    /// Params tree holding every engine's defaults, keyed by engine name
    pub fn all_default_params() -> ParamValue {
        ParamValue::from_pairs(Self::ALL.iter().map(|e| (e.name(), e.default_params())))
    }
}

fn synth_osc_defaults() -> ParamValue {
    let n = ParamValue::Number;
    ParamValue::from_pairs([
        ("cutoff", n(2000.0)),
        ("q", n(1.0)),
        ("a", n(0.01)),
        ("d", n(0.2)),
        ("s", n(0.6)),
        ("r", n(0.2)),
        ("baseFreq", n(220.0)),
        ("wavetable", ParamValue::Bool(false)),
        ("morph", n(0.0)),
    ])
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a track plays from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackMode {
    #[default]
    Steps,
    Piano,
}

/// Result of moving the playhead one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepAdvance {
    pub pos: usize,
    /// True when the track came back to step 0 from a running position
    pub wrapped: bool,
}

fn audible_default() -> bool {
    true
}

/// A sequencer track
///
/// Invariant: `steps.len() == length` and, while playing, `pos < length`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default)]
    pub mode: TrackMode,
    pub length: usize,
    /// Current step, `None` while stopped
    #[serde(skip)]
    pub pos: Option<usize>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub mods: Vec<Modulator>,
    #[serde(default)]
    pub arp: ArpConfig,
    #[serde(default)]
    pub mixer: MixerState,
    #[serde(default)]
    pub params: ParamValue,
    #[serde(default)]
    pub effects: TrackEffects,
    #[serde(skip, default = "audible_default")]
    audible: bool,
    #[serde(skip)]
    pub fx_state: StepFxState,
}

impl Track {
    pub fn new(id: TrackId, name: impl Into<String>, engine: EngineKind, length: usize) -> Self {
        let length = length.clamp(MIN_TRACK_STEPS, MAX_TRACK_STEPS);
        Self {
            id,
            name: name.into(),
            engine,
            mode: TrackMode::Steps,
            length,
            pos: None,
            steps: vec![Step::default(); length],
            notes: Vec::new(),
            mods: Vec::new(),
            arp: ArpConfig::default(),
            mixer: MixerState::default(),
            params: EngineKind::all_default_params(),
            effects: TrackEffects::default(),
            audible: true,
            fx_state: StepFxState::default(),
        }
    }

    /// Repair everything that may have arrived malformed
    pub fn normalize(&mut self) {
        if self.name.trim().is_empty() {
            self.name = "Track".to_string();
        }
        self.length = self.length.clamp(MIN_TRACK_STEPS, MAX_TRACK_STEPS);
        self.steps.resize_with(self.length, Step::default);
        for step in &mut self.steps {
            step.normalize();
        }
        let length = self.length;
        for note in &mut self.notes {
            note.normalize(length);
        }
        self.pos = self.pos.map(|p| p.min(length - 1));
        if !matches!(self.params, ParamValue::Node(_)) {
            self.params = ParamValue::node();
        }
        self.params.fill_defaults(&EngineKind::all_default_params());
        for modulator in &mut self.mods {
            modulator.normalize();
        }
        self.arp.normalize();
        self.mixer.normalize();
        self.effects.normalize();
    }

    /// Change the step count (clamped to 1..=128), keeping existing steps
    pub fn resize_steps(&mut self, new_len: usize) {
        let new_len = new_len.clamp(MIN_TRACK_STEPS, MAX_TRACK_STEPS);
        self.steps.resize_with(new_len, Step::default);
        for step in &mut self.steps {
            step.normalize();
        }
        self.length = new_len;
        self.pos = self.pos.map(|p| p.min(new_len - 1));
        for note in &mut self.notes {
            note.normalize(new_len);
        }
        self.fx_state.sample_hold.retain(|step, _| *step < new_len);
    }

    /// Move the playhead to the next step, wrapping at `length`
    pub fn advance_position(&mut self) -> StepAdvance {
        let length = self.length.max(1);
        let previous = self.pos;
        let pos = previous.map_or(0, |p| (p + 1) % length);
        self.pos = Some(pos);
        StepAdvance {
            pos,
            wrapped: pos == 0 && previous.is_some(),
        }
    }

    /// Back to "not yet started"
    pub fn reset_position(&mut self) {
        self.pos = None;
        for modulator in &mut self.mods {
            modulator.end_run();
        }
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.pos.and_then(|p| self.steps.get(p))
    }

    /// Notes whose start is `step` (a chord when there are several)
    pub fn notes_starting_at(&self, step: usize) -> Vec<&Note> {
        self.notes.iter().filter(|n| n.start == step).collect()
    }

    /// Remove the note at (step, pitch) if present, otherwise add a one-step note
    pub fn toggle_note_at(&mut self, step: usize, pitch: i32, vel: f64) {
        if let Some(idx) = self
            .notes
            .iter()
            .position(|n| n.start == step && n.pitch == pitch)
        {
            self.notes.remove(idx);
            return;
        }
        let mut note = Note::new(step, 1, pitch, vel);
        note.normalize(self.length);
        self.notes.push(note);
    }

    /// Move the end of the note at (step, pitch); it always keeps at least one step
    pub fn stretch_note_ending(&mut self, step: usize, pitch: i32, new_end: usize) {
        let length = self.length;
        if let Some(note) = self
            .notes
            .iter_mut()
            .find(|n| n.start == step && n.pitch == pitch)
        {
            let end = new_end.min(length).max(note.start + 1);
            note.length = end - note.start;
        }
    }

    /// Set a step's velocity through its mirroring mutator
    pub fn set_step_velocity(&mut self, index: usize, velocity: f64) -> Option<f64> {
        self.steps.get_mut(index).map(|s| s.set_velocity(velocity))
    }

    pub fn toggle_step(&mut self, index: usize) {
        if let Some(step) = self.steps.get_mut(index) {
            step.toggle();
        }
    }

    /// Attach a modulator, assigning a `mod-N` id when it has none
    pub fn add_modulator(&mut self, ids: &mut ModIdAllocator, mut modulator: Modulator) -> &Modulator {
        modulator.id = ids.assign(&modulator.id);
        modulator.normalize();
        self.mods.push(modulator);
        let last = self.mods.len() - 1;
        &self.mods[last]
    }

    pub fn remove_modulator(&mut self, id: &str) -> Option<Modulator> {
        let idx = self.mods.iter().position(|m| m.id == id)?;
        Some(self.mods.remove(idx))
    }

    /// Whether the mixer currently lets this track through
    pub fn is_audible(&self) -> bool {
        self.audible
    }

    pub(crate) fn set_audible(&mut self, audible: bool) {
        self.audible = audible;
    }

    /// Drop runtime state that must not leak across transport runs
    pub fn clear_runtime_state(&mut self) {
        self.pos = None;
        self.fx_state.clear();
        for modulator in &mut self.mods {
            modulator.reset_state();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::params::ParamPath;

    fn track() -> Track {
        Track::new(TrackId(1), "Lead", EngineKind::Synth, 16)
    }

    #[test]
    fn test_new_track() {
        let track = track();
        assert_eq!(track.length, 16);
        assert_eq!(track.steps.len(), 16);
        assert_eq!(track.pos, None);
        assert_eq!(track.mixer.gain, 0.9);
        assert!(track.is_audible());
        assert_eq!(
            track.params.number_at(&ParamPath::parse("synth.oscillators.2.cutoff")),
            Some(2000.0)
        );
        assert_eq!(
            track.params.number_at(&ParamPath::parse("kick808.freq")),
            Some(55.0)
        );
    }

    #[test]
    fn test_length_is_clamped() {
        assert_eq!(Track::new(TrackId(1), "x", EngineKind::Noise, 0).length, 1);
        assert_eq!(Track::new(TrackId(1), "x", EngineKind::Noise, 500).length, 128);
    }

    #[test]
    fn test_advance_position_wraps() {
        let mut track = Track::new(TrackId(1), "x", EngineKind::Hat808, 3);
        let first = track.advance_position();
        assert_eq!(first, StepAdvance { pos: 0, wrapped: false });
        track.advance_position();
        track.advance_position();
        let wrap = track.advance_position();
        assert_eq!(wrap, StepAdvance { pos: 0, wrapped: true });
    }

    #[test]
    fn test_resize_steps() {
        let mut track = track();
        track.steps[3] = Step::on(0.5);
        track.pos = Some(12);
        track.notes.push(Note::new(10, 6, 0, 1.0));

        track.resize_steps(8);
        assert_eq!(track.length, 8);
        assert_eq!(track.steps.len(), 8);
        assert_eq!(track.steps[3].velocity(), 0.5);
        assert_eq!(track.pos, Some(7));
        assert_eq!(track.notes[0].start, 7);
        assert_eq!(track.notes[0].length, 1);

        track.resize_steps(32);
        assert_eq!(track.steps.len(), 32);
        assert!(!track.steps[31].on);
    }

    #[test]
    fn test_toggle_note_at() {
        let mut track = track();
        track.toggle_note_at(4, 7, 0.8);
        track.toggle_note_at(4, 0, 0.8);
        assert_eq!(track.notes_starting_at(4).len(), 2);

        track.toggle_note_at(4, 7, 0.8);
        let remaining = track.notes_starting_at(4);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].pitch, 0);
    }

    #[test]
    fn test_stretch_note_ending() {
        let mut track = track();
        track.toggle_note_at(4, 0, 1.0);
        track.stretch_note_ending(4, 0, 8);
        assert_eq!(track.notes[0].length, 4);

        track.stretch_note_ending(4, 0, 100);
        assert_eq!(track.notes[0].length, 12);

        track.stretch_note_ending(4, 0, 2);
        assert_eq!(track.notes[0].length, 1);

        // Unknown note: no-op
        track.stretch_note_ending(5, 0, 9);
        assert_eq!(track.notes.len(), 1);
    }

    #[test]
    fn test_step_helpers() {
        let mut track = track();
        track.toggle_step(2);
        assert!(track.steps[2].on);
        assert_eq!(track.set_step_velocity(2, 0.3), Some(0.3));
        assert_eq!(track.steps[2].velocity(), 0.3);
        assert_eq!(track.set_step_velocity(99, 0.3), None);

        track.toggle_step(2);
        assert!(!track.steps[2].on);
        track.toggle_step(2);
        assert!(track.steps[2].on);
        assert_eq!(track.steps[2].velocity(), 0.3);
    }

    #[test]
    fn test_normalize_repairs_deserialized_track() {
        let json = r#"{
            "id": 4, "name": "", "engine": "kick808", "length": 4,
            "steps": [{"on": true}],
            "notes": [{"start": 9, "length": 3, "pitch": 2}],
            "params": {"kick808": {"freq": "low"}}
        }"#;
        let mut track: Track = serde_json::from_str(json).unwrap();
        track.normalize();

        assert_eq!(track.name, "Track");
        assert_eq!(track.steps.len(), 4);
        assert_eq!(track.steps[0].velocity(), 1.0);
        assert_eq!(track.notes[0].start, 3);
        assert_eq!(track.notes[0].length, 1);
        assert_eq!(track.params.number_at(&ParamPath::parse("kick808.freq")), Some(55.0));
        assert_eq!(track.params.number_at(&ParamPath::parse("synth.cutoff")), Some(2000.0));
        assert!(track.is_audible());
    }

    #[test]
    fn test_serde_skips_runtime_state() {
        let mut track = track();
        track.pos = Some(5);
        let json = serde_json::to_string(&track).unwrap();
        let back: Track = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pos, None);
        assert_eq!(back.steps, track.steps);
        assert_eq!(back.params, track.params);
    }
}
