// Song - live tracks, the pattern bank and the chain

use crate::model::mixer::apply_mixer;
use crate::model::pattern::Pattern;
use crate::model::track::{EngineKind, Track, TrackId};
use crate::modulation::{ModIdAllocator, Modulator};
use crate::sequencer::chain::{Chain, ChainSlot};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Everything the sequencer plays
///
/// `tracks` are the live tracks. `patterns` are snapshots; loading one
/// replaces the live tracks with a fresh copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Song {
    pub tracks: Vec<Track>,
    pub patterns: Vec<Pattern>,
    /// Pattern the live tracks were loaded from
    pub current_pattern: usize,
    pub chain: Chain,
    #[serde(skip)]
    mod_ids: ModIdAllocator,
}

impl Song {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repair tracks, chain and id allocation after deserialisation
    pub fn normalize(&mut self) {
        for track in &mut self.tracks {
            track.normalize();
        }
        for pattern in &mut self.patterns {
            pattern.length_16ths = pattern.length_16ths.max(1);
            for track in &mut pattern.tracks {
                track.normalize();
            }
        }
        self.current_pattern = self.clamp_pattern_index(self.current_pattern);
        self.chain.normalize();
        self.observe_mod_ids();
        apply_mixer(&mut self.tracks);
    }

    fn observe_mod_ids(&mut self) {
        let ids = self
            .tracks
            .iter()
            .chain(self.patterns.iter().flat_map(|p| p.tracks.iter()))
            .flat_map(|t| t.mods.iter());
        for modulator in ids {
            self.mod_ids.observe(&modulator.id);
        }
    }

    fn clamp_pattern_index(&self, index: usize) -> usize {
        index.min(self.patterns.len().saturating_sub(1))
    }

    /// Append a track with the next free id
    pub fn add_track(&mut self, name: impl Into<String>, engine: EngineKind, length: usize) -> TrackId {
        let id = TrackId(self.tracks.iter().map(|t| t.id.0 + 1).max().unwrap_or(1));
        self.tracks.push(Track::new(id, name, engine, length));
        apply_mixer(&mut self.tracks);
        id
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    /// Attach a modulator to a track; returns its id
    pub fn add_modulator(&mut self, track: TrackId, modulator: Modulator) -> Option<String> {
        let ids = &mut self.mod_ids;
        let track = self.tracks.iter_mut().find(|t| t.id == track)?;
        Some(track.add_modulator(ids, modulator).id.clone())
    }

    pub fn remove_modulator(&mut self, track: TrackId, id: &str) -> Option<Modulator> {
        self.track_mut(track)?.remove_modulator(id)
    }

    /// Recompute audibility after a mute/solo edit
    pub fn apply_mixer(&mut self) {
        apply_mixer(&mut self.tracks);
    }

    /// Write the live tracks back into the current pattern slot
    pub fn save_current_pattern(&mut self) {
        if self.patterns.is_empty() {
            return;
        }
        let index = self.clamp_pattern_index(self.current_pattern);
        self.current_pattern = index;
        let existing = &self.patterns[index];
        let name = existing.name.clone();
        let length = existing.length_16ths;
        self.patterns[index] = Pattern::capture(name, &self.tracks, length);
    }

    /// Replace the live tracks with a fresh instance of pattern `index`
    /// (clamped into the bank); false when the bank is empty
    pub fn load_pattern(&mut self, index: usize) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let index = self.clamp_pattern_index(index);
        self.current_pattern = index;
        self.tracks = self.patterns[index].instantiate();
        self.observe_mod_ids();
        apply_mixer(&mut self.tracks);
        debug!("Loaded pattern {} ({})", index, self.patterns[index].name);
        true
    }

    /// Snapshot the live tracks as a new pattern and switch to it
    pub fn add_pattern(&mut self, length_16ths: usize) -> usize {
        self.save_current_pattern();
        let name = format!("P{}", self.patterns.len() + 1);
        let length = if length_16ths > 0 { length_16ths } else { 16 };
        self.patterns.push(Pattern::capture(name, &self.tracks, length));
        let index = self.patterns.len() - 1;
        self.load_pattern(index);
        index
    }

    /// Copy pattern `index` to the end of the bank and switch to the copy
    pub fn duplicate_pattern(&mut self, index: usize) -> Option<usize> {
        self.save_current_pattern();
        if self.patterns.is_empty() {
            return None;
        }
        let source = self.clamp_pattern_index(index);
        let mut copy = self.patterns[source].clone();
        copy.name = format!("P{}", self.patterns.len() + 1);
        self.patterns.push(copy);
        let index = self.patterns.len() - 1;
        self.load_pattern(index);
        Some(index)
    }

    /// Append a chain slot for pattern `pattern` (clamped into the bank)
    pub fn chain_push(&mut self, pattern: usize, repeats: u32) -> bool {
        self.save_current_pattern();
        if self.patterns.is_empty() {
            return false;
        }
        let pattern = self.clamp_pattern_index(pattern);
        self.chain.push(ChainSlot::new(pattern, repeats));
        true
    }

    pub fn chain_clear(&mut self) {
        self.chain.clear();
    }

    pub fn set_follow_chain(&mut self, follow: bool) {
        self.chain.set_follow(follow);
    }

    pub fn set_loop_chain(&mut self, looping: bool) {
        self.chain.set_looping(looping);
    }

    /// Jump to a chain slot (wrapped or clamped) and load its pattern
    ///
    /// The live tracks are saved into their pattern first. The repeat
    /// countdown is reseeded from the slot. A slot naming a pattern that no
    /// longer exists keeps the live tracks.
    pub fn goto_chain_slot(&mut self, index: isize) -> bool {
        self.save_current_pattern();
        let Some(slot) = self.chain.enter(index) else {
            return false;
        };
        if slot.pattern >= self.patterns.len() {
            warn!(
                "Chain slot {} names missing pattern {}, keeping current tracks",
                self.chain.pos, slot.pattern
            );
            return false;
        }
        debug!("Chain slot {} -> pattern {}", self.chain.pos, slot.pattern);
        self.load_pattern(slot.pattern)
    }

    pub fn chain_next(&mut self) -> bool {
        if self.chain.is_empty() {
            return false;
        }
        self.goto_chain_slot(self.chain.pos as isize + 1)
    }

    pub fn chain_prev(&mut self) -> bool {
        if self.chain.is_empty() {
            return false;
        }
        self.goto_chain_slot(self.chain.pos as isize - 1)
    }

    /// Called when the anchor track wrapped; returns the new chain position
    /// when a new pattern was loaded
    ///
    /// A slot naming a missing pattern is still entered, but the live tracks
    /// keep playing and `None` is returned.
    pub fn on_pattern_completed(&mut self) -> Option<usize> {
        let next = self.chain.pattern_completed()?;
        self.goto_chain_slot(next).then_some(self.chain.pos)
    }

    /// Stop state: every playhead back to "not yet started"
    pub fn reset_positions(&mut self) {
        for track in &mut self.tracks {
            track.reset_position();
        }
    }
}
