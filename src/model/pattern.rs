// Pattern - saved snapshot of every track
//
// A pattern is never played directly. Loading one instantiates fresh tracks
// from the snapshot; playback then mutates those, not the pattern.

use crate::error::PatternError;
use crate::model::track::Track;
use serde::{Deserialize, Serialize};

fn sixteen() -> usize {
    16
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    /// Length in sixteenth-note steps
    #[serde(rename = "len16", default = "sixteen")]
    pub length_16ths: usize,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Pattern {
    /// Snapshot `tracks` (runtime state such as playhead is not captured)
    pub fn capture(name: impl Into<String>, tracks: &[Track], length_16ths: usize) -> Self {
        let tracks = tracks
            .iter()
            .map(|t| {
                let mut snapshot = t.clone();
                snapshot.clear_runtime_state();
                snapshot.normalize();
                snapshot
            })
            .collect();
        Self {
            name: name.into(),
            length_16ths: length_16ths.max(1),
            tracks,
        }
    }

    /// Fresh, normalised tracks ready to play from the start
    pub fn instantiate(&self) -> Vec<Track> {
        self.tracks
            .iter()
            .map(|t| {
                let mut track = t.clone();
                track.normalize();
                track.clear_runtime_state();
                track
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, PatternError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and repair a snapshot; a pattern must hold at least one track
    pub fn from_json(json: &str) -> Result<Self, PatternError> {
        let mut pattern: Pattern = serde_json::from_str(json)?;
        if pattern.tracks.is_empty() {
            return Err(PatternError::Empty);
        }
        pattern.length_16ths = pattern.length_16ths.max(1);
        for track in &mut pattern.tracks {
            track.normalize();
        }
        Ok(pattern)
    }
}
