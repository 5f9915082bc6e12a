// Arpeggiator - spreads the notes of one step across sub-divisions of it

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub const MAX_ARP_RATE: u32 = 16;
pub const MAX_ARP_OCTAVES: u32 = 4;
pub const MIN_ARP_GATE: f64 = 0.05;

/// Order the expanded notes are played in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArpDirection {
    #[default]
    Up,
    Down,
    /// Up then back down, without repeating the top and bottom notes
    UpDown,
    Random,
}

impl ArpDirection {
    /// Lenient parse; unknown names mean `Up`
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "down" => ArpDirection::Down,
            "updown" | "pingpong" => ArpDirection::UpDown,
            "random" => ArpDirection::Random,
            _ => ArpDirection::Up,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArpDirection::Up => "up",
            ArpDirection::Down => "down",
            ArpDirection::UpDown => "upDown",
            ArpDirection::Random => "random",
        }
    }
}

impl From<String> for ArpDirection {
    fn from(raw: String) -> Self {
        ArpDirection::parse(&raw)
    }
}

impl From<ArpDirection> for String {
    fn from(direction: ArpDirection) -> Self {
        direction.name().to_string()
    }
}

/// Per-track arpeggiator settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArpConfig {
    pub enabled: bool,
    /// Sub-divisions per step (1..=16)
    pub rate: u32,
    pub direction: ArpDirection,
    /// Octaves spanned (1..=4)
    pub octaves: u32,
    /// Fraction of a sub-division each note lasts (0.05..=1)
    pub gate: f64,
}

impl Default for ArpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: 4,
            direction: ArpDirection::Up,
            octaves: 1,
            gate: 0.9,
        }
    }
}

impl ArpConfig {
    pub fn normalize(&mut self) {
        self.rate = self.rate.clamp(1, MAX_ARP_RATE);
        self.octaves = self.octaves.clamp(1, MAX_ARP_OCTAVES);
        self.gate = if self.gate.is_finite() {
            self.gate.clamp(MIN_ARP_GATE, 1.0)
        } else {
            Self::default().gate
        };
    }
}

/// A note fed to the arpeggiator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArpNote {
    pub pitch: i32,
    pub velocity: f64,
    pub chance: f64,
}

/// One arpeggiated hit, relative to the start of the step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArpHit {
    /// Seconds after the step's scheduled time
    pub offset: f64,
    pub pitch: i32,
    pub velocity: f64,
    /// Note length in seconds
    pub gate: f64,
}

/// Note order for one step: octave expansion, sort, then direction
pub fn arp_sequence<R: Rng + ?Sized>(notes: &[ArpNote], config: &ArpConfig, rng: &mut R) -> Vec<ArpNote> {
    let octaves = config.octaves.clamp(1, MAX_ARP_OCTAVES) as i32;
    let mut sequence: Vec<ArpNote> = (0..octaves)
        .flat_map(|octave| {
            notes.iter().map(move |note| ArpNote {
                pitch: note.pitch + 12 * octave,
                ..*note
            })
        })
        .collect();
    sequence.sort_by_key(|note| note.pitch);

    match config.direction {
        ArpDirection::Up => {}
        ArpDirection::Down => sequence.reverse(),
        ArpDirection::UpDown => {
            if sequence.len() > 2 {
                let interior: Vec<ArpNote> = sequence[1..sequence.len() - 1]
                    .iter()
                    .rev()
                    .copied()
                    .collect();
                sequence.extend(interior);
            }
        }
        ArpDirection::Random => sequence.shuffle(rng),
    }
    sequence
}

/// Probability gate shared with piano-roll notes: >= 1 always, <= 0 never
pub fn chance_passes<R: Rng + ?Sized>(chance: f64, rng: &mut R) -> bool {
    if !chance.is_finite() || chance <= 0.0 {
        return false;
    }
    if chance >= 1.0 {
        return true;
    }
    rng.gen_range(0.0..1.0) < chance
}

/// Expand `notes` over one step
///
/// Empty when the arpeggiator is disabled or there are no notes. Hits whose
/// chance fails or whose velocity ends at 0 are left out.
pub fn arpeggiate<R: Rng + ?Sized>(
    notes: &[ArpNote],
    config: &ArpConfig,
    step_duration: f64,
    velocity_offset: f64,
    rng: &mut R,
) -> Vec<ArpHit> {
    if !config.enabled || notes.is_empty() || !(step_duration > 0.0) {
        return Vec::new();
    }
    let sequence = arp_sequence(notes, config, rng);
    let rate = config.rate.clamp(1, MAX_ARP_RATE);
    let slice = step_duration / rate as f64;
    let gate = slice * config.gate.clamp(MIN_ARP_GATE, 1.0);

    let mut hits = Vec::with_capacity(rate as usize);
    for i in 0..rate as usize {
        let note = sequence[i % sequence.len()];
        if !chance_passes(note.chance, rng) {
            continue;
        }
        let velocity = (note.velocity + velocity_offset).clamp(0.0, 1.0);
        if velocity <= 0.0 {
            continue;
        }
        hits.push(ArpHit {
            offset: slice * i as f64,
            pitch: note.pitch,
            velocity,
            gate,
        });
    }
    hits
}
