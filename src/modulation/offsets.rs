// Modulation offsets - transient, additive parameter deltas for one tick
//
// Offsets are produced once per tick, applied in place to the track's
// parameter tree, and reverted when the tick is done. The revert is tied to
// `Drop` of `ModulatedTrack`, so it also runs when triggering unwinds.

use crate::model::params::{ParamPath, ParamValue};
use crate::model::track::Track;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

/// A node of an offset tree
#[derive(Debug, Clone, PartialEq)]
pub enum Offset {
    Leaf(f64),
    Node(BTreeMap<String, Offset>),
}

impl Offset {
    fn merge_from(&mut self, other: &Offset) {
        match (self, other) {
            (Offset::Leaf(a), Offset::Leaf(b)) => *a += *b,
            (Offset::Node(a), Offset::Node(b)) => merge_maps(a, b),
            (this, other) => *this = other.clone(),
        }
    }
}

fn merge_maps(into: &mut BTreeMap<String, Offset>, from: &BTreeMap<String, Offset>) {
    for (key, value) in from {
        match into.get_mut(key) {
            Some(existing) => existing.merge_from(value),
            None => {
                into.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Tree of additive deltas addressed like a parameter tree
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OffsetTree {
    root: BTreeMap<String, Offset>,
}

impl OffsetTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Accumulate `delta` at `path`; zero and non-finite deltas are dropped
    pub fn add(&mut self, path: &ParamPath, delta: f64) {
        if !delta.is_finite() || delta == 0.0 {
            return;
        }
        let Some((last, parents)) = path.segments().split_last() else {
            return;
        };

        let mut cursor = &mut self.root;
        for segment in parents {
            let entry = cursor
                .entry(segment.clone())
                .or_insert_with(|| Offset::Node(BTreeMap::new()));
            if let Offset::Leaf(_) = entry {
                *entry = Offset::Node(BTreeMap::new());
            }
            cursor = match entry {
                Offset::Node(map) => map,
                Offset::Leaf(_) => return,
            };
        }

        match cursor.get_mut(last) {
            Some(Offset::Leaf(current)) => *current += delta,
            _ => {
                cursor.insert(last.clone(), Offset::Leaf(delta));
            }
        }
    }

    /// Recursively merge another tree into this one (leaves are summed)
    pub fn merge(&mut self, other: &OffsetTree) {
        merge_maps(&mut self.root, &other.root);
    }

    /// Accumulated delta at `path`, if that path is a leaf
    pub fn leaf(&self, path: &ParamPath) -> Option<f64> {
        let (last, parents) = path.segments().split_last()?;
        let mut cursor = &self.root;
        for segment in parents {
            cursor = match cursor.get(segment)? {
                Offset::Node(map) => map,
                Offset::Leaf(_) => return None,
            };
        }
        match cursor.get(last)? {
            Offset::Leaf(v) => Some(*v),
            Offset::Node(_) => None,
        }
    }

    /// All leaves with their full paths, depth first in key order
    pub fn leaves(&self) -> Vec<(ParamPath, f64)> {
        fn walk(map: &BTreeMap<String, Offset>, prefix: &ParamPath, out: &mut Vec<(ParamPath, f64)>) {
            for (key, value) in map {
                let path = prefix.join(key);
                match value {
                    Offset::Leaf(v) => out.push((path, *v)),
                    Offset::Node(children) => walk(children, &path, out),
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &ParamPath::default(), &mut out);
        out
    }

    /// Add every leaf onto the matching numeric leaf of `target`
    ///
    /// Offsets whose path does not end on a number are skipped. Keys match
    /// exactly first, then case-insensitively. Returns the undo history.
    pub fn apply_to(&self, target: &mut ParamValue) -> Vec<AppliedOffset> {
        let mut history = Vec::new();
        apply_map(&self.root, target, &ParamPath::default(), &mut history);
        history
    }
}

fn resolve_key(target: &ParamValue, key: &str) -> Option<String> {
    match target {
        ParamValue::Node(map) => {
            if map.contains_key(key) {
                return Some(key.to_string());
            }
            map.keys().find(|k| k.eq_ignore_ascii_case(key)).cloned()
        }
        ParamValue::List(items) => key
            .parse::<usize>()
            .ok()
            .filter(|i| *i < items.len())
            .map(|_| key.to_string()),
        _ => None,
    }
}

fn apply_map(
    offsets: &BTreeMap<String, Offset>,
    target: &mut ParamValue,
    prefix: &ParamPath,
    history: &mut Vec<AppliedOffset>,
) {
    for (key, offset) in offsets {
        let Some(actual) = resolve_key(target, key) else {
            continue;
        };
        let Some(child) = target.child_mut(&actual) else {
            continue;
        };
        let path = prefix.join(&actual);
        match (offset, child) {
            (Offset::Node(children), child) if child.is_container() => {
                apply_map(children, child, &path, history);
            }
            (Offset::Leaf(delta), ParamValue::Number(current)) => {
                if !delta.is_finite() || *delta == 0.0 {
                    continue;
                }
                history.push(AppliedOffset {
                    path,
                    previous: *current,
                });
                *current += *delta;
            }
            _ => {}
        }
    }
}

/// Undo record for one applied offset
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedOffset {
    pub path: ParamPath,
    pub previous: f64,
}

/// Restore values recorded by [`OffsetTree::apply_to`], newest first
pub fn revert(target: &mut ParamValue, history: &[AppliedOffset]) {
    for applied in history.iter().rev() {
        target.set_number(&applied.path, applied.previous);
    }
}

/// Locator of a piano-roll note: start step and pitch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteKey {
    pub step: usize,
    pub pitch: i32,
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.step, self.pitch)
    }
}

/// Note attribute a modulator can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteField {
    Velocity,
    Chance,
    Length,
}

impl NoteField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "vel" => Some(NoteField::Velocity),
            "chance" => Some(NoteField::Chance),
            "length" => Some(NoteField::Length),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NoteField::Velocity => "vel",
            NoteField::Chance => "chance",
            NoteField::Length => "length",
        }
    }
}

/// Deltas for one note's attributes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NoteOffset {
    pub vel: f64,
    pub chance: f64,
    pub length: f64,
}

impl NoteOffset {
    pub fn add(&mut self, field: NoteField, delta: f64) {
        match field {
            NoteField::Velocity => self.vel += delta,
            NoteField::Chance => self.chance += delta,
            NoteField::Length => self.length += delta,
        }
    }
}

/// Everything the modulators touched during one evaluation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModOffsets {
    /// Deltas for the track's parameter tree
    pub params: OffsetTree,
    /// Deltas for step-effect configs, keyed by lower-cased effect type
    pub effects: BTreeMap<String, OffsetTree>,
    /// Deltas for piano-roll notes
    pub notes: BTreeMap<NoteKey, NoteOffset>,
}

impl ModOffsets {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.effects.is_empty() && self.notes.is_empty()
    }

    /// Offsets for one effect type (the key is lower-cased effect name)
    pub fn effect(&self, key: &str) -> Option<&OffsetTree> {
        self.effects.get(key)
    }

    pub fn note(&self, key: NoteKey) -> Option<&NoteOffset> {
        self.notes.get(&key)
    }

    /// Fold another set of offsets into this one
    pub fn merge(&mut self, other: &ModOffsets) {
        self.params.merge(&other.params);
        for (key, tree) in &other.effects {
            self.effects.entry(key.clone()).or_default().merge(tree);
        }
        for (key, note) in &other.notes {
            let entry = self.notes.entry(*key).or_default();
            entry.vel += note.vel;
            entry.chance += note.chance;
            entry.length += note.length;
        }
    }
}

/// A track with parameter offsets applied for the duration of one tick
///
/// Dereferences to the track. Dropping the guard restores every touched
/// leaf, whether the tick finished normally or unwound.
pub struct ModulatedTrack<'a> {
    track: &'a mut Track,
    history: Vec<AppliedOffset>,
}

impl<'a> ModulatedTrack<'a> {
    pub fn apply(track: &'a mut Track, offsets: Option<&OffsetTree>) -> Self {
        let history = match offsets {
            Some(tree) if !tree.is_empty() => tree.apply_to(&mut track.params),
            _ => Vec::new(),
        };
        Self { track, history }
    }

    /// Number of leaves currently shifted
    pub fn applied_count(&self) -> usize {
        self.history.len()
    }
}

impl Deref for ModulatedTrack<'_> {
    type Target = Track;

    fn deref(&self) -> &Track {
        self.track
    }
}

impl Drop for ModulatedTrack<'_> {
    fn drop(&mut self) {
        revert(&mut self.track.params, &self.history);
    }
}
