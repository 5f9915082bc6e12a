// Parameter trees - engine knobs and free-form step overrides
//
// A tree of named values, arbitrarily nested. Every numeric leaf can be
// addressed by a `ParamPath` and is therefore modulatable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A node or leaf of a parameter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<ParamValue>),
    Node(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Empty node
    pub fn node() -> Self {
        ParamValue::Node(BTreeMap::new())
    }

    /// Build a node from `(key, value)` pairs
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, ParamValue)>) -> Self {
        ParamValue::Node(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, ParamValue::List(_) | ParamValue::Node(_))
    }

    /// Child addressed by one path segment (numeric segments index lists)
    pub fn child(&self, segment: &str) -> Option<&ParamValue> {
        match self {
            ParamValue::Node(map) => map.get(segment),
            ParamValue::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, segment: &str) -> Option<&mut ParamValue> {
        match self {
            ParamValue::Node(map) => map.get_mut(segment),
            ParamValue::List(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(move |i| items.get_mut(i)),
            _ => None,
        }
    }

    pub fn get(&self, path: &ParamPath) -> Option<&ParamValue> {
        path.segments()
            .iter()
            .try_fold(self, |value, segment| value.child(segment))
    }

    pub fn get_mut(&mut self, path: &ParamPath) -> Option<&mut ParamValue> {
        let mut cursor = self;
        for segment in path.segments() {
            cursor = cursor.child_mut(segment)?;
        }
        Some(cursor)
    }

    /// Numeric leaf at `path`
    pub fn number_at(&self, path: &ParamPath) -> Option<f64> {
        self.get(path).and_then(ParamValue::as_number)
    }

    /// Overwrite an existing numeric leaf; returns false if there is none
    pub fn set_number(&mut self, path: &ParamPath, value: f64) -> bool {
        match self.get_mut(path) {
            Some(ParamValue::Number(n)) => {
                *n = value;
                true
            }
            _ => false,
        }
    }

    /// Insert a value, creating intermediate nodes and replacing leaves in the way
    pub fn insert(&mut self, path: &ParamPath, value: ParamValue) {
        let Some((last, parents)) = path.segments().split_last() else {
            *self = value;
            return;
        };
        let mut cursor = self;
        for segment in parents {
            if !cursor.is_container() {
                *cursor = ParamValue::node();
            }
            let next = match cursor {
                ParamValue::Node(map) => {
                    Some(map.entry(segment.clone()).or_insert_with(ParamValue::node))
                }
                ParamValue::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
                _ => None,
            };
            match next {
                Some(child) => cursor = child,
                None => return,
            }
        }
        match cursor {
            ParamValue::Node(map) => {
                map.insert(last.clone(), value);
            }
            ParamValue::List(items) => {
                if let Some(slot) = last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                    *slot = value;
                }
            }
            other => {
                let mut map = BTreeMap::new();
                map.insert(last.clone(), value);
                *other = ParamValue::Node(map);
            }
        }
    }

    /// Deep-merge `defaults` under `self`: missing keys are filled in,
    /// existing keys keep their value unless the kinds disagree
    pub fn fill_defaults(&mut self, defaults: &ParamValue) {
        match (self, defaults) {
            (ParamValue::Node(map), ParamValue::Node(default_map)) => {
                for (key, default) in default_map {
                    match map.get_mut(key) {
                        Some(existing) => existing.fill_defaults(default),
                        None => {
                            map.insert(key.clone(), default.clone());
                        }
                    }
                }
            }
            (ParamValue::List(items), ParamValue::List(default_items)) => {
                for (i, default) in default_items.iter().enumerate() {
                    match items.get_mut(i) {
                        Some(existing) => existing.fill_defaults(default),
                        None => items.push(default.clone()),
                    }
                }
            }
            (ParamValue::Number(n), ParamValue::Number(d)) => {
                if !n.is_finite() {
                    *n = *d;
                }
            }
            (ParamValue::Bool(_), ParamValue::Bool(_)) | (ParamValue::Text(_), ParamValue::Text(_)) => {}
            (value, default) => *value = default.clone(),
        }
    }
}

impl Default for ParamValue {
    fn default() -> Self {
        ParamValue::node()
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// Dot-separated address into a parameter tree, e.g. `synth.oscillators.1.cutoff`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ParamPath(Vec<String>);

impl ParamPath {
    /// Parse a dotted path; blank segments are dropped
    pub fn parse(raw: &str) -> Self {
        Self::from_segments(raw.split('.'))
    }

    pub fn from_segments<S: AsRef<str>>(segments: impl IntoIterator<Item = S>) -> Self {
        ParamPath(
            segments
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Path with `segment` appended
    pub fn join(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        ParamPath(segments)
    }
}

impl fmt::Display for ParamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}
