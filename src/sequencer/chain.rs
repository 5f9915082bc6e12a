// Chain - ordered pattern slots with per-slot repeat counts
//
// Pure state machine. It decides which slot is current and when to move on;
// loading the slot's pattern is the song's job.

use serde::{Deserialize, Serialize};

fn one() -> u32 {
    1
}

/// One entry of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSlot {
    /// Index into the song's pattern bank
    pub pattern: usize,
    /// Full pattern loops before moving on (at least 1)
    #[serde(default = "one")]
    pub repeats: u32,
}

impl ChainSlot {
    pub fn new(pattern: usize, repeats: u32) -> Self {
        Self {
            pattern,
            repeats: repeats.max(1),
        }
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeats.max(1)
    }
}

/// Chain playback state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Chain {
    pub slots: Vec<ChainSlot>,
    /// Current slot
    pub pos: usize,
    /// Advance automatically when the anchor track completes a loop
    pub follow: bool,
    /// Wrap past the last slot instead of staying on it
    pub looping: bool,
    /// Remaining loops of the current slot; 0 means not seeded yet
    #[serde(skip)]
    pub repeats_left: u32,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn current_slot(&self) -> Option<&ChainSlot> {
        self.slots.get(self.pos)
    }

    pub fn push(&mut self, slot: ChainSlot) {
        self.slots.push(ChainSlot::new(slot.pattern, slot.repeats));
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.pos = 0;
        self.repeats_left = 0;
    }

    /// Toggle auto-advance; enabling seeds the countdown from the current slot
    pub fn set_follow(&mut self, follow: bool) {
        self.follow = follow;
        self.repeats_left = if follow {
            self.current_slot().map_or(1, ChainSlot::repeat_count)
        } else {
            0
        };
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Slot index `index` refers to: wrapped when looping, clamped otherwise
    pub fn resolve(&self, index: isize) -> Option<usize> {
        let total = self.slots.len();
        if total == 0 {
            return None;
        }
        let target = if self.looping {
            index.rem_euclid(total as isize)
        } else {
            index
        };
        Some(target.clamp(0, total as isize - 1) as usize)
    }

    /// Make `index` the current slot and reseed its countdown
    ///
    /// Returns the entered slot, or `None` (with state reset) when the chain
    /// is empty.
    pub fn enter(&mut self, index: isize) -> Option<ChainSlot> {
        let Some(pos) = self.resolve(index) else {
            self.pos = 0;
            self.repeats_left = 0;
            return None;
        };
        self.pos = pos;
        let slot = self.slots[pos];
        self.repeats_left = slot.repeat_count();
        Some(slot)
    }

    /// Count one completed loop of the current slot
    ///
    /// Returns the slot index to enter next once the countdown runs out.
    pub fn pattern_completed(&mut self) -> Option<isize> {
        if !self.follow || self.slots.is_empty() {
            return None;
        }
        if self.repeats_left == 0 {
            self.repeats_left = self.current_slot().map_or(1, ChainSlot::repeat_count);
        }
        self.repeats_left -= 1;
        if self.repeats_left == 0 {
            Some(self.pos as isize + 1)
        } else {
            None
        }
    }

    /// Clamp `pos` back into range after the slot list changed
    pub fn normalize(&mut self) {
        for slot in &mut self.slots {
            slot.repeats = slot.repeats.max(1);
        }
        if self.slots.is_empty() {
            self.pos = 0;
        } else {
            self.pos = self.pos.min(self.slots.len() - 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Chain {
        let mut chain = Chain::new();
        chain.push(ChainSlot::new(0, 3));
        chain.push(ChainSlot::new(1, 1));
        chain
    }

    #[test]
    fn test_repeats_at_least_one() {
        assert_eq!(ChainSlot::new(0, 0).repeats, 1);
        let slot: ChainSlot = serde_json::from_str(r#"{"pattern":2}"#).unwrap();
        assert_eq!(slot.repeat_count(), 1);
    }

    #[test]
    fn test_no_advance_without_follow() {
        let mut chain = chain();
        for _ in 0..10 {
            assert_eq!(chain.pattern_completed(), None);
        }
    }

    #[test]
    fn test_repeat_countdown() {
        let mut chain = chain();
        chain.set_follow(true);
        assert_eq!(chain.repeats_left, 3);

        assert_eq!(chain.pattern_completed(), None);
        assert_eq!(chain.pattern_completed(), None);
        assert_eq!(chain.pattern_completed(), Some(1));
    }

    #[test]
    fn test_unseeded_countdown_seeds_from_slot() {
        let mut chain = chain();
        chain.follow = true;
        chain.repeats_left = 0;
        assert_eq!(chain.pattern_completed(), None);
        assert_eq!(chain.repeats_left, 2);
    }

    #[test]
    fn test_resolve_clamps_or_wraps() {
        let mut chain = chain();
        assert_eq!(chain.resolve(5), Some(1));
        assert_eq!(chain.resolve(-1), Some(0));

        chain.set_looping(true);
        assert_eq!(chain.resolve(2), Some(0));
        assert_eq!(chain.resolve(-1), Some(1));

        assert_eq!(Chain::new().resolve(0), None);
    }

    #[test]
    fn test_enter_reseeds() {
        let mut chain = chain();
        let slot = chain.enter(0).unwrap();
        assert_eq!(slot.pattern, 0);
        assert_eq!(chain.repeats_left, 3);

        let slot = chain.enter(1).unwrap();
        assert_eq!(slot.pattern, 1);
        assert_eq!(chain.pos, 1);
        assert_eq!(chain.repeats_left, 1);
    }

    #[test]
    fn test_clear() {
        let mut chain = chain();
        chain.enter(1);
        chain.clear();
        assert!(chain.is_empty());
        assert_eq!(chain.pos, 0);
        assert_eq!(chain.repeats_left, 0);
        assert_eq!(chain.enter(0), None);
    }
}
