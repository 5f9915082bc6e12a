// Modulation engine - one evaluation per track per tick

use super::modulator::ModContext;
use super::offsets::ModOffsets;
use super::target::ModTarget;
use crate::model::track::Track;
use log::trace;
use rand::Rng;

/// Run every enabled modulator of `track` and bucket the deltas
///
/// Returns `None` when nothing was touched. Modulator state (LFO phase,
/// held samples) advances; the track's parameters are not modified.
pub fn evaluate<R: Rng + ?Sized>(
    track: &mut Track,
    now: f64,
    step_index: u64,
    rng: &mut R,
) -> Option<ModOffsets> {
    if track.mods.is_empty() {
        return None;
    }
    let ctx = ModContext {
        now,
        step_index,
        step_velocity: track
            .current_step()
            .filter(|s| s.on)
            .map_or(0.0, |s| s.velocity()),
    };

    let mut offsets = ModOffsets::default();
    for modulator in &mut track.mods {
        let Some(delta) = modulator.delta(&ctx, rng) else {
            continue;
        };
        match &modulator.target {
            ModTarget::Param(path) => offsets.params.add(path, delta),
            ModTarget::Effect { key, path } => {
                offsets.effects.entry(key.clone()).or_default().add(path, delta);
            }
            ModTarget::Note { note, field } => {
                offsets.notes.entry(*note).or_default().add(*field, delta);
            }
            ModTarget::Invalid(_) => {}
        }
    }

    if offsets.is_empty() {
        return None;
    }
    trace!(
        "Track {} modulation: {} param leaves, {} effect buckets, {} notes",
        track.id,
        offsets.params.leaves().len(),
        offsets.effects.len(),
        offsets.notes.len()
    );
    Some(offsets)
}
