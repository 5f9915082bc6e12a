// Step-effect evaluator - turns one step's effect into scheduled work
//
// Nothing here calls the sound engine directly; the plan is handed back to
// the sequencer, which issues it through the trigger sink at absolute times.

use super::{FxConfig, StepFx, StepFxState};
use crate::audio::trigger::{GainEnvelope, TriggerHit};
use crate::modulation::offsets::ModOffsets;
use log::trace;
use rand::Rng;

/// A hit about to fire on the current step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FxEvent {
    /// Resolved base velocity (before any step-effect offset)
    pub velocity: f64,
    pub semitones: i32,
    pub gate: Option<f64>,
}

/// Timing of the tick being processed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FxContext {
    /// Track step position
    pub step: usize,
    /// Scheduled audio-clock time of the tick
    pub time: f64,
    /// Current step duration in seconds
    pub step_duration: f64,
}

/// Everything a step effect asks the sequencer to schedule
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepFxPlan {
    /// Secondary hits (delay echoes)
    pub echoes: Vec<TriggerHit>,
    /// Gain automation on the track's duck controls
    pub envelopes: Vec<GainEnvelope>,
    /// Offset added to primary hit velocities before clamping
    pub velocity_offset: f64,
}

impl StepFxPlan {
    pub fn is_empty(&self) -> bool {
        self.echoes.is_empty() && self.envelopes.is_empty() && self.velocity_offset == 0.0
    }
}

/// Resolve `fx` for the given events
///
/// Effect offsets for the effect's type (bucket key is the lower-cased type
/// name) are merged into the config and re-clamped before use.
pub fn evaluate_step_fx<R: Rng + ?Sized>(
    fx: &StepFx,
    offsets: Option<&ModOffsets>,
    events: &[FxEvent],
    ctx: &FxContext,
    state: &mut StepFxState,
    rng: &mut R,
) -> StepFxPlan {
    let mut plan = StepFxPlan::default();
    if fx.is_none() {
        return plan;
    }
    let bucket = offsets.and_then(|o| o.effect(&fx.kind().key()));

    match fx {
        StepFx::None => {}
        StepFx::Delay(base) => {
            if !(ctx.step_duration > 0.0) {
                return plan;
            }
            let config = base.with_offsets(bucket);
            for event in events {
                for echo in config.echoes(event.velocity, ctx.time, ctx.step_duration) {
                    trace!("delay echo at {:.4}s vel {:.3}", echo.time, echo.velocity);
                    plan.echoes.push(TriggerHit {
                        step: ctx.step,
                        velocity: echo.velocity,
                        semitones: event.semitones,
                        time: echo.time,
                        gate: event.gate,
                    });
                }
            }
        }
        StepFx::Duck(base) => {
            let config = base.with_offsets(bucket);
            plan.envelopes
                .extend(config.envelope(ctx.time, ctx.step_duration));
        }
        StepFx::MultibandDuck(base) => {
            let config = base.with_offsets(bucket);
            plan.envelopes
                .extend(config.envelopes(ctx.time, ctx.step_duration));
        }
        StepFx::SampleHold(base) => {
            let config = base.with_offsets(bucket);
            plan.velocity_offset = config.next_offset(state.slot(ctx.step), rng);
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::trigger::GainControl;
    use crate::model::params::ParamPath;
    use crate::stepfx::{DelayConfig, DuckConfig, SampleHoldFxConfig};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ctx() -> FxContext {
        FxContext {
            step: 2,
            time: 4.0,
            step_duration: 0.125,
        }
    }

    fn hit(velocity: f64) -> FxEvent {
        FxEvent {
            velocity,
            semitones: 0,
            gate: None,
        }
    }

    #[test]
    fn test_none_plans_nothing() {
        let mut state = StepFxState::default();
        let mut rng = StdRng::seed_from_u64(0);
        let plan = evaluate_step_fx(&StepFx::None, None, &[hit(1.0)], &ctx(), &mut state, &mut rng);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_delay_echoes_per_event() {
        let fx = StepFx::Delay(DelayConfig::new(0.5, 0.5, 2.0, 3));
        let mut state = StepFxState::default();
        let mut rng = StdRng::seed_from_u64(0);
        let events = [
            hit(1.0),
            FxEvent {
                velocity: 0.5,
                semitones: 7,
                gate: Some(0.1),
            },
        ];
        let plan = evaluate_step_fx(&fx, None, &events, &ctx(), &mut state, &mut rng);

        assert_eq!(plan.echoes.len(), 6);
        assert_eq!(plan.echoes[0].velocity, 0.25);
        assert_eq!(plan.echoes[0].time, 4.25);
        assert_eq!(plan.echoes[2].time, 4.75);
        assert_eq!(plan.echoes[3].semitones, 7);
        assert_eq!(plan.echoes[3].gate, Some(0.1));
        assert_eq!(plan.echoes[3].velocity, 0.125);
        assert!(plan.echoes.iter().all(|e| e.step == 2));
    }

    #[test]
    fn test_delay_offsets_applied() {
        let fx = StepFx::Delay(DelayConfig::new(0.5, 0.5, 1.0, 1));
        let mut offsets = ModOffsets::default();
        offsets
            .effects
            .entry("delay".to_string())
            .or_default()
            .add(&ParamPath::parse("mix"), 0.25);

        let mut state = StepFxState::default();
        let mut rng = StdRng::seed_from_u64(0);
        let plan = evaluate_step_fx(&fx, Some(&offsets), &[hit(1.0)], &ctx(), &mut state, &mut rng);
        assert_eq!(plan.echoes.len(), 1);
        assert_eq!(plan.echoes[0].velocity, 0.375);

        // The stored config is untouched
        match fx {
            StepFx::Delay(c) => assert_eq!(c.mix, 0.5),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_duck_schedules_envelope() {
        let fx = StepFx::Duck(DuckConfig::default());
        let mut state = StepFxState::default();
        let mut rng = StdRng::seed_from_u64(0);
        let plan = evaluate_step_fx(&fx, None, &[hit(1.0)], &ctx(), &mut state, &mut rng);

        assert_eq!(plan.envelopes.len(), 1);
        assert_eq!(plan.envelopes[0].control, GainControl::Duck);
        assert_eq!(plan.envelopes[0].start, 4.0);
        assert!(plan.echoes.is_empty());
    }

    #[test]
    fn test_sample_hold_offset_uses_step_slot() {
        let fx = StepFx::SampleHold(SampleHoldFxConfig {
            min: 0.5,
            max: 0.5,
            amount: 0.5,
            chance: 1.0,
            hold: 4,
        });
        let mut state = StepFxState::default();
        let mut rng = StdRng::seed_from_u64(0);
        let plan = evaluate_step_fx(&fx, None, &[hit(0.5)], &ctx(), &mut state, &mut rng);

        assert_eq!(plan.velocity_offset, 0.5);
        assert_eq!(state.sample_hold.get(&2).map(|s| s.remaining), Some(3));
    }
}
