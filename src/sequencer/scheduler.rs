// Lookahead scheduler - turns a coarse timer into audio-clock tick times
//
// Each poll emits every tick whose time falls inside the lookahead window.
// Tick times are computed from the previous tick, never from the poll time,
// so timer jitter shifts when a tick is computed but not when it sounds.

use super::timeline::Tempo;
use log::{debug, trace};

/// One scheduled sixteenth note
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Monotonic across the run; tracks wrap it themselves
    pub step_index: u64,
    /// Audio-clock time the tick sounds at
    pub time: f64,
}

#[derive(Debug, Clone)]
pub struct LookaheadScheduler {
    schedule_ahead: f64,
    running: bool,
    tempo: Tempo,
    next_time: f64,
    step_index: u64,
}

impl LookaheadScheduler {
    pub const DEFAULT_SCHEDULE_AHEAD: f64 = 0.1;

    pub fn new(schedule_ahead: f64) -> Self {
        let schedule_ahead = if schedule_ahead.is_finite() && schedule_ahead > 0.0 {
            schedule_ahead
        } else {
            Self::DEFAULT_SCHEDULE_AHEAD
        };
        Self {
            schedule_ahead,
            running: false,
            tempo: Tempo::default(),
            next_time: 0.0,
            step_index: 0,
        }
    }

    /// Begin emitting ticks from `now`; false if already running
    ///
    /// The tempo is fixed for the whole run.
    pub fn start(&mut self, tempo: Tempo, now: f64) -> bool {
        if self.running {
            return false;
        }
        self.tempo = tempo;
        self.next_time = if now.is_finite() { now } else { 0.0 };
        self.step_index = 0;
        self.running = true;
        debug!("Scheduler started at {} ({:.4}s per step)", tempo, self.step_duration());
        true
    }

    /// Halt and clear the counters; true if it was running
    pub fn stop(&mut self) -> bool {
        let was_running = self.running;
        self.running = false;
        self.step_index = 0;
        self.next_time = 0.0;
        if was_running {
            debug!("Scheduler stopped");
        }
        was_running
    }

    /// Emit every tick due before `now + schedule_ahead`
    ///
    /// Returns the number of ticks emitted. After a stall this can be many.
    pub fn poll<F>(&mut self, now: f64, mut on_tick: F) -> usize
    where
        F: FnMut(Tick),
    {
        if !self.running {
            return 0;
        }
        let horizon = now + self.schedule_ahead;
        let step_duration = self.step_duration();
        let mut emitted = 0;
        while self.next_time < horizon {
            let tick = Tick {
                step_index: self.step_index,
                time: self.next_time,
            };
            trace!("tick {} at {:.4}s", tick.step_index, tick.time);
            on_tick(tick);
            self.step_index += 1;
            self.next_time = tick.time + step_duration;
            emitted += 1;
        }
        emitted
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn step_duration(&self) -> f64 {
        self.tempo.step_duration_seconds()
    }

    pub fn next_time(&self) -> f64 {
        self.next_time
    }

    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    pub fn schedule_ahead(&self) -> f64 {
        self.schedule_ahead
    }
}

impl Default for LookaheadScheduler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SCHEDULE_AHEAD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(scheduler: &mut LookaheadScheduler, now: f64) -> Vec<Tick> {
        let mut ticks = Vec::new();
        scheduler.poll(now, |t| ticks.push(t));
        ticks
    }

    #[test]
    fn test_idle_scheduler_emits_nothing() {
        let mut scheduler = LookaheadScheduler::default();
        assert_eq!(scheduler.poll(10.0, |_| panic!("no tick expected")), 0);
    }

    #[test]
    fn test_start_emits_window() {
        let mut scheduler = LookaheadScheduler::default();
        assert!(scheduler.start(Tempo::new(120.0), 1.0));
        // Window [1.0, 1.1): only the tick at 1.0
        let ticks = collect(&mut scheduler, 1.0);
        assert_eq!(ticks, vec![Tick { step_index: 0, time: 1.0 }]);
        assert_eq!(scheduler.next_time(), 1.125);

        // Nothing new until the next tick enters the window
        assert!(collect(&mut scheduler, 1.02).is_empty());
        assert_eq!(collect(&mut scheduler, 1.03).len(), 1);
    }

    #[test]
    fn test_start_twice_is_ignored() {
        let mut scheduler = LookaheadScheduler::default();
        assert!(scheduler.start(Tempo::new(120.0), 0.0));
        assert!(!scheduler.start(Tempo::new(60.0), 5.0));
        assert_eq!(scheduler.tempo().bpm(), 120.0);
    }

    #[test]
    fn test_stop_resets_and_is_idempotent() {
        let mut scheduler = LookaheadScheduler::default();
        scheduler.start(Tempo::new(120.0), 0.0);
        collect(&mut scheduler, 1.0);
        assert!(scheduler.step_index() > 0);

        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        assert_eq!(scheduler.step_index(), 0);
        assert_eq!(scheduler.next_time(), 0.0);
        assert!(collect(&mut scheduler, 2.0).is_empty());
    }

    #[test]
    fn test_catch_up_burst_is_evenly_spaced() {
        let mut scheduler = LookaheadScheduler::default();
        scheduler.start(Tempo::new(120.0), 0.0);
        collect(&mut scheduler, 0.0);

        // Timer stalled for half a second
        let ticks = collect(&mut scheduler, 0.5);
        assert_eq!(ticks.len(), 4);
        for pair in ticks.windows(2) {
            assert_eq!(pair[1].step_index, pair[0].step_index + 1);
            assert!((pair[1].time - pair[0].time - 0.125).abs() < 1e-12);
        }
        assert_eq!(ticks[0].time, 0.125);
    }
}
