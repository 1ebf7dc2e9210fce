//! Fixed-interval physics clock.
//!
//! Drives the physics step independently of render and network
//! cadence. The owner schedules calls (a tokio interval on the server,
//! the frame loop on the client); the clock turns wall time into one
//! clamped delta per call and keeps the accumulated local timer both
//! peers stamp their data with.

use std::time::{Duration, Instant};

use crate::util::time::MAX_CLOCK_STEP;

#[derive(Debug, Clone)]
pub struct FixedClock {
    /// Nominal interval between ticks
    step: Duration,
    /// Ceiling on a single elapsed delta
    max_step: Duration,
    /// Accumulated local timer, in seconds. Only ever increases.
    local_time: f64,
    last_tick: Option<Instant>,
}

impl FixedClock {
    pub fn new(step: Duration) -> Self {
        Self {
            step,
            max_step: MAX_CLOCK_STEP,
            local_time: 0.0,
            last_tick: None,
        }
    }

    /// Advance the clock to `now` and return the elapsed delta in
    /// seconds, clamped to `max_step`. The caller runs exactly one
    /// physics step per call; a late scheduler yields one larger
    /// (clamped) delta, never a burst of steps.
    pub fn advance(&mut self, now: Instant) -> f64 {
        let elapsed = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).min(self.max_step),
            // First tick has no reference point, assume one nominal step
            None => self.step,
        };
        self.last_tick = Some(now);

        let dt = elapsed.as_secs_f64();
        self.local_time += dt;
        dt
    }

    /// The accumulated local timer, in seconds
    pub fn local_time(&self) -> f64 {
        self.local_time
    }

    /// Re-seat the local timer, used when a client adopts the server
    /// clock at game start.
    pub fn set_local_time(&mut self, t: f64) {
        self.local_time = t;
    }

    pub fn step(&self) -> Duration {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::PHYSICS_STEP;

    #[test]
    fn local_time_accumulates_elapsed_wall_time() {
        let mut clock = FixedClock::new(PHYSICS_STEP);
        let t0 = Instant::now();

        let dt = clock.advance(t0);
        assert_eq!(dt, PHYSICS_STEP.as_secs_f64());

        let dt = clock.advance(t0 + Duration::from_millis(15));
        assert!((dt - 0.015).abs() < 1e-9);

        let dt = clock.advance(t0 + Duration::from_millis(37));
        assert!((dt - 0.022).abs() < 1e-9);

        assert!((clock.local_time() - (0.015 + 0.015 + 0.022)).abs() < 1e-9);
    }

    #[test]
    fn pathological_delay_is_clamped_to_one_step() {
        let mut clock = FixedClock::new(PHYSICS_STEP);
        let t0 = Instant::now();
        clock.advance(t0);

        let before = clock.local_time();
        let dt = clock.advance(t0 + Duration::from_secs(30));
        assert_eq!(dt, MAX_CLOCK_STEP.as_secs_f64());
        assert!((clock.local_time() - before - dt).abs() < 1e-9);
    }

    #[test]
    fn time_never_runs_backwards() {
        let mut clock = FixedClock::new(PHYSICS_STEP);
        let t0 = Instant::now();
        clock.advance(t0 + Duration::from_millis(100));

        let before = clock.local_time();
        // An earlier instant must not rewind the timer
        let dt = clock.advance(t0);
        assert_eq!(dt, 0.0);
        assert_eq!(clock.local_time(), before);
    }

    #[test]
    fn local_time_can_be_reseated() {
        let mut clock = FixedClock::new(PHYSICS_STEP);
        clock.set_local_time(42.5);
        assert_eq!(clock.local_time(), 42.5);
    }
}
