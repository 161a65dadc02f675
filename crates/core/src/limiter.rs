use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::clock::Clock;
use crate::logger;
use crate::settings::Fps;

/// Timing of one rate-limited interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterReport {
    /// Time spent between `start` and `stop_and_delay`.
    pub step_duration: Duration,
    /// Extra time slept to fill the budget (zero when the step overran).
    pub paused_duration: Duration,
}

/// Caps how often steps run. Each interval is padded up to `1 / fps`;
/// an interval that already overran is not delayed further.
pub struct Limiter {
    fps: Fps,
    budget: Duration,
    clock: Arc<dyn Clock>,
    started: Option<Instant>,
}

impl Limiter {
    pub fn new(fps: Fps, clock: Arc<dyn Clock>) -> Self {
        let mut limiter = Self { fps, budget: Duration::ZERO, clock, started: None };
        limiter.resample();
        limiter
    }

    /// Draw a new step budget. Fixed rates always give the same budget;
    /// ranges sample fps uniformly from `[min, max)`.
    pub fn resample(&mut self) -> Duration {
        let fps = match self.fps {
            Fps::Fixed(fps) => fps,
            Fps::Range([min, max]) if min < max => rand::thread_rng().gen_range(min..max),
            Fps::Range([min, _]) => min,
        };
        self.budget = match Duration::try_from_secs_f64(1.0 / fps) {
            Ok(budget) => budget,
            Err(e) => {
                logger::warn(&format!("unusable fps {}: {}, running unthrottled", fps, e));
                Duration::ZERO
            }
        };
        self.budget
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn start(&mut self) {
        self.started = Some(self.clock.now());
    }

    /// Close the interval opened by `start`, sleeping off any remaining budget.
    pub fn stop_and_delay(&mut self) -> LimiterReport {
        let step_duration = self
            .started
            .take()
            .map_or(Duration::ZERO, |t| self.clock.elapsed_since(t));
        let paused_duration = self.budget.saturating_sub(step_duration);
        if !paused_duration.is_zero() {
            self.clock.sleep(paused_duration);
        }
        LimiterReport { step_duration, paused_duration }
    }
}
