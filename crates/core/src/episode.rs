use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::automation::Automation;
use crate::clock::Clock;
use crate::error::Result;
use crate::logger;
use crate::registry::{RESET_EVENT, START_EVENT, STOP_EVENT};
use crate::settings::ResetMode;
use crate::transition;
use crate::types::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeState {
    NotStarted,
    Running,
    Done,
}

/// Tracks when the current episode started and ends it after a fixed duration.
pub struct EpisodeController {
    clock: Arc<dyn Clock>,
    duration: Duration,
    started: Option<Instant>,
}

impl EpisodeController {
    pub fn new(clock: Arc<dyn Clock>, duration: Duration) -> Self {
        Self { clock, duration, started: None }
    }

    /// Mark the episode as starting now.
    pub fn begin(&mut self) {
        self.started = Some(self.clock.now());
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.started.map(|t| self.clock.elapsed_since(t))
    }

    pub fn state(&self) -> EpisodeState {
        match self.elapsed() {
            None => EpisodeState::NotStarted,
            Some(e) if e >= self.duration => EpisodeState::Done,
            Some(_) => EpisodeState::Running,
        }
    }

    /// Fixed-duration termination. The frame is unused in this mode.
    pub fn done(&self, _frame: &Frame) -> bool {
        self.state() == EpisodeState::Done
    }

    /// Enter the event from the main menu and start the clock.
    pub fn start_event(&mut self, ctx: &mut Automation, timeout: Duration) -> Result<Frame> {
        logger::info("starting try brawler event");
        let frame = transition::run_named(ctx, START_EVENT, timeout)?;
        self.begin();
        Ok(frame)
    }

    /// Leave the event back to the main menu. The episode stays as it is.
    pub fn stop_event(&mut self, ctx: &mut Automation, timeout: Duration) -> Result<Frame> {
        logger::info("stopping try brawler event");
        transition::run_named(ctx, STOP_EVENT, timeout)
    }

    /// Restart the event and the clock.
    pub fn reset(&mut self, ctx: &mut Automation, mode: ResetMode, timeout: Duration) -> Result<Frame> {
        match mode {
            ResetMode::InPlace => {
                logger::info("resetting try brawler event");
                let frame = transition::run_named(ctx, RESET_EVENT, timeout)?;
                self.begin();
                Ok(frame)
            }
            ResetMode::Full => {
                self.stop_event(ctx, timeout)?;
                self.start_event(ctx, timeout)
            }
        }
    }
}
