//! Automation context: one emulator window, the merged registry and the
//! clock, plus the polling primitives every higher layer builds on.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::{AutomationError, Result};
use crate::logger;
use crate::platform::WindowHandle;
use crate::registry::Registry;
use crate::settings::Settings;
use crate::types::*;

/// Polling knobs for sprite waits and frame capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollConfig {
    pub poll_interval: Duration,
    pub frame_backoff: Duration,
    /// `None` retries forever.
    pub frame_max_retries: Option<u32>,
    pub tolerance: u8,
}

impl PollConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            frame_backoff: settings.frame_backoff(),
            frame_max_retries: settings.frame_max_retries,
            tolerance: settings.match_tolerance,
        }
    }
}

/// Outcome of [`Automation::wait_for_sprite`].
#[derive(Debug, Clone)]
pub struct SpriteWait {
    pub found: bool,
    /// Frame the sprite was found in, or the last frame seen before giving up.
    pub frame: Option<Frame>,
    /// Top-left corner of the match.
    pub location: Option<(u32, u32)>,
}

pub struct Automation {
    window: Box<dyn WindowHandle>,
    registry: Registry,
    clock: Arc<dyn Clock>,
    poll: PollConfig,
}

impl Automation {
    pub fn new(window: Box<dyn WindowHandle>, registry: Registry, clock: Arc<dyn Clock>, poll: PollConfig) -> Self {
        Self { window, registry, clock, poll }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Block until the window yields a frame, backing off between misses.
    pub fn next_frame(&mut self) -> Result<Frame> {
        let mut attempts = 0u32;
        loop {
            if let Some(frame) = self.window.grab_frame() {
                if attempts > 0 {
                    logger::info(&format!("frame capture recovered after {} miss(es)", attempts));
                }
                return Ok(frame);
            }
            attempts += 1;
            if self.poll.frame_max_retries.is_some_and(|max| attempts > max) {
                return Err(AutomationError::CaptureStalled { attempts });
            }
            if attempts == 1 {
                logger::warn("no frame available, retrying");
            }
            self.clock.sleep(self.poll.frame_backoff);
        }
    }

    /// Poll frames until `sprite` shows up inside `region` or `timeout` elapses.
    /// Not finding it is reported through `found`, not as an error.
    pub fn wait_for_sprite(&mut self, sprite: &str, region: &str, timeout: Duration) -> Result<SpriteWait> {
        let target = self.registry.sprite(sprite)?;
        let area = self.registry.region(region)?;
        let start = self.clock.now();
        let mut last = None;

        loop {
            if let Some(frame) = self.window.grab_frame() {
                if let Some(location) = target.locate(&frame.image, &area, self.poll.tolerance) {
                    return Ok(SpriteWait { found: true, frame: Some(frame), location: Some(location) });
                }
                last = Some(frame);
            }
            if self.clock.elapsed_since(start) >= timeout {
                return Ok(SpriteWait { found: false, frame: last, location: None });
            }
            self.clock.sleep(self.poll.poll_interval);
        }
    }

    /// Click the center of a named region.
    pub fn click_region(&mut self, region: &str) -> Result<()> {
        let area = self.registry.region(region)?;
        let (w, h) = self.registry.frame_size();
        let (cx, cy) = area.center();
        self.window.click_relative(cx as f64 / w as f64, cy as f64 / h as f64);
        Ok(())
    }

    pub fn handle_keys(&mut self, actions: &[Action]) {
        for action in actions {
            self.window.tap(action.key());
        }
    }
}
