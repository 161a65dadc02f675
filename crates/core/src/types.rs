use std::sync::Arc;
use std::time::Duration;

use image::{imageops, RgbaImage};
use serde::{Serialize, Serializer};

use crate::error::{AutomationError, Result};

/// Window identifier as reported by the platform
pub type WindowId = u64;

/// Cropped game screen handed to the agent
pub type Observation = RgbaImage;

/// Frame-pixel rectangle stored as (top, left, bottom, right).
/// `bottom` and `right` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub top: u32,
    pub left: u32,
    pub bottom: u32,
    pub right: u32,
}

impl Region {
    pub const fn new(top: u32, left: u32, bottom: u32, right: u32) -> Self {
        Self { top, left, bottom, right }
    }

    /// Whole-frame region for a frame of `width` x `height`.
    pub const fn full(width: u32, height: u32) -> Self {
        Self { top: 0, left: 0, bottom: height, right: width }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Center point as (x, y).
    pub fn center(&self) -> (u32, u32) {
        (
            self.left + self.width() / 2,
            self.top + self.height() / 2,
        )
    }

    /// Check top < bottom, left < right and that the rectangle lies inside
    /// a `frame_width` x `frame_height` frame.
    pub fn validate(&self, name: &str, frame_width: u32, frame_height: u32) -> Result<()> {
        let ordered = self.top < self.bottom && self.left < self.right;
        let inside = self.bottom <= frame_height && self.right <= frame_width;
        if ordered && inside {
            Ok(())
        } else {
            Err(AutomationError::InvalidRegion {
                name: name.to_string(),
                region: *self,
                frame: (frame_width, frame_height),
            })
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.top, self.left, self.bottom, self.right)
    }
}

/// Captured screenshot plus capture time (seconds since the Unix epoch).
/// Cloning is cheap; the pixel buffer is shared.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: Arc<RgbaImage>,
    pub timestamp: f64,
}

impl Frame {
    /// Wrap an image, stamping it with the current wall-clock time.
    pub fn new(image: RgbaImage) -> Self {
        let now = chrono::Utc::now();
        Self::with_timestamp(image, now.timestamp_micros() as f64 / 1_000_000.0)
    }

    pub fn with_timestamp(image: RgbaImage, timestamp: f64) -> Self {
        Self { image: Arc::new(image), timestamp }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Copy out the pixels of `region`. Parts outside the frame are clipped.
    pub fn crop(&self, region: &Region) -> RgbaImage {
        imageops::crop_imm(
            self.image.as_ref(),
            region.left,
            region.top,
            region.width(),
            region.height(),
        )
        .to_image()
    }
}

/// Discrete action alphabet: four directions, two attacks and a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Action {
    Up,
    Left,
    Down,
    Right,
    Attack,
    Super,
    Noop,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Up,
        Action::Left,
        Action::Down,
        Action::Right,
        Action::Attack,
        Action::Super,
        Action::Noop,
    ];

    /// Emulator key bound to this action.
    pub fn key(self) -> &'static str {
        match self {
            Action::Up => "w",
            Action::Left => "a",
            Action::Down => "s",
            Action::Right => "d",
            Action::Attack => "e",
            Action::Super => "f",
            // Unbound in the game's keymap
            Action::Noop => "r",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Map a policy output index onto the alphabet.
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(AutomationError::InvalidAction(index))
    }
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Per-step diagnostics. Not meant for control decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StepInfo {
    pub next_observation_timestamp: f64,
    #[serde(serialize_with = "as_secs")]
    pub step_duration: Duration,
    #[serde(serialize_with = "as_secs")]
    pub paused_duration: Duration,
}

/// Result of one environment step
#[derive(Debug, Clone)]
pub struct Transition {
    pub observation: Observation,
    pub reward: u64,
    pub done: bool,
    pub info: StepInfo,
}

/// Runner lifecycle, shared between the runner thread and the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Stopped,
    Running,
    Stopping,
}

/// Command from TUI to runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartStop,
    Reset,
    Quit,
}

/// One finished episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub index: usize,
    pub steps: u64,
    pub total_reward: u64,
    pub best_reward: u64,
    pub mean_step: Duration,
}

/// Live view of the runner, rendered by the TUI
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub episodes: Vec<EpisodeSummary>,
    pub episode_index: usize,
    pub steps: u64,
    pub total_reward: u64,
    pub best_reward: u64,
    pub last_reward: u64,
    /// Summed step durations of the current episode
    pub step_time: Duration,
    pub last_action: Option<Action>,
    pub last_info: Option<StepInfo>,
    pub error: Option<String>,
}
