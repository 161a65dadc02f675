use std::time::Duration;

use crate::types::Region;

/// Errors surfaced by the automation core.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    /// A required UI sprite never showed up. Fatal to the running operation.
    #[error("sprite {sprite} not found in region {region} within {timeout:?}")]
    TransitionTimeout {
        sprite: String,
        region: String,
        timeout: Duration,
    },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("unknown region {0}")]
    UnknownRegion(String),

    #[error("unknown sprite {0}")]
    UnknownSprite(String),

    #[error("unknown transition script {0}")]
    UnknownScript(String),

    #[error("region {name} {region} does not fit a {}x{} frame", frame.0, frame.1)]
    InvalidRegion {
        name: String,
        region: Region,
        frame: (u32, u32),
    },

    #[error("action index {0} outside the action set")]
    InvalidAction(usize),

    #[error("no window matching {pattern:?} appeared within {timeout:?}")]
    EmulatorNotFound { pattern: String, timeout: Duration },

    #[error("no frame captured after {attempts} attempts")]
    CaptureStalled { attempts: u32 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, AutomationError>;
