pub mod replay;

use std::path::Path;
use std::process::Command as ProcessCommand;

use crate::error::Result;
use crate::logger;
use crate::settings::Settings;
use crate::types::*;

/// Handle to the emulator window: frame capture and input injection.
pub trait WindowHandle: Send {
    fn id(&self) -> WindowId;
    fn title(&self) -> &str;
    fn activate(&mut self);
    /// Latest captured frame, or `None` while capture is contended.
    fn grab_frame(&mut self) -> Option<Frame>;
    /// Click at a point given as fractions of the window size.
    fn click_relative(&mut self, x_ratio: f64, y_ratio: f64);
    fn tap(&mut self, key: &str);
}

/// Platform-level operations (process launch, window enumeration, factory).
pub trait Platform: Send {
    /// Start the emulator executable without waiting for it.
    fn launch(&self, executable: &Path) -> Result<()> {
        logger::info_p("platform", &format!("launching {}", executable.display()));
        ProcessCommand::new(executable).spawn()?;
        Ok(())
    }

    fn get_instances(&self, pattern: &str) -> Vec<(WindowId, String)>;
    fn create_window(&self, pattern: &str, window_id: WindowId) -> Box<dyn WindowHandle>;
}

/// Case-insensitive regex match of a window title. Invalid patterns never match.
pub fn title_matches(pattern: &str, title: &str) -> bool {
    match regex::Regex::new(&format!("(?i){}", pattern)) {
        Ok(re) => re.is_match(title),
        Err(e) => {
            logger::error(&format!("invalid pattern '{}': {}", pattern, e));
            false
        }
    }
}

/// Create the platform backend. Frames come from `settings.replay_dir`;
/// native capture backends implement the same traits.
pub fn create_platform(settings: &Settings) -> Box<dyn Platform> {
    logger::register_prefix("platform", logger::COLOR_GRAY);
    logger::register_prefix("replay", logger::COLOR_GRAY);
    Box::new(replay::ReplayPlatform::new(&settings.replay_dir, &settings.window_pattern))
}
