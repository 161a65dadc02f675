use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutomationError, Result};

/// Target step frequency: a fixed rate or a `[min, max)` range sampled
/// once per episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fps {
    Fixed(f64),
    Range([f64; 2]),
}

/// How `reset()` restarts the event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetMode {
    /// Exit and immediately try the brawler again.
    #[default]
    InPlace,
    /// Leave the event completely, then start it from the menus.
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub executable: PathBuf,
    pub window_pattern: String,
    pub data_dir: PathBuf,
    pub fps: Fps,
    pub episode_secs: f64,
    pub brawler: String,
    pub reset_mode: ResetMode,
    pub step_timeout_secs: f64,
    pub emulator_timeout_secs: f64,
    pub poll_interval_ms: u64,
    pub frame_backoff_ms: u64,
    pub frame_max_retries: Option<u32>,
    pub match_tolerance: u8,
    pub tesseract: PathBuf,
    pub replay_dir: PathBuf,
    pub capture_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(r"C:\LDPlayer\LDPlayer4.0\dnplayer.exe"),
            window_pattern: "LDPlayer".into(),
            data_dir: PathBuf::from("data"),
            fps: Fps::Fixed(2.0),
            episode_secs: 10.0,
            brawler: "Shelly".into(),
            reset_mode: ResetMode::InPlace,
            step_timeout_secs: 30.0,
            emulator_timeout_secs: 120.0,
            poll_interval_ms: 100,
            frame_backoff_ms: 500,
            frame_max_retries: None,
            match_tolerance: 24,
            tesseract: PathBuf::from("tesseract"),
            replay_dir: PathBuf::from("replay"),
            capture_dir: PathBuf::from("captures"),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file, falling back to defaults when the
    /// file is missing or malformed.
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let rates = match self.fps {
            Fps::Fixed(fps) => vec![fps],
            Fps::Range([min, max]) if min < max => vec![min, max],
            Fps::Range([min, max]) => {
                return Err(AutomationError::Config(format!(
                    "fps range must satisfy 0 < min < max, got [{}, {})",
                    min, max
                )));
            }
        };
        for fps in rates {
            // The step budget 1/fps must be a representable, non-zero duration
            let budget = Duration::try_from_secs_f64(1.0 / fps);
            if !(fps > 0.0 && fps.is_finite()) || budget.map_or(true, |b| b.is_zero()) {
                return Err(AutomationError::Config(format!("fps must be a positive, usable rate, got {}", fps)));
            }
        }
        for (name, secs) in [
            ("episode_secs", self.episode_secs),
            ("step_timeout_secs", self.step_timeout_secs),
            ("emulator_timeout_secs", self.emulator_timeout_secs),
        ] {
            if !(secs > 0.0) || Duration::try_from_secs_f64(secs).is_err() {
                return Err(AutomationError::Config(format!("{} must be a positive duration, got {}", name, secs)));
            }
        }
        Ok(())
    }

    pub fn episode_duration(&self) -> Duration {
        Duration::from_secs_f64(self.episode_secs)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.step_timeout_secs)
    }

    pub fn emulator_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.emulator_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn frame_backoff(&self) -> Duration {
        Duration::from_millis(self.frame_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.episode_duration(), Duration::from_secs(10));
        assert_eq!(s.frame_backoff(), Duration::from_millis(500));
    }

    #[test]
    fn fps_accepts_number_or_range() {
        let s: Settings = serde_json::from_str(r#"{"fps": 4}"#).unwrap();
        assert_eq!(s.fps, Fps::Fixed(4.0));
        let s: Settings = serde_json::from_str(r#"{"fps": [2, 5], "reset_mode": "full"}"#).unwrap();
        assert_eq!(s.fps, Fps::Range([2.0, 5.0]));
        assert_eq!(s.reset_mode, ResetMode::Full);
        assert_eq!(s.brawler, "Shelly");
    }

    #[test]
    fn rejects_bad_rates() {
        let mut s = Settings::default();
        s.fps = Fps::Fixed(0.0);
        assert!(matches!(s.validate(), Err(AutomationError::Config(_))));
        s.fps = Fps::Range([5.0, 5.0]);
        assert!(s.validate().is_err());
        s.fps = Fps::Range([0.0, 5.0]);
        assert!(s.validate().is_err());
        // 1/fps overflows a Duration
        s.fps = Fps::Fixed(1e-300);
        assert!(matches!(s.validate(), Err(AutomationError::Config(_))));
        s.fps = Fps::Range([1e-300, 2.0]);
        assert!(s.validate().is_err());
        s.fps = Fps::Range([2.0, f64::INFINITY]);
        assert!(s.validate().is_err());
        s.fps = Fps::Fixed(f64::NAN);
        assert!(s.validate().is_err());
        s.fps = Fps::Range([2.0, 5.0]);
        assert!(s.validate().is_ok());

        s.fps = Fps::Fixed(2.0);
        s.episode_secs = -1.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_durations_too_large_to_represent() {
        for field in 0..3 {
            let mut s = Settings::default();
            match field {
                0 => s.episode_secs = 1e20,
                1 => s.step_timeout_secs = 1e20,
                _ => s.emulator_timeout_secs = f64::INFINITY,
            }
            assert!(matches!(s.validate(), Err(AutomationError::Config(_))), "field {}", field);
        }
        let s = Settings { episode_secs: 3600.0, ..Settings::default() };
        assert!(s.validate().is_ok());
        assert_eq!(s.episode_duration(), Duration::from_secs(3600));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let s = Settings::load(Path::new("/definitely/not/here/settings.json"));
        assert_eq!(s, Settings::default());
    }
}
