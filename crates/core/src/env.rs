//! The try-brawler RL environment: Shelly in the "try brawler" event of
//! Brawl Stars, running inside LDPlayer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::automation::{Automation, PollConfig};
use crate::clock::{self, Clock};
use crate::episode::EpisodeController;
use crate::error::{AutomationError, Result};
use crate::limiter::Limiter;
use crate::logger;
use crate::platform::{Platform, WindowHandle};
use crate::registry::{Registry, START_APP};
use crate::reward::{DigitRecognizer, RewardExtractor};
use crate::settings::{ResetMode, Settings};
use crate::transition;
use crate::types::*;

pub const GAME_SCREEN: &str = "GAME_SCREEN";
pub const REWARD_REGION: &str = "REWARD_TRY_DAMAGE_PER_SECOND";
pub const SUPPORTED_BRAWLERS: &[&str] = &["Shelly"];

/// Gym-style surface consumed by agents and the runner.
pub trait GameEnv {
    fn actions(&self) -> &'static [Action] {
        &Action::ALL
    }

    /// (width, height) of the observations.
    fn observation_dimensions(&self) -> (u32, u32);

    fn reset(&mut self) -> Result<Observation>;

    fn step(&mut self, action: Action) -> Result<Transition>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct TryBrawler {
    ctx: Automation,
    episode: EpisodeController,
    limiter: Limiter,
    reward: RewardExtractor,
    reset_mode: ResetMode,
    step_timeout: Duration,
    #[cfg(feature = "debug-capture")]
    capture_dir: std::path::PathBuf,
}

/// Fail fast on brawlers other than the ones scripted.
pub fn check_brawler(brawler: &str) -> Result<()> {
    if SUPPORTED_BRAWLERS.contains(&brawler) {
        Ok(())
    } else {
        Err(AutomationError::NotImplemented(format!(
            "brawler {:?} (only {} for now)",
            brawler,
            SUPPORTED_BRAWLERS.join(", ")
        )))
    }
}

impl TryBrawler {
    /// Wrap an already running emulator window. Does not touch the UI.
    pub fn new(
        settings: &Settings,
        window: Box<dyn WindowHandle>,
        registry: Registry,
        clock: Arc<dyn Clock>,
        recognizer: Box<dyn DigitRecognizer>,
    ) -> Result<Self> {
        check_brawler(&settings.brawler)?;
        settings.validate()?;
        // Observation and reward regions must exist before the first step
        registry.region(GAME_SCREEN)?;
        registry.region(REWARD_REGION)?;

        let poll = PollConfig::from_settings(settings);
        Ok(Self {
            ctx: Automation::new(window, registry, Arc::clone(&clock), poll),
            episode: EpisodeController::new(Arc::clone(&clock), settings.episode_duration()),
            limiter: Limiter::new(settings.fps, clock),
            reward: RewardExtractor::new(recognizer),
            reset_mode: settings.reset_mode,
            step_timeout: settings.step_timeout(),
            #[cfg(feature = "debug-capture")]
            capture_dir: settings.capture_dir.clone(),
        })
    }

    /// Launch the emulator, wait for it, then open the app and the event.
    pub fn launch(
        settings: &Settings,
        platform: &dyn Platform,
        clock: Arc<dyn Clock>,
        recognizer: Box<dyn DigitRecognizer>,
    ) -> Result<Self> {
        check_brawler(&settings.brawler)?;
        settings.validate()?;
        let registry = Registry::load(&settings.data_dir)?;

        platform.launch(&settings.executable)?;
        let window = find_window(platform, &settings.window_pattern, settings.emulator_timeout(), clock.as_ref())?;

        let mut env = Self::new(settings, window, registry, clock, recognizer)?;
        env.wait_for_emulator(settings.emulator_timeout())?;
        env.start_app()?;
        env.start_event()?;
        Ok(env)
    }

    /// Wait for the emulator home screen, searching the whole frame.
    pub fn wait_for_emulator(&mut self, timeout: Duration) -> Result<Frame> {
        logger::info("waiting for LDPlayer");
        let wait = self.ctx.wait_for_sprite("SPRITE_LDPLAYER", "FULL_FRAME", timeout)?;
        match (wait.found, wait.frame) {
            (true, Some(frame)) => {
                logger::info(&format!("found LDPlayer at {:?}", wait.location.unwrap_or_default()));
                Ok(frame)
            }
            _ => Err(AutomationError::TransitionTimeout {
                sprite: "SPRITE_LDPLAYER".into(),
                region: "FULL_FRAME".into(),
                timeout,
            }),
        }
    }

    pub fn start_app(&mut self) -> Result<Frame> {
        logger::info("starting Brawl Stars");
        transition::run_named(&mut self.ctx, START_APP, self.step_timeout)
    }

    pub fn start_event(&mut self) -> Result<Frame> {
        self.episode.start_event(&mut self.ctx, self.step_timeout)
    }

    pub fn stop_event(&mut self) -> Result<Frame> {
        self.episode.stop_event(&mut self.ctx, self.step_timeout)
    }

    pub fn regions(&self) -> &HashMap<String, Region> {
        self.ctx.registry().regions()
    }

    pub fn episode(&self) -> &EpisodeController {
        &self.episode
    }

    /// Game screen cut out of a full frame.
    pub fn observation(&self, frame: &Frame) -> Result<Observation> {
        let region = self.ctx.registry().region(GAME_SCREEN)?;
        Ok(frame.crop(&region))
    }

    /// Damage per second shown in `frame`.
    pub fn reward(&self, frame: &Frame) -> Result<u64> {
        let region = self.ctx.registry().region(REWARD_REGION)?;
        let crop = frame.crop(&region);
        #[cfg(feature = "debug-capture")]
        if let Err(e) = crate::reward::dump_region(&self.capture_dir, frame.timestamp, &crop) {
            logger::warn(&format!("failed to dump reward region: {}", e));
        }
        Ok(self.reward.extract(&crop))
    }
}

impl GameEnv for TryBrawler {
    fn observation_dimensions(&self) -> (u32, u32) {
        self.ctx
            .registry()
            .region(GAME_SCREEN)
            .map_or((0, 0), |r| (r.width(), r.height()))
    }

    fn reset(&mut self) -> Result<Observation> {
        let frame = self.episode.reset(&mut self.ctx, self.reset_mode, self.step_timeout)?;
        let budget = self.limiter.resample();
        logger::info(&format!("episode started, step budget {:.3}s", budget.as_secs_f64()));
        self.observation(&frame)
    }

    fn step(&mut self, action: Action) -> Result<Transition> {
        self.limiter.start();

        self.ctx.handle_keys(&[action]);
        let frame = self.ctx.next_frame()?;
        let observation = self.observation(&frame)?;
        let reward = self.reward(&frame)?;
        let done = self.episode.done(&frame);

        let report = self.limiter.stop_and_delay();
        let info = StepInfo {
            next_observation_timestamp: frame.timestamp,
            step_duration: report.step_duration,
            paused_duration: report.paused_duration,
        };
        if let Ok(json) = serde_json::to_string(&info) {
            logger::info_p("step", &format!("{:?} reward={} done={} {}", action, reward, done, json));
        }

        Ok(Transition { observation, reward, done, info })
    }

    fn close(&mut self) -> Result<()> {
        self.stop_event().map(|_| ())
    }
}

/// Poll the platform until a window matching `pattern` exists.
fn find_window(
    platform: &dyn Platform,
    pattern: &str,
    timeout: Duration,
    clock: &dyn Clock,
) -> Result<Box<dyn WindowHandle>> {
    let start = clock.now();
    loop {
        if let Some((id, title)) = platform.get_instances(pattern).into_iter().next() {
            logger::info(&format!("found window {:?} #{}", title, id));
            let mut window = platform.create_window(pattern, id);
            window.activate();
            return Ok(window);
        }
        if clock.elapsed_since(start) >= timeout {
            return Err(AutomationError::EmulatorNotFound { pattern: pattern.to_string(), timeout });
        }
        clock::sleep_jitter(clock, 1.0);
    }
}
