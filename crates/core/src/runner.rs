use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use rand::seq::SliceRandom;

use crate::env::GameEnv;
use crate::logger;
use crate::types::*;

/// Keep at most this many finished episodes on the dashboard.
pub const MAX_EPISODE_HISTORY: usize = 500;

/// Builds a ready-to-step environment. Called when the runner starts.
pub type EnvFactory<'a> = dyn FnMut() -> anyhow::Result<Box<dyn GameEnv>> + 'a;

/// Fold one step into the live dashboard.
pub fn record_step(dash: &mut Dashboard, action: Action, t: &Transition) {
    dash.steps += 1;
    dash.total_reward += t.reward;
    dash.best_reward = dash.best_reward.max(t.reward);
    dash.last_reward = t.reward;
    dash.step_time += t.info.step_duration + t.info.paused_duration;
    dash.last_action = Some(action);
    dash.last_info = Some(t.info);
    dash.error = None;
}

/// Archive the current episode and clear the per-episode counters.
pub fn finish_episode(dash: &mut Dashboard) {
    let mean_step = match u32::try_from(dash.steps) {
        Ok(n) if n > 0 => dash.step_time / n,
        _ => Duration::ZERO,
    };
    let summary = EpisodeSummary {
        index: dash.episode_index,
        steps: dash.steps,
        total_reward: dash.total_reward,
        best_reward: dash.best_reward,
        mean_step,
    };
    logger::info_p(
        "runner",
        &format!(
            "episode {} done: {} steps, total {}, best {}",
            summary.index, summary.steps, summary.total_reward, summary.best_reward
        ),
    );
    dash.episodes.push(summary);
    if dash.episodes.len() > MAX_EPISODE_HISTORY {
        let excess = dash.episodes.len() - MAX_EPISODE_HISTORY;
        dash.episodes.drain(..excess);
    }
    dash.episode_index += 1;
    dash.steps = 0;
    dash.total_reward = 0;
    dash.best_reward = 0;
    dash.step_time = Duration::ZERO;
}

fn close_env(env: &mut Option<Box<dyn GameEnv>>) {
    if let Some(mut e) = env.take() {
        if let Err(err) = e.close() {
            logger::warn(&format!("failed to close environment: {}", err));
        }
    }
}

/// Drain pending commands. Returns false on Quit.
fn process_commands(
    cmd_rx: &mpsc::Receiver<Command>,
    dashboard: &Mutex<Dashboard>,
    state: &Mutex<RunnerState>,
    env: &mut Option<Box<dyn GameEnv>>,
    needs_reset: &mut bool,
) -> bool {
    while let Ok(cmd) = cmd_rx.try_recv() {
        match cmd {
            Command::Quit => {
                logger::info("shutting down");
                close_env(env);
                *state.lock().unwrap() = RunnerState::Stopped;
                return false;
            }
            Command::StartStop => {
                // TUI already flipped the state; teardown happens in the main loop
                match *state.lock().unwrap() {
                    RunnerState::Running => logger::info("runner started"),
                    RunnerState::Stopping => logger::info("runner stopping..."),
                    RunnerState::Stopped => {}
                }
            }
            Command::Reset => {
                if env.is_some() {
                    logger::info("episode reset requested");
                    // An interrupted episode is archived as it stands
                    let mut dash = dashboard.lock().unwrap();
                    if dash.steps > 0 {
                        finish_episode(&mut dash);
                    }
                    *needs_reset = true;
                }
            }
        }
    }
    true
}

/// Step `env` once with a uniformly random action.
fn play_step(env: &mut dyn GameEnv, rng: &mut impl rand::Rng) -> crate::error::Result<(Action, Transition)> {
    let action = env.actions().choose(rng).copied().unwrap_or(Action::Noop);
    let t = env.step(action)?;
    Ok((action, t))
}

/// Random-policy episode loop. Runs on a background thread until Quit.
pub fn run(
    dashboard: Arc<Mutex<Dashboard>>,
    state: Arc<Mutex<RunnerState>>,
    factory: &mut EnvFactory<'_>,
    cmd_rx: mpsc::Receiver<Command>,
) {
    let mut env: Option<Box<dyn GameEnv>> = None;
    let mut needs_reset = false;
    let mut rng = rand::thread_rng();

    loop {
        if !process_commands(&cmd_rx, &dashboard, &state, &mut env, &mut needs_reset) {
            return;
        }

        let current = *state.lock().unwrap();
        if current == RunnerState::Stopping {
            close_env(&mut env);
            *state.lock().unwrap() = RunnerState::Stopped;
            logger::info("runner stopped");
            continue;
        }
        if current != RunnerState::Running {
            std::thread::sleep(Duration::from_millis(100));
            continue;
        }

        // The factory leaves the game inside a fresh episode
        if env.is_none() {
            match factory() {
                Ok(e) => {
                    env = Some(e);
                    needs_reset = false;
                }
                Err(e) => {
                    logger::error(&format!("failed to start environment: {:#}", e));
                    dashboard.lock().unwrap().error = Some(format!("{:#}", e));
                    *state.lock().unwrap() = RunnerState::Stopped;
                    continue;
                }
            }
        }
        let Some(game) = env.as_mut() else { continue };

        if needs_reset {
            if let Err(e) = game.reset() {
                logger::error(&format!("reset failed: {}", e));
                dashboard.lock().unwrap().error = Some(e.to_string());
                close_env(&mut env);
                *state.lock().unwrap() = RunnerState::Stopped;
                continue;
            }
            needs_reset = false;
        }

        match play_step(&mut **game, &mut rng) {
            Ok((action, t)) => {
                let mut dash = dashboard.lock().unwrap();
                record_step(&mut dash, action, &t);
                if t.done {
                    finish_episode(&mut dash);
                    needs_reset = true;
                }
            }
            Err(e) => {
                logger::error(&format!("step failed: {}", e));
                dashboard.lock().unwrap().error = Some(e.to_string());
                close_env(&mut env);
                *state.lock().unwrap() = RunnerState::Stopped;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AutomationError, Result};
    use image::RgbaImage;

    #[derive(Default)]
    struct Calls {
        steps: usize,
        resets: usize,
        closes: usize,
    }

    /// Ends an episode every `episode_len` steps and quits the runner after `quit_after`.
    struct FakeEnv {
        calls: Arc<Mutex<Calls>>,
        tx: mpsc::Sender<Command>,
        episode_len: usize,
        in_episode: usize,
        reset_after: Option<usize>,
        quit_after: usize,
    }

    impl FakeEnv {
        fn new(calls: &Arc<Mutex<Calls>>, tx: &mpsc::Sender<Command>, episode_len: usize, quit_after: usize) -> Self {
            Self {
                calls: Arc::clone(calls),
                tx: tx.clone(),
                episode_len,
                in_episode: 0,
                reset_after: None,
                quit_after,
            }
        }
    }

    impl GameEnv for FakeEnv {
        fn observation_dimensions(&self) -> (u32, u32) {
            (2, 2)
        }

        fn reset(&mut self) -> Result<RgbaImage> {
            self.calls.lock().unwrap().resets += 1;
            self.in_episode = 0;
            Ok(RgbaImage::new(2, 2))
        }

        fn step(&mut self, _action: Action) -> Result<Transition> {
            let mut calls = self.calls.lock().unwrap();
            calls.steps += 1;
            self.in_episode += 1;
            if Some(calls.steps) == self.reset_after {
                self.tx.send(Command::Reset).unwrap();
            }
            if calls.steps == self.quit_after {
                self.tx.send(Command::Quit).unwrap();
            }
            Ok(Transition {
                observation: RgbaImage::new(2, 2),
                reward: 10 * self.in_episode as u64,
                done: self.in_episode == self.episode_len,
                info: StepInfo { step_duration: Duration::from_millis(100), ..StepInfo::default() },
            })
        }

        fn close(&mut self) -> Result<()> {
            self.calls.lock().unwrap().closes += 1;
            Ok(())
        }
    }

    fn shared() -> (Arc<Mutex<Dashboard>>, Arc<Mutex<RunnerState>>) {
        (Arc::new(Mutex::new(Dashboard::default())), Arc::new(Mutex::new(RunnerState::Running)))
    }

    #[test]
    fn plays_episodes_until_quit() {
        let (dash, state) = shared();
        let (tx, rx) = mpsc::channel();
        let calls = Arc::new(Mutex::new(Calls::default()));
        let calls2 = Arc::clone(&calls);
        let mut factory = move || -> anyhow::Result<Box<dyn GameEnv>> {
            Ok(Box::new(FakeEnv::new(&calls2, &tx, 3, 7)))
        };

        run(Arc::clone(&dash), Arc::clone(&state), &mut factory, rx);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.steps, 7);
        // Launch starts the first episode; later ones go through reset
        assert_eq!(calls.resets, 2);
        assert_eq!(calls.closes, 1);

        let dash = dash.lock().unwrap();
        assert_eq!(dash.episodes.len(), 2);
        assert_eq!(dash.episodes[0].steps, 3);
        assert_eq!(dash.episodes[0].total_reward, 60);
        assert_eq!(dash.episodes[1].best_reward, 30);
        assert_eq!(dash.episodes[1].mean_step, Duration::from_millis(100));
        assert_eq!(dash.episode_index, 2);
        assert_eq!(dash.steps, 1);
        assert_eq!(dash.last_reward, 10);
        assert_eq!(*state.lock().unwrap(), RunnerState::Stopped);
    }

    #[test]
    fn factory_failure_stops_runner() {
        let (dash, state) = shared();
        let (tx, rx) = mpsc::channel();
        let mut factory = move || -> anyhow::Result<Box<dyn GameEnv>> {
            tx.send(Command::Quit).unwrap();
            Err(AutomationError::EmulatorNotFound {
                pattern: "LDPlayer".into(),
                timeout: Duration::from_secs(1),
            }
            .into())
        };

        run(Arc::clone(&dash), Arc::clone(&state), &mut factory, rx);

        assert!(dash.lock().unwrap().error.as_deref().unwrap().contains("LDPlayer"));
        assert_eq!(*state.lock().unwrap(), RunnerState::Stopped);
    }

    #[test]
    fn manual_reset_archives_interrupted_episode() {
        let (dash, state) = shared();
        let (tx, rx) = mpsc::channel();
        let calls = Arc::new(Mutex::new(Calls::default()));
        let calls2 = Arc::clone(&calls);
        let mut factory = move || -> anyhow::Result<Box<dyn GameEnv>> {
            let mut env = FakeEnv::new(&calls2, &tx, 3, 5);
            env.reset_after = Some(2);
            Ok(Box::new(env))
        };

        run(Arc::clone(&dash), Arc::clone(&state), &mut factory, rx);

        assert_eq!(calls.lock().unwrap().resets, 1);
        let dash = dash.lock().unwrap();
        let steps: Vec<u64> = dash.episodes.iter().map(|e| e.steps).collect();
        assert_eq!(steps, [2, 3]);
        assert_eq!(dash.episodes[0].total_reward, 30);
        assert_eq!(dash.episodes[1].total_reward, 60);
        assert_eq!(dash.steps, 0);
    }

    #[test]
    fn reset_right_after_episode_end_archives_nothing_extra() {
        let mut dash = Dashboard::default();
        dash.steps = 3;
        finish_episode(&mut dash);
        let (tx, rx) = mpsc::channel();
        let state = Mutex::new(RunnerState::Running);
        let dash = Mutex::new(dash);
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut env: Option<Box<dyn GameEnv>> = Some(Box::new(FakeEnv::new(&calls, &tx, 3, 0)));
        let mut needs_reset = false;

        tx.send(Command::Reset).unwrap();
        assert!(process_commands(&rx, &dash, &state, &mut env, &mut needs_reset));
        assert!(needs_reset);
        assert_eq!(dash.lock().unwrap().episodes.len(), 1);
    }

    #[test]
    fn episode_history_is_capped() {
        let mut dash = Dashboard::default();
        for _ in 0..MAX_EPISODE_HISTORY + 3 {
            dash.steps = 1;
            finish_episode(&mut dash);
        }
        assert_eq!(dash.episodes.len(), MAX_EPISODE_HISTORY);
        assert_eq!(dash.episodes[0].index, 3);
        assert_eq!(dash.episode_index, MAX_EPISODE_HISTORY + 3);
    }

    #[test]
    fn finish_episode_handles_empty_episode() {
        let mut dash = Dashboard::default();
        finish_episode(&mut dash);
        assert_eq!(dash.episodes[0].mean_step, Duration::ZERO);
        assert_eq!(dash.episode_index, 1);
    }
}
