use std::sync::{Arc, Mutex, mpsc};
use brawl_gym_core::types::{Command, Dashboard, RunnerState};

use crate::confirm::ConfirmDialog;

/// Keep at most this many log lines in memory.
const MAX_LOG_LINES: usize = 2000;

pub struct App {
    pub dashboard: Arc<Mutex<Dashboard>>,
    pub runner_state: Arc<Mutex<RunnerState>>,
    pub selected: usize, // highlighted row in the episode history
    pub log_visible: bool,
    pub log_messages: Vec<String>,
    pub log_scroll: usize, // scroll offset from bottom (0 = latest)
    pub log_rx: mpsc::Receiver<String>,
    pub cmd_tx: mpsc::Sender<Command>,
    pub confirm: Option<ConfirmDialog>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        dashboard: Arc<Mutex<Dashboard>>,
        runner_state: Arc<Mutex<RunnerState>>,
        log_rx: mpsc::Receiver<String>,
        cmd_tx: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            dashboard,
            runner_state,
            selected: 0,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            log_rx,
            cmd_tx,
            confirm: None,
            should_quit: false,
        }
    }

    pub fn drain_logs(&mut self) {
        while let Ok(msg) = self.log_rx.try_recv() {
            self.log_messages.push(msg);
        }
        if self.log_messages.len() > MAX_LOG_LINES {
            let excess = self.log_messages.len() - MAX_LOG_LINES;
            self.log_messages.drain(..excess);
        }
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        let len = self.dashboard.lock().unwrap().episodes.len();
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    /// Flip Running <-> Stopping/Stopped and tell the runner.
    pub fn start_stop(&mut self) {
        {
            let mut state = self.runner_state.lock().unwrap();
            *state = match *state {
                RunnerState::Stopped => RunnerState::Running,
                RunnerState::Running => RunnerState::Stopping,
                RunnerState::Stopping => return,
            };
        }
        self.cmd_tx.send(Command::StartStop).ok();
    }

    pub fn reset_episode(&mut self) {
        if *self.runner_state.lock().unwrap() == RunnerState::Running {
            self.cmd_tx.send(Command::Reset).ok();
        }
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    /// Quit right away when idle, otherwise ask first.
    pub fn request_quit(&mut self) {
        if *self.runner_state.lock().unwrap() == RunnerState::Stopped {
            self.quit();
        } else {
            self.confirm = Some(ConfirmDialog::new("Stop the runner and quit?"));
        }
    }

    /// Close the dialog, quitting if Yes was selected.
    pub fn answer_confirm(&mut self, accept: bool) {
        if let Some(dialog) = self.confirm.take() {
            if accept && dialog.selected {
                self.quit();
            }
        }
    }

    pub fn quit(&mut self) {
        self.cmd_tx.send(Command::Quit).ok();
        self.should_quit = true;
    }
}
