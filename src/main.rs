use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use anyhow::{Context, Result};
use crossterm::{
    execute,
    event::{EnableMouseCapture, DisableMouseCapture},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use brawl_gym_core::clock::SystemClock;
use brawl_gym_core::env::{self, GameEnv, TryBrawler};
use brawl_gym_core::platform::create_platform;
use brawl_gym_core::reward::Tesseract;
use brawl_gym_core::types::{Command, Dashboard, RunnerState};
use brawl_gym_core::{logger, runner, settings::Settings};

fn main() -> Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    logger::init(&cwd.join("logs")).context("failed to open log file")?;
    logger::register_prefix("transition", logger::COLOR_BLUE);
    logger::register_prefix("step", logger::COLOR_GRAY);
    logger::register_prefix("reward", logger::COLOR_YELLOW);
    logger::register_prefix("runner", logger::COLOR_YELLOW);

    // Defaults are written back so every knob shows up in settings.json
    let settings_path = cwd.join("settings.json");
    let settings = Settings::load(&settings_path);
    settings.validate()?;
    settings.save(&settings_path);
    env::check_brawler(&settings.brawler)?;

    let dashboard = Arc::new(Mutex::new(Dashboard::default()));
    let runner_state = Arc::new(Mutex::new(RunnerState::Stopped));

    let (log_tx, log_rx) = mpsc::channel::<String>();
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();

    logger::set_tui_sender(log_tx);
    logger::info(&format!("brawl-gym started, brawler {}", settings.brawler));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = brawl_gym_tui::App::new(
        Arc::clone(&dashboard),
        Arc::clone(&runner_state),
        log_rx,
        cmd_tx,
    );

    // Runner owns the environment; it is launched on first start
    let run_dashboard = Arc::clone(&dashboard);
    let run_state = Arc::clone(&runner_state);
    let runner = thread::spawn(move || {
        let platform = create_platform(&settings);
        let mut factory = move || -> Result<Box<dyn GameEnv>> {
            let game = TryBrawler::launch(
                &settings,
                platform.as_ref(),
                Arc::new(SystemClock),
                Box::new(Tesseract::new(&settings.tesseract)),
            )?;
            Ok(Box::new(game))
        };
        runner::run(run_dashboard, run_state, &mut factory, cmd_rx);
    });

    let result = brawl_gym_tui::event::run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    // Quit was sent by the TUI; wait for the event to be left cleanly
    if result.is_ok() && runner.join().is_err() {
        eprintln!("runner thread panicked");
    }
    result
}
