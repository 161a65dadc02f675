use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, MouseEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::App;
use crate::ui;

pub fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> anyhow::Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        app.drain_logs();
        terminal.draw(|f| ui::draw(f, app))?;

        // 100ms poll keeps the dashboard refreshing while the runner steps
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key),
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_log_up(3),
                    MouseEventKind::ScrollDown => app.scroll_log_down(3),
                    _ => {}
                },
                _ => {}
            }
        }
    }
}

pub fn handle_key(app: &mut App, key: KeyEvent) {
    if let Some(dialog) = app.confirm.as_mut() {
        match key.code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::Char('h') | KeyCode::Char('l') => dialog.toggle(),
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                dialog.select(true);
                app.answer_confirm(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.answer_confirm(false),
            KeyCode::Enter => app.answer_confirm(true),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => app.request_quit(),
        KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => app.move_up(),
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => app.move_down(),
        KeyCode::Char('s') | KeyCode::Char('S') => app.start_stop(),
        KeyCode::Char('r') | KeyCode::Char('R') => app.reset_episode(),
        KeyCode::Char('l') | KeyCode::Char('L') => app.toggle_log(),
        KeyCode::PageUp => app.scroll_log_up(10),
        KeyCode::PageDown => app.scroll_log_down(10),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex, mpsc};
    use brawl_gym_core::types::{Command, Dashboard, RunnerState};
    use crossterm::event::KeyModifiers;

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn dialog_swallows_keys() {
        let (_log_tx, log_rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let mut app = App::new(
            Arc::new(Mutex::new(Dashboard::default())),
            Arc::new(Mutex::new(RunnerState::Running)),
            log_rx,
            cmd_tx,
        );

        press(&mut app, KeyCode::Char('q'));
        assert!(app.confirm.is_some());
        // 'l' moves the selection instead of hiding the log
        press(&mut app, KeyCode::Char('l'));
        assert!(app.log_visible);
        press(&mut app, KeyCode::Esc);
        assert!(app.confirm.is_none());
        assert!(!app.should_quit);

        press(&mut app, KeyCode::Char('q'));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.should_quit);
        assert_eq!(cmd_rx.try_recv().unwrap(), Command::Quit);
    }
}
