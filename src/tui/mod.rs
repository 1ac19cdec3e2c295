pub mod render;

use crate::scheduler::{SchedulerHandle, SchedulerStatus};
use crate::state::DisplayMode;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;

const INTERVAL_STEP_MINUTES: i64 = 5;

/// What a console keypress asks the scheduler to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Refresh,
    SetMode(DisplayMode),
    SetInterval(i64),
}

pub fn key_action(code: KeyCode, current_interval: u32) -> Option<Action> {
    let current = current_interval as i64;
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('r') => Some(Action::Refresh),
        KeyCode::Char('f') => Some(Action::SetMode(DisplayMode::Feed)),
        KeyCode::Char('s') => Some(Action::SetMode(DisplayMode::Slideshow)),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::SetInterval(current + INTERVAL_STEP_MINUTES)),
        KeyCode::Char('-') => Some(Action::SetInterval(current - INTERVAL_STEP_MINUTES)),
        _ => None,
    }
}

/// Everything the console draws in one frame.
pub struct ConsoleView {
    pub status: SchedulerStatus,
    pub images: Vec<String>,
    pub message: Option<String>,
}

/// Run the console until `q`. Only talks to the scheduler through `handle`.
pub async fn run_tui(handle: SchedulerHandle) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = tui_loop(&mut terminal, &handle).await;

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn tui_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    handle: &SchedulerHandle,
) -> Result<()> {
    let mut message: Option<String> = None;

    loop {
        let view = ConsoleView {
            status: handle.status(),
            images: handle.list_images().unwrap_or_default(),
            message: message.clone(),
        };
        terminal.draw(|f| render::draw(f, &view))?;

        if !event::poll(Duration::from_millis(250))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let Some(action) = key_action(key.code, view.status.interval_minutes) else {
            continue;
        };

        let outcome = match action {
            Action::Quit => return Ok(()),
            Action::Refresh => handle.refresh_now(None).await.map(|()| "refresh requested".to_string()),
            Action::SetMode(mode) => handle.set_mode(mode).await.map(|()| format!("mode set to {}", mode)),
            Action::SetInterval(minutes) => handle
                .set_interval(minutes)
                .await
                .map(|applied| format!("interval set to {} min", applied)),
        };
        message = Some(match outcome {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "console command rejected");
                e.to_string()
            }
        });
    }
}
