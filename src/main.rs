// ============================================================================
// FURIKAERI - Structured self-reflection journal
// ============================================================================
//
// MODULE STRUCTURE (see lib.rs):
// 1. models / validation  - Frameworks, records, form checks & sanitizing
// 2. calendar             - Month grid, monthly/weekly statistics, streaks
// 3. session / context    - Local sign-in, token refresh poller, auth state
// 4. store / journal      - Bincode file store, optimistic save with rollback
// 5. app / ui             - Screen state, key & mouse handling, rendering
//
// This file only sets up logging and the terminal, then runs the event loop.
// ============================================================================

use std::fs::{self, OpenOptions};
use std::io;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use furikaeri::app::App;
use furikaeri::config::AppConfig;
use furikaeri::context::AppContext;
use furikaeri::store::FileStore;
use furikaeri::ui::draw;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// Logs go to a file because stdout belongs to the terminal UI.
fn init_logging(config: &AppConfig) -> Result<()> {
    let log_path = config.log_path()?;
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {:?}", log_path))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str())),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}

fn run() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config)?;
    info!("Starting furikaeri");

    let store = FileStore::open(config.store_path()?).context("Failed to open reflection store")?;
    let ctx = AppContext::new(config.auth_state_path()?, config.session_lifetime_minutes);
    let mut app = App::new(config, ctx, store);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, event::EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode().ok();
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        event::DisableMouseCapture
    )
    .ok();
    terminal.show_cursor().ok();

    if let Err(err) = app.shutdown() {
        error!("Failed to persist auth state: {err:#}");
    }
    info!("Exiting furikaeri");
    res
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| draw(frame, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::from_secs(0));

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.handle_key(key)? {
                        break;
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick(Instant::now());
            last_tick = Instant::now();
        }
    }

    Ok(())
}
