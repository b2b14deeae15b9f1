//! The TUI event loop: terminal input, page results, tag task events and a
//! spinner tick, multiplexed with `tokio::select!`.

use crate::app::{App, AppEvent};
use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dishdeck::api::{ApiClient, Dish};
use dishdeck::feed::PageFetched;
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::mpsc;

use super::events::{handle_app_event, spawn_load_tags};
use super::input::handle_input;
use super::render::render;

pub(super) const SPINNER_FRAMES: usize = 4;

const TICK: Duration = Duration::from_millis(250);

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// What the loop does after a key press.
pub enum Action {
    Continue,
    Quit,
}

/// SIGTERM and SIGINT as one awaitable source.
#[cfg(unix)]
struct Shutdown {
    term: tokio::signal::unix::Signal,
    int: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Shutdown {
    fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            term: signal(SignalKind::terminate())?,
            int: signal(SignalKind::interrupt())?,
        })
    }

    /// Resolves with the signal name.
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.term.recv() => "SIGTERM",
            _ = self.int.recv() => "SIGINT",
        }
    }
}

#[cfg(not(unix))]
struct Shutdown;

#[cfg(not(unix))]
impl Shutdown {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        std::future::pending().await
    }
}

/// Run the TUI until the user quits, a signal arrives or the input stream
/// closes. The terminal is restored on the way out, and by a panic hook if
/// anything panics first.
pub async fn run(
    app: &mut App,
    api: ApiClient,
    event_tx: mpsc::Sender<AppEvent>,
    mut event_rx: mpsc::Receiver<AppEvent>,
    mut feed_rx: mpsc::Receiver<PageFetched<Dish>>,
) -> Result<()> {
    install_panic_hook();

    let mut terminal = setup_terminal()?;
    let mut input = EventStream::new();
    let mut shutdown = Shutdown::new()?;
    let mut tick = tokio::time::interval(TICK);

    spawn_load_tags(&api, &event_tx);

    loop {
        if app.clear_expired_status() {
            app.needs_redraw = true;
        }
        if app.needs_redraw {
            terminal.draw(|f| render(f, app))?;
            app.needs_redraw = false;
        }

        // Page results first, so a held key cannot starve them
        while let Ok(msg) = feed_rx.try_recv() {
            app.handle_page(msg);
            app.needs_redraw = true;
        }

        tokio::select! {
            biased;

            name = shutdown.recv() => {
                tracing::info!(signal = name, "Shutting down");
                break;
            }

            event = input.next() => {
                let Some(event) = event else { break };
                match event {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        app.needs_redraw = true;
                        let action = handle_input(app, &api, key.code, key.modifiers, &event_tx);
                        if matches!(action, Action::Quit) {
                            break;
                        }
                    }
                    Ok(Event::Resize(..)) => app.needs_redraw = true,
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Terminal event stream error"),
                }
            }

            Some(msg) = feed_rx.recv() => {
                app.handle_page(msg);
                app.needs_redraw = true;
            }

            Some(event) = event_rx.recv() => {
                handle_app_event(app, event);
                app.needs_redraw = true;
            }

            _ = tick.tick() => {
                if app.feed.is_fetching() {
                    app.spinner_frame = (app.spinner_frame + 1) % SPINNER_FRAMES;
                    app.needs_redraw = true;
                }
            }
        }
    }

    restore_terminal(terminal)
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        previous(info);
    }));
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
