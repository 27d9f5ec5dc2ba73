mod app;
mod config;
mod session;
mod theme;
mod ui;
mod viewport;

use anyhow::{Context, Result};
use app::{App, AppEvent, Job};
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event as TermEvent, EventStream, KeyEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use flowdeck_client::TulipClient;
use flowdeck_core::engine::execute_fetch;
use flowdeck_core::{Event, FlowDirectory, FlowMutations, Location};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use session::SessionStore;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DIRECTORY_REFRESH_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config();
    init_logging(config.log_file.as_deref())?;

    let client = TulipClient::new(&config.api_url, config.timeout)
        .with_context(|| format!("Failed to build client for {}", config.api_url))?;
    let session = SessionStore::new(config.session_path());
    let initial = match config.location.as_deref() {
        Some(raw) => Location::parse(raw),
        None => session.load().unwrap_or_default(),
    };
    info!(
        api = %client.base_url(),
        session = %session.path().display(),
        location = %initial,
        "flowdeck_start"
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut app = App::new(&config, tx.clone()).with_session(session);
    let jobs = app.start(initial);
    spawn_jobs(&client, &tx, jobs);

    let mut terminal = setup_terminal()?;
    let result = run_app(
        &mut terminal,
        &mut app,
        &client,
        &tx,
        &mut rx,
        config.poll_interval,
    )
    .await;
    restore_terminal(&mut terminal)?;

    if let Err(err) = result {
        eprintln!("flowdeck: {err:#}");
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    client: &TulipClient,
    tx: &UnboundedSender<AppEvent>,
    rx: &mut UnboundedReceiver<AppEvent>,
    poll_interval: Duration,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut poll_ticker = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
    poll_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let directory_interval = Duration::from_secs(DIRECTORY_REFRESH_SECS);
    let mut directory_ticker =
        tokio::time::interval_at(Instant::now() + directory_interval, directory_interval);
    directory_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;
        let jobs = app.after_draw();
        spawn_jobs(client, tx, jobs);
        if app.should_quit() {
            break;
        }

        let debounce = app.debounce.deadline().map(Instant::from_std);
        let jobs = tokio::select! {
            _ = poll_ticker.tick() => app.dispatch(Event::PollTick),
            _ = directory_ticker.tick() => vec![Job::LoadDirectory],
            Some(event) = rx.recv() => app.apply_event(event),
            _ = wait_until(debounce) => app.on_debounce(std::time::Instant::now()),
            maybe_event = events.next() => match maybe_event {
                Some(Ok(TermEvent::Key(key)))
                    if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) =>
                {
                    app.handle_key(key)
                }
                Some(Ok(TermEvent::Mouse(mouse))) => app.handle_mouse(mouse),
                Some(Ok(_)) => Vec::new(),
                Some(Err(err)) => return Err(err).context("Failed to read terminal event"),
                None => break,
            },
        };
        spawn_jobs(client, tx, jobs);
    }

    Ok(())
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn spawn_jobs(client: &TulipClient, tx: &UnboundedSender<AppEvent>, jobs: Vec<Job>) {
    for job in jobs {
        let client = client.clone();
        let tx = tx.clone();
        match job {
            Job::Fetch(request) => {
                tokio::spawn(async move {
                    let event = execute_fetch(&client, request).await;
                    let _ = tx.send(AppEvent::Engine(event));
                });
            }
            Job::SetStar { id, starred } => {
                tokio::spawn(async move {
                    let result = client.set_star(&id, starred).await;
                    let _ = tx.send(AppEvent::Engine(Event::StarFinished { id, result }));
                });
            }
            Job::LoadDirectory => {
                tokio::spawn(async move {
                    let (tags, services, tick_info) =
                        tokio::join!(client.tags(), client.services(), client.tick_info());
                    let _ = tx.send(AppEvent::Tags(tags));
                    let _ = tx.send(AppEvent::Services(services));
                    let _ = tx.send(AppEvent::TickInfo(tick_info));
                });
            }
        }
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
    Ok(())
}
