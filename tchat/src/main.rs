//! `tchat`: chat with a peer over its onion service.
//!
//! Reads connection parameters from `~/.config/tchat/config.json` and the
//! identity key from `~/.config/tchat/private_key` (generated on first
//! run), then opens the relay's read stream and starts the TUI.
//!
//! ```bash
//! cargo run --bin tchat -- <peer-service-id>
//! cargo run --bin tchat -- --config ./config.json <peer-service-id>.onion
//! ```

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::task::JoinHandle;
use tracing_appender::non_blocking::WorkerGuard;

use tchat::app::App;
use tchat::chat::send::Sender;
use tchat::chat::{self, DispatchReceiver, DispatchSender};
use tchat::config::{CliArgs, Config};
use tchat::crypto::keys::{FileKeyStore, KeyStore};
use tchat::sync::{self, SyncError};
use tchat::transport::http::ReqwestTransport;
use tchat::ui;
use tchat::ui::terminal::TerminalGuard;

/// How long each UI tick waits for terminal input.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Anything that stops the client before or during the session.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] tchat::config::ConfigError),
    #[error(transparent)]
    Keys(#[from] tchat::crypto::KeyLoadError),
    #[error(transparent)]
    Send(#[from] tchat::chat::send::SendError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("read stream task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    // Logs go to a file; ratatui owns stdout.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    match run(&cli).await {
        Ok(()) => {
            tracing::info!("tchat exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(err = %e, "tchat exiting with error");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("tchat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(cli: &CliArgs) -> Result<(), StartupError> {
    let config_path = cli.config_path()?;
    let config = Config::load(&config_path)?;
    tracing::info!(path = %config_path.display(), "config loaded");

    let key_store = match &cli.keys {
        Some(path) => FileKeyStore::new(path),
        None => FileKeyStore::default_location()?,
    };
    let keypair = key_store.load_or_generate()?;
    let service_id = keypair.service_id();
    tracing::info!(service_id = %service_id, "identity loaded");

    let policy = config.send_policy();
    tracing::info!(?policy, "send policy selected");
    let sender = Sender::from_policy(policy, &cli.destination, &keypair)?;
    drop(keypair);

    let read_url = config.read_url()?;
    let (dispatch_tx, dispatch_rx) = chat::dispatch_channel();
    let sync_task = tokio::spawn(sync::run(
        read_url,
        config.read_cookie.clone(),
        dispatch_tx.clone(),
    ));

    let mut guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let mut app = App::new(service_id.as_str(), sender.destination());
    let result = run_app(
        &mut terminal,
        &mut app,
        &sender,
        &dispatch_tx,
        dispatch_rx,
        sync_task,
    )
    .await;

    drop(terminal);
    guard.restore()?;

    result
}

/// Main application loop. The UI task is the single dispatch consumer.
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    sender: &Sender<ReqwestTransport>,
    dispatch: &DispatchSender,
    mut inbox: DispatchReceiver,
    mut sync_task: JoinHandle<Result<(), SyncError>>,
) -> Result<(), StartupError> {
    loop {
        chat::drain(&mut inbox, &mut app.log);
        terminal.draw(|frame| ui::draw(frame, app))?;

        if sync_task.is_finished() {
            chat::drain(&mut inbox, &mut app.log);
            return match (&mut sync_task).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(e.into()),
            };
        }

        if event::poll(POLL_TIMEOUT)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            if let Some(text) = app.handle_key_event(key) {
                terminal.draw(|frame| ui::draw(frame, app))?;
                let unit = sender.send(&text).await;
                app.finish_send();
                if dispatch.send(unit).is_err() {
                    tracing::warn!("dispatch channel closed, dropping send outcome");
                }
            }
        }

        if app.should_quit {
            sync_task.abort();
            return Ok(());
        }
    }
}
