pub mod app;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod events;
pub mod realtime_bridge;
pub mod session;
pub mod state;
pub mod view;

#[cfg(test)]
mod testing;

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

use courier_net::HttpBackend;
use courier_store::Database;

use crate::app::{App, Flow};
use crate::config::ClientConfig;
use crate::realtime_bridge::WsConnector;
use crate::session::{MemoryTokenStore, TokenStore};
use crate::state::AppState;

const DEFAULT_LOG_FILTER: &str = "courier_client=info,courier_net=info,courier_store=warn,warn";

/// Install the global tracing subscriber.
///
/// Logs go to stderr, or to `log_file` when given, so they never interleave
/// with the rendered screen on stdout.
pub fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Keep the session token in memory only.
    pub ephemeral: bool,
}

fn open_token_store(config: &ClientConfig, options: RunOptions) -> anyhow::Result<Box<dyn TokenStore>> {
    if options.ephemeral {
        tracing::info!("Ephemeral run, the session will not be persisted");
        return Ok(Box::new(MemoryTokenStore::default()));
    }
    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    Ok(Box::new(db))
}

async fn print_screen(app: &App) -> std::io::Result<()> {
    let mut out = tokio::io::stdout();
    let mut text = String::from("\n");
    for line in app.render() {
        text.push_str(&line);
        text.push('\n');
    }
    text.push_str("> ");
    out.write_all(text.as_bytes()).await?;
    out.flush().await
}

/// Build the application state and drive the terminal until `/quit` or EOF.
pub async fn run(config: ClientConfig, options: RunOptions) -> anyhow::Result<()> {
    tracing::info!(
        api = %config.api_url,
        realtime = %config.realtime_url,
        "Starting Courier v{}",
        env!("CARGO_PKG_VERSION")
    );

    let backend = Arc::new(HttpBackend::new(&config.api_url, config.request_timeout)?);
    let connector = Arc::new(WsConnector::new(config.clone()));
    let tokens = open_token_store(&config, options)?;
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();

    let state = Arc::new(AppState::new(
        config,
        backend,
        connector,
        tokens,
        Arc::new(ui_tx),
    )?);

    let mut app = App::new(state);
    app.start().await;
    print_screen(&app).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if app.handle_line(&line).await == Flow::Quit {
                        break;
                    }
                }
                None => break,
            },
            Some(event) = ui_rx.recv() => app.handle_event(event).await,
        }
        print_screen(&app).await?;
    }

    app.shutdown().await;
    tracing::info!("Courier stopped");
    Ok(())
}
