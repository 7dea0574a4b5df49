use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use courier_client::config::ClientConfig;
use courier_client::RunOptions;

/// Terminal chat client.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about)]
struct Cli {
    /// REST backend base URL (overrides COURIER_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Realtime WebSocket endpoint (overrides COURIER_REALTIME_URL)
    #[arg(long)]
    realtime_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// SQLite database holding the session token
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Do not persist the session token
    #[arg(long)]
    ephemeral: bool,

    /// Do not reconnect the realtime channel after a drop
    #[arg(long)]
    no_reconnect: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut ClientConfig) {
        if let Some(url) = self.api_url {
            config.api_url = url;
        }
        if let Some(url) = self.realtime_url {
            config.realtime_url = url;
        }
        if let Some(secs) = self.timeout.filter(|s| *s > 0) {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = self.db_path {
            config.db_path = Some(path);
        }
        if self.no_reconnect {
            config.reconnect = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    courier_client::init_tracing(cli.log_file.as_deref())?;

    let options = RunOptions {
        ephemeral: cli.ephemeral,
    };
    let mut config = ClientConfig::from_env();
    cli.apply(&mut config);

    courier_client::run(config, options).await
}
