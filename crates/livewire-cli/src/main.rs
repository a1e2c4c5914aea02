//! livewire - listen to a live room and forward what matters.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use livewire::prelude::*;
use tracing_subscriber::EnvFilter;

/// livewire - live-room event client
#[derive(Parser, Debug)]
#[command(name = "livewire")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long)]
    config: PathBuf,

    /// Room to listen to (overrides `room_id`)
    #[arg(long)]
    room_id: Option<u64>,

    /// Stream URL (overrides `stream.url`)
    #[arg(long)]
    url: Option<String>,

    /// Stream auth token (overrides `stream.token`)
    #[arg(long)]
    token: Option<String>,

    /// Forward stopped-room listings (turns on `features.spider`)
    #[arg(long)]
    spider: bool,

    /// Log at debug level regardless of RUST_LOG
    #[arg(long)]
    debug: bool,
}

impl Cli {
    /// Applies command-line overrides, then re-validates.
    fn apply(&self, mut config: LivewireConfig) -> Result<LivewireConfig, ConfigError> {
        if let Some(room_id) = self.room_id {
            config.room_id = RoomId(room_id);
        }
        if let Some(url) = &self.url {
            config.stream.url.clone_from(url);
        }
        if let Some(token) = &self.token {
            config.stream.token.clone_from(token);
        }
        if self.spider {
            config.features.spider = true;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> Result<(), LivewireError> {
    let path = cli.config.to_string_lossy().into_owned();
    let config = cli.apply(livewire::config::load_from_file(&path)?)?;

    tracing::info!(
        room = %config.room_id,
        url = %config.stream.url,
        collector = %config.collector.base_url,
        spider = config.features.spider,
        "livewire starting"
    );

    let mut client = LiveClient::new(config)?;
    client.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(()) => {
            tracing::info!("stream ended");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "livewire stopped");
            ExitCode::FAILURE
        }
    }
}
