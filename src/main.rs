use anyhow::Result;
use clap::Parser;
use duplex_recorder::{audio::CpalSourceFactory, server, Config, RecordingController};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "duplex-recorder")]
#[command(about = "TCP-controlled system + microphone recording server")]
struct Args {
    /// Configuration file (optional; built-in defaults apply without it)
    #[arg(long, default_value = "config/duplex-recorder")]
    config: String,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        cfg.service.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.port = port;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!(
        "Canonical output format: {}Hz/{}bit/{}ch, recordings under {}",
        cfg.audio.sample_rate, cfg.audio.bits_per_sample, cfg.audio.channels,
        cfg.audio.recordings_path
    );

    let controller = Arc::new(RecordingController::new(
        cfg.session_config(),
        Arc::new(CpalSourceFactory),
    ));

    let listener = TcpListener::bind((cfg.service.bind.as_str(), cfg.service.port)).await?;
    server::run(listener, controller).await
}
