//! TTS Subscriber - Main Entry Point
//!
//! Connects to a The Things Stack MQTT endpoint, subscribes to the nine
//! per-device topics and prints decoded uplink payloads until interrupted.

use clap::Parser;
use std::process;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tts_subscriber::config::Settings;
use tts_subscriber::session::SessionController;

/// Subscribe to The Things Stack MQTT endpoint and print decoded payloads
#[derive(Parser)]
#[command(name = "tts-subscriber")]
#[command(about = "Subscribe to The Things Stack MQTT endpoint and print decoded uplink payloads")]
#[command(
    long_about = "Subscribe to The Things Stack MQTT endpoint and print decoded uplink \
                  payloads. TTS_HOST, TTS_PORT, TTS_USERNAME, TTS_PASSWORD, \
                  TTS_APPLICATION_ID, TTS_TENANT_ID and TTS_DEVICE_ID must be provided \
                  in the environment or an '.env' file."
)]
#[command(version)]
struct Args {
    /// Delivery guarantee for every subscription; tweak reliability/latency
    #[arg(
        short,
        long,
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=2)
    )]
    qos: u8,

    /// Retain session data (subscriptions, outstanding messages) on the
    /// broker when this client disconnects
    #[arg(long)]
    persistent: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tts_subscriber=info,rumqttc=warn")),
        )
        .init();

    let settings = match Settings::from_env(args.qos, args.persistent) {
        Ok(settings) => settings,
        Err(e) => {
            error!("invalid configuration: {e}");
            process::exit(1);
        }
    };

    info!(
        host = %settings.host,
        port = settings.port,
        device = %settings.device_id,
        "starting tts-subscriber v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run(settings).await {
        error!("{e}");
        process::exit(1);
    }
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = SessionController::new(settings);
    session.start()?;

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    info!("waiting for uplinks, press Ctrl+C to stop");

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT, shutting down gracefully"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down gracefully"),
        reason = session.wait_until_failed() => {
            session.stop().await;
            return Err(format!("session terminated: {reason}").into());
        }
    }

    session.stop().await;
    Ok(())
}
