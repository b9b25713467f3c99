//! Spindle Player (spindle-player) - Main entry point
//!
//! Runs the playback engine as a child process of the scheduler:
//! commands arrive as JSON lines on stdin, events leave as JSON lines on
//! stdout. Logs go to stderr or the configured log file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use spindle_common::commands::PlayerCommand;
use spindle_common::config::{
    default_temp_folder, ensure_directory_exists, find_config_file, resolve_root_folder,
    ROOT_FOLDER_ENV_VAR,
};
use spindle_common::events::EventBus;
use spindle_player::backend::{Capabilities, FilePreparer, MemoryVolume, SimulatedPlayer};
use spindle_player::config::PlayerConfig;
use spindle_player::playback::{spawn_engine, Backends, EngineHandle, EngineSettings, PlaybackEngine};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for spindle-player
#[derive(Parser, Debug)]
#[command(name = "spindle-player")]
#[command(about = "DJ playback engine for Spindle")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "SPINDLE_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder containing music files
    #[arg(short, long)]
    root_folder: Option<String>,

    /// Folder for prepared copies of source files
    #[arg(short, long, env = "SPINDLE_TEMP_FOLDER")]
    temp_folder: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(short, long, env = "SPINDLE_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = find_config_file(args.config.as_deref());
    let config = PlayerConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    init_tracing(&args, &config)?;

    info!(
        "Starting Spindle Player {} ({} {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let root_folder = resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV_VAR,
        config.root_folder.as_deref().and_then(|p| p.to_str()),
    );
    let temp_folder = args
        .temp_folder
        .clone()
        .or_else(|| config.temp_folder.clone())
        .unwrap_or_else(default_temp_folder);
    ensure_directory_exists(&temp_folder).context("Failed to create temp folder")?;
    info!("Root folder: {}", root_folder.display());
    info!("Temp folder: {}", temp_folder.display());

    let settings = EngineSettings::from(&config);
    let backends = Backends {
        player: Box::new(SimulatedPlayer::new(
            config.backend.simulated_duration_ms,
            Capabilities {
                supports_seek: config.backend.supports_seek,
                supports_speed: config.backend.supports_speed,
            },
        )),
        volume: Box::new(MemoryVolume::new(config.playback.default_volume)),
        preparer: Arc::new(FilePreparer::new(root_folder, temp_folder)),
    };
    let events = EventBus::new(settings.event_capacity);

    let engine = PlaybackEngine::new(settings, backends, events)
        .context("Failed to initialize playback engine")?;
    let (handle, engine_task) = spawn_engine(engine);
    info!("Playback engine initialized");

    let event_writer = tokio::spawn(write_events(handle.clone()));

    tokio::select! {
        _ = read_commands(handle.clone()) => {
            info!("Command input closed, shutting down");
        }
        _ = shutdown_signal() => {}
    }

    if let Err(e) = handle.shutdown().await {
        warn!("Engine shutdown: {}", e);
    }
    if let Err(e) = engine_task.await {
        error!("Playback control loop panicked: {}", e);
    }
    event_writer.abort();

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(args: &Args, config: &PlayerConfig) -> Result<()> {
    let default_filter = args
        .log_level
        .clone()
        .unwrap_or_else(|| format!("spindle_player={0},spindle_common={0}", config.logging.level));

    let (writer, ansi) = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            (BoxMakeWriter::new(Arc::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi),
        )
        .init();
    Ok(())
}

/// Forward commands from stdin until it closes
///
/// A line reading `diagnostics` logs an engine snapshot instead.
async fn read_commands(handle: EngineHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read command input: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "diagnostics" {
            match handle.diagnostics().await {
                Ok(snapshot) => match serde_json::to_string(&snapshot) {
                    Ok(json) => info!("Diagnostics: {}", json),
                    Err(e) => warn!("Failed to serialize diagnostics: {}", e),
                },
                Err(e) => warn!("Diagnostics unavailable: {}", e),
            }
            continue;
        }

        match PlayerCommand::from_json(line) {
            Ok(command) => {
                if let Err(e) = handle.send(command).await {
                    error!("Failed to deliver command: {}", e);
                    break;
                }
            }
            Err(e) => warn!("Ignoring malformed command {:?}: {}", line, e),
        }
    }
}

/// Write every engine event to stdout as one JSON line
async fn write_events(handle: EngineHandle) {
    let mut rx = handle.subscribe();
    let mut stdout = tokio::io::stdout();

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event output lagged, {} events dropped", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let mut line = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize {}: {}", event.event_type(), e);
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = stdout.write_all(line.as_bytes()).await {
            error!("Failed to write event output: {}", e);
            break;
        }
        if let Err(e) = stdout.flush().await {
            debug!("Event output flush failed: {}", e);
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
