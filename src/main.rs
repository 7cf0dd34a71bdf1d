// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{atomic::AtomicBool, Arc},
};
use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::acquisition::AcquisitionLoop;
use crate::application::monitor::{Monitor, MonitorExit, MonitorHandle};
use crate::application::transport::Transport;
use crate::domain::window::{time_frame_from_secs, WindowController};
use crate::infrastructure::config::{load_monitor_config, TransportConfig, TransportKind};
use crate::infrastructure::firmware_codec;
use crate::infrastructure::replay_transport::ReplayTransport;
use crate::infrastructure::selection_store::SelectionStore;
use crate::infrastructure::simulated_transport::SimulatedTransport;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers;

const UPDATE_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 256;

fn build_transport(config: &TransportConfig) -> anyhow::Result<Arc<dyn Transport>> {
    match config.kind {
        TransportKind::Simulated => Ok(Arc::new(SimulatedTransport::new())),
        TransportKind::Replay => {
            let path = config
                .replay_path
                .as_deref()
                .context("transport.replay_path is required for the replay transport")?;
            Ok(Arc::new(ReplayTransport::open(path)?))
        }
    }
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/status", get(handlers::get_status))
        .route("/series", get(handlers::get_series))
        .route("/series/:key", put(handlers::set_series_active))
        .route("/stream", get(handlers::stream_updates))
        .route("/pause", post(handlers::toggle_pause))
        .route("/window/time-frame", post(handlers::set_time_frame))
        .route("/window/scroll", post(handlers::scroll))
        .route("/window/track", post(handlers::track))
        .route("/recording", get(handlers::recording_status))
        .route("/recording/start", post(handlers::start_recording))
        .route("/recording/stop", post(handlers::stop_recording))
        .route("/device/action", post(handlers::device_action))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Parser, Debug)]
#[command(name = "device-monitor", version, about = "Live monitor for a USB heating device")]
struct Cli {
    /// Without a subcommand the monitor service is started
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a firmware image between plain and on-disk form
    Firmware {
        #[arg(value_enum)]
        mode: FirmwareMode,
        input: PathBuf,
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FirmwareMode {
    /// Plain image to on-disk form
    Encode,
    /// On-disk form to plain image
    Decode,
}

fn run_firmware_command(mode: FirmwareMode, input: &Path, output: &Path) -> anyhow::Result<()> {
    match mode {
        FirmwareMode::Encode => firmware_codec::write_file(output, &firmware_codec::read_file(input, false)?, true)?,
        FirmwareMode::Decode => firmware_codec::write_file(output, &firmware_codec::read_file(input, true)?, false)?,
    }
    tracing::info!(?mode, input = %input.display(), output = %output.display(), "firmware image written");
    Ok(())
}

async fn shutdown_signal(monitor_stopped: oneshot::Receiver<MonitorExit>, shutdown: watch::Sender<bool>) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::warn!(%err, "failed to listen for ctrl-c");
            }
            tracing::info!("shutdown requested");
        }
        exit = monitor_stopped => {
            tracing::warn!(?exit, "monitor stopped, shutting down server");
        }
    }
    let _ = shutdown.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Some(Command::Firmware { mode, input, output }) = cli.command {
        return run_firmware_command(mode, &input, &output);
    }

    // Load configuration
    let config = load_monitor_config().context("failed to load configuration")?;
    let transport = build_transport(&config.transport)?;
    let time_frame = time_frame_from_secs(config.window.time_frame_secs).context("invalid window.time_frame_secs")?;
    let window = WindowController::new(time_frame).context("invalid window.time_frame_secs")?;
    let store = SelectionStore::new(config.storage.selection_path.clone());
    let selection = store.load();

    // Monitor owns all series state; handlers and acquisition talk to it through channels
    let paused = Arc::new(AtomicBool::new(false));
    let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);

    let monitor = Monitor::new(
        transport.clone(),
        paused.clone(),
        selection,
        window,
        updates.clone(),
        config.storage.recordings_dir.clone(),
    );
    let (stopped_tx, stopped_rx) = oneshot::channel();
    let monitor_task = tokio::spawn(async move {
        let exit = monitor.run(command_rx, event_rx, store).await;
        let _ = stopped_tx.send(exit);
    });

    let acquisition = AcquisitionLoop::new(transport, event_tx, paused, config.acquisition.settings())
        .spawn()
        .context("failed to start acquisition thread")?;

    let handle = MonitorHandle::new(command_tx, updates);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = Arc::new(AppState {
        monitor: handle.clone(),
        shutdown: shutdown_rx,
    });

    // Start server
    let addr: SocketAddr = config
        .http
        .bind
        .parse()
        .with_context(|| format!("invalid http.bind address {}", config.http.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, transport = ?config.transport.kind, "starting device-monitor service");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(stopped_rx, shutdown_tx))
        .await?;

    // Stop the monitor, which closes the event channel and ends acquisition
    handle.shutdown().await;
    monitor_task.await.context("monitor task panicked")?;
    tokio::task::spawn_blocking(move || acquisition.join())
        .await?
        .map_err(|_| anyhow::anyhow!("acquisition thread panicked"))?;

    tracing::info!("device-monitor stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_runs_service() {
        let cli = Cli::try_parse_from(["device-monitor"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_firmware_subcommand_parses_mode_and_paths() {
        let cli = Cli::try_parse_from(["device-monitor", "firmware", "decode", "in.bin", "out.bin"]).unwrap();
        match cli.command {
            Some(Command::Firmware { mode, input, output }) => {
                assert_eq!(mode, FirmwareMode::Decode);
                assert_eq!(input, PathBuf::from("in.bin"));
                assert_eq!(output, PathBuf::from("out.bin"));
            }
            None => panic!("expected firmware subcommand"),
        }
    }

    #[test]
    fn test_firmware_subcommand_rejects_bad_arguments() {
        assert!(Cli::try_parse_from(["device-monitor", "firmware", "scramble", "in.bin", "out.bin"]).is_err());
        assert!(Cli::try_parse_from(["device-monitor", "firmware", "encode", "in.bin"]).is_err());
        assert!(Cli::try_parse_from(["device-monitor", "flash"]).is_err());
    }

    #[test]
    fn test_firmware_encode_then_decode_restores_image() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.bin");
        let encoded = dir.path().join("encoded.bin");
        let decoded = dir.path().join("decoded.bin");
        let image: Vec<u8> = (0..=255u8).cycle().take(700).collect();
        std::fs::write(&plain, &image).unwrap();

        run_firmware_command(FirmwareMode::Encode, &plain, &encoded).unwrap();
        assert_eq!(std::fs::read(&encoded).unwrap(), firmware_codec::transform(&image));
        run_firmware_command(FirmwareMode::Decode, &encoded, &decoded).unwrap();
        assert_eq!(std::fs::read(&decoded).unwrap(), image);

        assert!(run_firmware_command(FirmwareMode::Decode, &dir.path().join("missing.bin"), &decoded).is_err());
    }

    #[test]
    fn test_oversized_configured_time_frame_is_an_error() {
        assert!(time_frame_from_secs(i64::MAX).is_err());
        assert!(time_frame_from_secs(10).and_then(WindowController::new).is_ok());
    }
}
