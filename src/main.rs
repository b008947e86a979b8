//! Globe quality daemon.
//!
//! Drives the adaptive quality controller from a simulated globe scene: a
//! render task paces frames by the scene's cost model, a report task closes
//! the frame-rate period every second, and a Unix socket accepts quality
//! commands and status queries.

use globe_quality::config::ConfigManager;
use globe_quality::controller::QualityEvent;
use globe_quality::error::{DaemonError, IpcError};
use globe_quality::ipc_server::{DaemonState, SceneController};
use globe_quality::logging;
use globe_quality::renderer::{
    simulated_frame_cost, SceneConfig, SceneTileset, SceneView, TilesetHandle, ViewHandle,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[cfg(unix)]
use globe_quality::ipc_server::IpcServer;

/// Graceful shutdown timeout in seconds
const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

/// Delay before restarting a failed IPC server
const IPC_RESTART_SECS: u64 = 5;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), DaemonError> {
    let _log_guard = logging::init_logging().map_err(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        e
    })?;

    info!("Globe quality daemon starting...");

    let result = run_daemon().await;

    match &result {
        Ok(()) => info!("Globe quality daemon shut down gracefully"),
        Err(e) => error!("Globe quality daemon error: {}", e),
    }

    result
}

async fn run_daemon() -> Result<(), DaemonError> {
    let config_path = ConfigManager::default_path();
    let config_manager = ConfigManager::load_or_default(&config_path)?;
    match config_manager.ensure_file() {
        Ok(true) => info!("Default configuration written to {:?}", config_path),
        Ok(false) => info!("Configuration loaded from {:?}", config_path),
        Err(e) => warn!("Could not write default configuration: {}", e),
    }

    let config = config_manager.get().clone();
    config.validate()?;

    let now = Instant::now();
    let mut controller = SceneController::new(&config.adaptive, &config.telemetry, now);
    controller.bind(SceneTileset::new(&config.scene), SceneView::new(), now);

    let daemon_state = Arc::new(DaemonState::new(controller, config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = setup_signal_handlers(signal_tx).await {
            error!("Signal handler error: {}", e);
        }
    });

    let ipc_state = Arc::clone(&daemon_state);
    let ipc_shutdown_rx = shutdown_rx.clone();
    let ipc_handle = tokio::spawn(async move { run_ipc_server(ipc_state, ipc_shutdown_rx).await });

    let render_state = Arc::clone(&daemon_state);
    let render_shutdown_rx = shutdown_rx.clone();
    let render_handle =
        tokio::spawn(async move { run_render_loop(render_state, render_shutdown_rx).await });

    let report_state = Arc::clone(&daemon_state);
    let report_shutdown_rx = shutdown_rx.clone();
    let report_handle =
        tokio::spawn(async move { run_report_timer(report_state, report_shutdown_rx).await });

    info!("Globe quality daemon initialized and running");

    let mut shutdown_rx_main = shutdown_rx.clone();
    shutdown_rx_main.changed().await.ok();

    info!("Shutdown signal received, stopping tasks...");

    let shutdown_timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
    let _ = tokio::time::timeout(shutdown_timeout, async {
        let _ = tokio::join!(ipc_handle, render_handle, report_handle);
    })
    .await;

    let metrics = daemon_state.controller.read().await.metrics();
    info!(
        upgrades = metrics.upgrades,
        downgrades = metrics.downgrades,
        manual_changes = metrics.manual_changes,
        fine_tune_writes = metrics.fine_tune_writes,
        "All tasks stopped"
    );
    Ok(())
}

/// Wait for SIGTERM or SIGINT and broadcast shutdown.
#[cfg(unix)]
async fn setup_signal_handlers(shutdown_tx: watch::Sender<bool>) -> Result<(), DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| DaemonError::Runtime(format!("Failed to install SIGTERM handler: {}", e)))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| DaemonError::Runtime(format!("Failed to install SIGINT handler: {}", e)))?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}

#[cfg(not(unix))]
async fn setup_signal_handlers(shutdown_tx: watch::Sender<bool>) -> Result<(), DaemonError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| DaemonError::Runtime(format!("Failed to listen for Ctrl+C: {}", e)))?;
    info!("Received Ctrl+C");
    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Run the IPC server, restarting it after errors until shutdown.
async fn run_ipc_server(state: Arc<DaemonState>, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("IPC server shutting down");
                    break;
                }
            }
            result = run_ipc_server_inner(Arc::clone(&state)) => {
                match result {
                    Ok(()) => break,
                    Err(e) => {
                        error!("IPC server error: {}, restarting in {} seconds", e, IPC_RESTART_SECS);
                        let delay = Duration::from_secs(IPC_RESTART_SECS);
                        if sleep_or_shutdown(&mut shutdown_rx, delay).await {
                            info!("IPC server shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Sleep for `delay` unless shutdown is signalled first.
/// Returns true on shutdown.
async fn sleep_or_shutdown(shutdown_rx: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    if *shutdown_rx.borrow() {
        return true;
    }
    tokio::select! {
        changed = shutdown_rx.changed() => changed.is_err() || *shutdown_rx.borrow(),
        _ = tokio::time::sleep(delay) => false,
    }
}

#[cfg(unix)]
async fn run_ipc_server_inner(state: Arc<DaemonState>) -> Result<(), IpcError> {
    let server = IpcServer::new(&state.config.socket_path).await?;
    info!("IPC server listening on {:?}", server.socket_path());
    server.run(state).await
}

#[cfg(not(unix))]
async fn run_ipc_server_inner(_state: Arc<DaemonState>) -> Result<(), IpcError> {
    warn!("IPC server not available on this platform");
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}

/// Frame cost of the simulated scene for the controller's current knobs.
fn next_frame_cost(controller: &SceneController, scene: &SceneConfig) -> Duration {
    let threshold = controller
        .tileset()
        .map(|t| t.detail_error_threshold())
        .unwrap_or(scene.reference_threshold);
    let scale = controller.view().map(|v| v.resolution_scale()).unwrap_or(1.0);
    simulated_frame_cost(scene, threshold, scale)
}

/// Render tick: pace frames by the scene cost, then record the frame and
/// run the controller.
async fn run_render_loop(state: Arc<DaemonState>, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        let cost = next_frame_cost(&*state.controller.read().await, &state.config.scene);

        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Render loop shutting down");
                    break;
                }
            }
            _ = tokio::time::sleep(cost) => {
                let now = Instant::now();
                let mut controller = state.controller.write().await;
                controller.on_frame_rendered(now);
                if let Some(event) = controller.update(now) {
                    notify(event);
                }
            }
        }
    }
}

/// UI notification for a controller event.
fn notify(event: QualityEvent) {
    match event {
        QualityEvent::TierChanged { to, .. } => debug!("Quality: {}", to),
        QualityEvent::DowngradeDeferred { .. } | QualityEvent::KnobsTuned { .. } => {}
    }
}

/// First tick one period from now. Ticks missed during a stall are not
/// replayed back to back, so no near-zero-elapsed reports reach the window.
fn report_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Rate report clock, independent of the render tick.
async fn run_report_timer(state: Arc<DaemonState>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval = report_interval(state.config.telemetry.report_interval());

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Report timer shutting down");
                    break;
                }
            }
            _ = interval.tick() => {
                let mut controller = state.controller.write().await;
                let fps = controller.on_report_tick(Instant::now());
                debug!(
                    fps,
                    tier = %controller.current_tier(),
                    smoothed_fps = controller.smoothed_fps(),
                    manual = controller.is_manual(),
                    "Frame rate reported"
                );
            }
        }
    }
}
