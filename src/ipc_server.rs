//! IPC Server module for UI and input collaborators.
//!
//! This module provides a Unix Domain Socket server for receiving
//! quality commands and sending status responses.

use crate::config::Config;
use crate::controller::{QualityController, QualityEvent, QualityStatus};
use crate::error::IpcError;
use crate::metrics::MetricsResponse;
use crate::renderer::{SceneTileset, SceneView};
use crate::tier::QualityTier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

#[cfg(unix)]
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

/// Controller bound to the simulated scene.
pub type SceneController = QualityController<SceneTileset, SceneView>;

/// Commands that can be received via IPC.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "command")]
pub enum IpcCommand {
    CycleTier,
    SetTier { tier: String },
    EnableAuto,
    GetStatus,
    GetMetrics,
}

/// Status response sent to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub quality: QualityStatus,
    pub target_fps: f64,
    pub metrics: MetricsResponse,
}

/// Shared daemon state accessible by the IPC server and the clock tasks.
pub struct DaemonState {
    /// The quality controller, serialized behind one lock
    pub controller: RwLock<SceneController>,
    /// Startup configuration
    pub config: Config,
}

impl DaemonState {
    pub fn new(controller: SceneController, config: Config) -> Self {
        Self {
            controller: RwLock::new(controller),
            config,
        }
    }

    /// Get the current status as a StatusResponse.
    pub async fn get_status(&self) -> StatusResponse {
        let controller = self.controller.read().await;
        StatusResponse {
            quality: controller.status(),
            target_fps: self.config.adaptive.target_fps,
            metrics: controller.metrics(),
        }
    }
}

fn event_message(event: Option<QualityEvent>, tier: QualityTier) -> String {
    match event {
        Some(QualityEvent::TierChanged { from, to, .. }) => {
            format!("Quality changed from {} to {}", from, to)
        }
        _ => format!("Manual mode set, renderer not bound (tier {})", tier),
    }
}

/// Unix Domain Socket server for IPC.
#[cfg(unix)]
pub struct IpcServer {
    /// Path to the Unix socket
    socket_path: PathBuf,
    listener: UnixListener,
}

#[cfg(unix)]
impl IpcServer {
    /// Create a new IPC server at the specified path, replacing any stale
    /// socket file.
    pub async fn new(path: &str) -> Result<Self, IpcError> {
        let socket_path = PathBuf::from(path);

        Self::cleanup_socket(&socket_path)?;

        let listener = UnixListener::bind(&socket_path).map_err(|e| IpcError::SocketBindFailed {
            path: path.to_string(),
            source: e,
        })?;

        Ok(Self {
            socket_path,
            listener,
        })
    }

    fn cleanup_socket(path: &Path) -> Result<(), IpcError> {
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| IpcError::SocketBindFailed {
                path: path.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections forever, one task per client.
    pub async fn run(&self, state: Arc<DaemonState>) -> Result<(), IpcError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, state).await {
                            tracing::warn!("Error handling IPC connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Error accepting IPC connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(stream: UnixStream, state: Arc<DaemonState>) -> Result<(), IpcError> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        // Newline-delimited JSON
        while reader.read_line(&mut line).await? > 0 {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                line.clear();
                continue;
            }

            let response = match serde_json::from_str::<IpcCommand>(trimmed) {
                Ok(command) => Self::handle_command(command, &state).await,
                Err(e) => serde_json::json!({
                    "success": false,
                    "error": IpcError::InvalidCommand(e.to_string()).to_string()
                }),
            };

            let response_str = serde_json::to_string(&response)?;
            writer.write_all(response_str.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;

            line.clear();
        }

        Ok(())
    }

    /// Handle a single IPC command and return the response.
    pub async fn handle_command(command: IpcCommand, state: &Arc<DaemonState>) -> serde_json::Value {
        match command {
            IpcCommand::CycleTier => {
                let mut controller = state.controller.write().await;
                let event = controller.cycle_tier(Instant::now());
                let tier = controller.current_tier();
                tracing::info!(tier = %tier, "Quality cycled via IPC");
                serde_json::json!({
                    "success": true,
                    "message": event_message(event, tier),
                    "tier": tier
                })
            }

            IpcCommand::SetTier { tier } => {
                let tier = match tier.parse::<QualityTier>() {
                    Ok(t) => t,
                    Err(e) => {
                        return serde_json::json!({
                            "success": false,
                            "error": e.to_string()
                        });
                    }
                };

                let mut controller = state.controller.write().await;
                let event = controller.set_tier(tier, Instant::now());
                tracing::info!(tier = %tier, "Quality set via IPC");
                serde_json::json!({
                    "success": true,
                    "message": event_message(event, controller.current_tier()),
                    "tier": controller.current_tier()
                })
            }

            IpcCommand::EnableAuto => {
                let mut controller = state.controller.write().await;
                controller.enable_auto();
                serde_json::json!({ "success": true, "message": "Adaptive quality: auto" })
            }

            IpcCommand::GetStatus => {
                let status = state.get_status().await;
                serde_json::to_value(status).unwrap_or_else(|e| {
                    serde_json::json!({
                        "success": false,
                        "error": IpcError::SerializationFailed(e).to_string()
                    })
                })
            }

            IpcCommand::GetMetrics => {
                let metrics = state.controller.read().await.metrics();
                serde_json::to_value(metrics).unwrap_or_else(|e| {
                    serde_json::json!({
                        "success": false,
                        "error": IpcError::SerializationFailed(e).to_string()
                    })
                })
            }
        }
    }
}

#[cfg(unix)]
impl Drop for IpcServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}
