//! Recording-related host commands

use crate::capture::{CaptureBackend, CaptureSource, SourceCatalog};
use crate::config::RecorderConfig;
use crate::encoder::FfmpegEncoderFactory;
use crate::output::{FsOutputStore, SystemOpener};
use crate::recorder::{FinalizeReport, RecordingCoordinator, RecordingState, SessionSnapshot};
use crate::utils::{command_error, AppResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Host-managed state for recording
pub struct RecorderState {
    pub coordinator: Arc<Mutex<RecordingCoordinator>>,
    pub catalog: Arc<dyn SourceCatalog>,
}

impl RecorderState {
    pub fn new(coordinator: RecordingCoordinator, catalog: Arc<dyn SourceCatalog>) -> Self {
        Self {
            coordinator: Arc::new(Mutex::new(coordinator)),
            catalog,
        }
    }

    /// FFmpeg encoders, filesystem output under `config.output_root`, and
    /// the platform file browser
    pub fn with_backend<B>(config: RecorderConfig, backend: Arc<B>) -> Self
    where
        B: CaptureBackend + SourceCatalog + 'static,
    {
        let encoders = Arc::new(FfmpegEncoderFactory::new(
            config.encoder.clone(),
            config.frame_rate,
        ));
        let store = Arc::new(FsOutputStore::new(config.output_root.clone()));
        let coordinator = RecordingCoordinator::new(
            config,
            backend.clone(),
            encoders,
            store,
            Arc::new(SystemOpener),
        );
        Self::new(coordinator, backend)
    }

    /// Like [`with_backend`](Self::with_backend), reading the config from a
    /// JSON file
    pub fn from_config_file<B>(path: &Path, backend: Arc<B>) -> AppResult<Self>
    where
        B: CaptureBackend + SourceCatalog + 'static,
    {
        let config = RecorderConfig::load(path)?;
        Ok(Self::with_backend(config, backend))
    }
}

/// List selectable screens and windows
pub async fn list_sources(state: &RecorderState) -> Result<Vec<CaptureSource>, String> {
    Ok(state.catalog.sources().await)
}

/// Select a source and prepare a session (pipelines idle)
pub async fn start_session(
    state: &RecorderState,
    source: CaptureSource,
    include_secondary: bool,
    name: Option<String>,
) -> Result<SessionSnapshot, String> {
    let mut coordinator = state.coordinator.lock().await;
    coordinator
        .start_session(&source, include_secondary, name.as_deref())
        .await
        .map_err(command_error)
}

/// Start recording
pub async fn start_recording(state: &RecorderState) -> Result<(), String> {
    let mut coordinator = state.coordinator.lock().await;
    coordinator.start_recording().map_err(command_error)
}

/// Stop recording and wait for the outputs to be written
pub async fn stop_session(state: &RecorderState) -> Result<FinalizeReport, String> {
    let mut coordinator = state.coordinator.lock().await;
    coordinator.stop_session().await.map_err(command_error)
}

/// Reveal the last finalized session's directory
pub async fn notify_finalized(state: &RecorderState) -> Result<PathBuf, String> {
    let coordinator = state.coordinator.lock().await;
    coordinator.notify_finalized().map_err(command_error)
}

/// Get the selected session's snapshot
pub async fn get_session_state(state: &RecorderState) -> Result<Option<SessionSnapshot>, String> {
    let coordinator = state.coordinator.lock().await;
    Ok(coordinator.snapshot())
}

/// Get current recording state
pub async fn get_recording_state(state: &RecorderState) -> Result<RecordingState, String> {
    let coordinator = state.coordinator.lock().await;
    Ok(coordinator.state())
}
