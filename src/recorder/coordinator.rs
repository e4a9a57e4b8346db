//! Recording coordinator
//!
//! Owns the active session's tasks: the compositor, one worker per pipeline,
//! and the session loop. The loop is the only owner of the
//! [`RecordingSession`]; it applies pipeline events in arrival order and runs
//! the finalizer when the completion barrier fires.

use super::channel::{PipelineCommand, PipelineEvent, PipelineWorker};
use super::error::{SessionError, SessionResult};
use super::finalizer::{FinalizeReport, SessionFinalizer};
use super::session::{RecordingSession, SessionId};
use super::state::{PipelineKind, RecordingState, SessionSnapshot};
use crate::capture::{CaptureAcquisition, CaptureBackend, CaptureSource, LiveStream};
use crate::compositor::{Compositor, CompositorHandle};
use crate::config::RecorderConfig;
use crate::encoder::EncoderFactory;
use crate::output::{LocationOpener, OutputStore};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Events emitted during a session
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// Source selected and pipelines created
    SessionPrepared { session_id: String, secondary: bool },
    /// Recording started
    Started,
    /// Stop sent to every pipeline
    StopRequested,
    /// One pipeline reached `Stopped`
    PipelineStopped(PipelineKind),
    /// A pipeline's encoder failed
    PipelineFailed { kind: PipelineKind, message: String },
    /// Outputs written
    Finalized(FinalizeReport),
    /// Error occurred
    Error(String),
}

enum LoopControl {
    Start,
    Stop,
}

/// Tasks and handles of the currently selected session
struct ActiveSession {
    id: SessionId,
    control: mpsc::UnboundedSender<LoopControl>,
    snapshot: watch::Receiver<SessionSnapshot>,
    preview: LiveStream,
    compositor: Option<CompositorHandle>,
    workers: Vec<JoinHandle<()>>,
    session_loop: Option<JoinHandle<SessionResult<FinalizeReport>>>,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        if let Some(compositor) = self.compositor.take() {
            compositor.cancel();
        }
        for worker in self.workers.drain(..) {
            worker.abort();
        }
        // Aborting the loop drops the session and every buffered chunk
        if let Some(session_loop) = self.session_loop.take() {
            tracing::debug!("Discarding session {}", self.id);
            session_loop.abort();
        }
    }
}

/// Drives one session at a time on behalf of the host
pub struct RecordingCoordinator {
    /// Current recording state
    state: Arc<RwLock<RecordingState>>,

    config: RecorderConfig,
    acquisition: CaptureAcquisition,
    encoders: Arc<dyn EncoderFactory>,
    finalizer: SessionFinalizer,
    opener: Arc<dyn LocationOpener>,

    active: Option<ActiveSession>,

    /// Report of the most recent finalized session
    last_report: Option<FinalizeReport>,

    /// Event broadcaster
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingCoordinator {
    /// Create a new recording coordinator
    pub fn new(
        config: RecorderConfig,
        backend: Arc<dyn CaptureBackend>,
        encoders: Arc<dyn EncoderFactory>,
        store: Arc<dyn OutputStore>,
        opener: Arc<dyn LocationOpener>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            state: Arc::new(RwLock::new(RecordingState::Idle)),
            config,
            acquisition: CaptureAcquisition::new(backend),
            encoders,
            finalizer: SessionFinalizer::new(store),
            opener,
            active: None,
            last_report: None,
            event_tx,
        }
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        *self.state.read()
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.active.as_ref().map(|a| &a.id)
    }

    /// Latest snapshot of the selected session
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.active.as_ref().map(|a| a.snapshot.borrow().clone())
    }

    /// Snapshot updates of the selected session
    pub fn watch_snapshot(&self) -> Option<watch::Receiver<SessionSnapshot>> {
        self.active.as_ref().map(|a| a.snapshot.clone())
    }

    /// The composite stream, for live preview
    pub fn preview(&self) -> Option<LiveStream> {
        self.active.as_ref().map(|a| a.preview.clone())
    }

    pub fn last_report(&self) -> Option<&FinalizeReport> {
        self.last_report.as_ref()
    }

    /// Select a source and prepare a new session.
    ///
    /// Any previous session is torn down first and its buffers discarded.
    /// Pipelines are created idle; recording begins with
    /// [`start_recording`](Self::start_recording).
    pub async fn start_session(
        &mut self,
        source: &CaptureSource,
        include_secondary: bool,
        name: Option<&str>,
    ) -> SessionResult<SessionSnapshot> {
        if let Some(previous) = self.active.take() {
            tracing::info!("Replacing session {} with a new source selection", previous.id);
        }
        *self.state.write() = RecordingState::Idle;
        self.last_report = None;

        let id = SessionId::from_name(name);
        tracing::info!("Preparing session {} for source '{}'", id, source.display_name);

        let streams = self
            .acquisition
            .acquire(
                source,
                include_secondary,
                self.config.degrade_on_secondary_failure,
            )
            .await
            .inspect_err(|e| {
                let _ = self.event_tx.send(RecordingEvent::Error(e.to_string()));
            })?;
        let secondary_present = streams.secondary.is_some();

        let (compositor, composite) =
            Compositor::new(streams.screen.clone(), streams.secondary.clone(), &self.config);
        let session = RecordingSession::new(id.clone(), secondary_present);

        let (command_tx, command_rx) = watch::channel(PipelineCommand::Standby);
        let (pipeline_tx, pipeline_rx) = mpsc::unbounded_channel();

        let mut workers = Vec::with_capacity(session.pipelines().len());
        for pipeline in session.pipelines() {
            let kind = pipeline.kind();
            let stream = match kind {
                PipelineKind::Screen => streams.screen.clone(),
                PipelineKind::Secondary => match &streams.secondary {
                    Some(stream) => stream.clone(),
                    None => continue,
                },
                PipelineKind::Composite => composite.clone(),
            };
            let encoder = self.encoders.create(kind, stream.resolution())?;
            workers.push(PipelineWorker::new(
                kind,
                stream,
                encoder,
                command_rx.clone(),
                pipeline_tx.clone(),
            ));
        }
        // The loop sees the event channel close once every worker is gone
        drop(pipeline_tx);

        let snapshot = session.snapshot();
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot.clone());
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let compositor = compositor.spawn(self.config.frame_interval());
        let workers = workers.into_iter().map(PipelineWorker::spawn).collect();
        let session_loop = tokio::spawn(
            SessionLoop {
                session,
                control: control_rx,
                events: pipeline_rx,
                commands: command_tx,
                snapshots: snapshot_tx,
                finalizer: self.finalizer.clone(),
                notify: self.event_tx.clone(),
            }
            .run(),
        );

        self.active = Some(ActiveSession {
            id: id.clone(),
            control: control_tx,
            snapshot: snapshot_rx,
            preview: composite,
            compositor: Some(compositor),
            workers,
            session_loop: Some(session_loop),
        });

        *self.state.write() = RecordingState::Ready;
        let _ = self.event_tx.send(RecordingEvent::SessionPrepared {
            session_id: id.to_string(),
            secondary: secondary_present,
        });

        tracing::info!(
            "Session {} ready, expecting {} completions",
            id,
            snapshot.expected_completions
        );
        Ok(snapshot)
    }

    /// Start every pipeline of the selected session
    pub fn start_recording(&mut self) -> SessionResult<()> {
        match self.state() {
            RecordingState::Idle => return Err(SessionError::NoSession),
            RecordingState::Ready => {}
            RecordingState::Recording => return Err(SessionError::AlreadyRecording),
            RecordingState::Finalizing | RecordingState::Complete => {
                return Err(SessionError::AlreadyFinalized)
            }
        }

        let active = self.active.as_ref().ok_or(SessionError::NoSession)?;
        active
            .control
            .send(LoopControl::Start)
            .map_err(|_| SessionError::LoopClosed)?;

        *self.state.write() = RecordingState::Recording;
        tracing::info!("Recording started");
        Ok(())
    }

    /// Stop recording and wait for the session to finalize.
    ///
    /// Resolves once every pipeline has reported its last chunk and the
    /// outputs have been written.
    pub async fn stop_session(&mut self) -> SessionResult<FinalizeReport> {
        match self.state() {
            RecordingState::Idle => return Err(SessionError::NoSession),
            RecordingState::Recording => {}
            _ => return Err(SessionError::NotRecording),
        }

        let active = self.active.as_mut().ok_or(SessionError::NoSession)?;
        tracing::info!("Stopping session {}", active.id);
        *self.state.write() = RecordingState::Finalizing;

        active
            .control
            .send(LoopControl::Stop)
            .map_err(|_| SessionError::LoopClosed)?;

        if let Some(compositor) = active.compositor.take() {
            let frames = compositor.shutdown().await;
            tracing::debug!("Compositor rendered {} frames", frames);
        }

        let session_loop = active.session_loop.take().ok_or(SessionError::LoopClosed)?;
        let result = match session_loop.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Session loop failed: {}", e);
                let _ = self.event_tx.send(RecordingEvent::Error(e.to_string()));
                Err(SessionError::LoopClosed)
            }
        };

        *self.state.write() = RecordingState::Complete;

        let report = result?;
        tracing::info!(
            "Session {} finalized: {} files written, {} failed",
            report.session_id,
            report.written.len(),
            report.failed.len()
        );
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Open the most recently finalized session's output location
    pub fn notify_finalized(&self) -> SessionResult<PathBuf> {
        let report = self.last_report.as_ref().ok_or(SessionError::NotFinalized)?;
        self.opener
            .open(&report.output_dir)
            .map_err(SessionError::OpenLocation)?;
        Ok(report.output_dir.clone())
    }
}

/// The task that owns a session's state
struct SessionLoop {
    session: RecordingSession,
    control: mpsc::UnboundedReceiver<LoopControl>,
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    commands: watch::Sender<PipelineCommand>,
    snapshots: watch::Sender<SessionSnapshot>,
    finalizer: SessionFinalizer,
    notify: broadcast::Sender<RecordingEvent>,
}

impl SessionLoop {
    async fn run(mut self) -> SessionResult<FinalizeReport> {
        let mut control_open = true;

        loop {
            tokio::select! {
                control = self.control.recv(), if control_open => match control {
                    Some(LoopControl::Start) => self.start(),
                    Some(LoopControl::Stop) => self.request_stop(),
                    None => control_open = false,
                },
                event = self.events.recv() => match event {
                    Some(event) => {
                        if let Some(result) = self.apply(event).await {
                            return result;
                        }
                    }
                    None => {
                        tracing::error!(
                            "Session {}: pipelines exited before completion",
                            self.session.id()
                        );
                        return Err(SessionError::LoopClosed);
                    }
                },
            }
        }
    }

    fn start(&mut self) {
        let started = self.session.start();
        if started.is_empty() {
            return;
        }
        // Pipelines are Recording before any worker can emit
        self.commands.send_replace(PipelineCommand::Record);
        self.publish();
        let _ = self.notify.send(RecordingEvent::Started);
    }

    fn request_stop(&mut self) {
        self.commands.send_replace(PipelineCommand::Stop);
        let _ = self.notify.send(RecordingEvent::StopRequested);
    }

    /// Apply one pipeline event. Returns the finalization result once the
    /// barrier fires.
    async fn apply(&mut self, event: PipelineEvent) -> Option<SessionResult<FinalizeReport>> {
        match event {
            PipelineEvent::Chunk { kind, chunk } => {
                if !self.session.push_chunk(kind, chunk) {
                    tracing::debug!("Dropped chunk for {} pipeline", kind);
                }
            }
            PipelineEvent::Failed { kind, error } => {
                self.session.mark_failed(kind);
                let _ = self.notify.send(RecordingEvent::PipelineFailed {
                    kind,
                    message: error.to_string(),
                });
            }
            PipelineEvent::Stopped { kind } => {
                let fired = self.session.stop_pipeline(kind);
                let _ = self.notify.send(RecordingEvent::PipelineStopped(kind));

                if fired {
                    let result = self.finalizer.finalize(&mut self.session).await;
                    self.publish();
                    let _ = match &result {
                        Ok(report) => self.notify.send(RecordingEvent::Finalized(report.clone())),
                        Err(e) => self.notify.send(RecordingEvent::Error(e.to_string())),
                    };
                    return Some(result);
                }
            }
        }

        self.publish();
        None
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.session.snapshot());
    }
}
