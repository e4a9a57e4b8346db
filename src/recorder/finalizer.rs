//! Session finalization
//!
//! Runs once per session after the completion barrier fires: writes each
//! pipeline's buffered chunks to its file under the session directory, then
//! releases every buffer.

use super::error::{SessionError, SessionResult};
use super::session::RecordingSession;
use super::state::PipelineKind;
use crate::encoder::EncoderProfile;
use crate::output::OutputStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// A file that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedWrite {
    pub kind: PipelineKind,
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of a finalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeReport {
    pub session_id: String,
    pub output_dir: PathBuf,
    /// Files written, in pipeline order
    pub written: Vec<PathBuf>,
    pub failed: Vec<FailedWrite>,
    /// Composite bytes existed but were dropped because no camera footage was
    /// recorded
    pub composite_discarded: bool,
    pub finalized_at: DateTime<Utc>,
}

impl FinalizeReport {
    pub fn wrote(&self, file_name: &str) -> bool {
        self.written
            .iter()
            .any(|p| p.file_name().is_some_and(|n| n == file_name))
    }
}

/// Persists finished sessions through an [`OutputStore`]
#[derive(Clone)]
pub struct SessionFinalizer {
    store: Arc<dyn OutputStore>,
    profile: EncoderProfile,
}

impl SessionFinalizer {
    pub fn new(store: Arc<dyn OutputStore>) -> Self {
        Self {
            store,
            profile: EncoderProfile::WEBM_VP9,
        }
    }

    /// Directory the session's files go to
    pub fn output_dir(&self, session: &RecordingSession) -> PathBuf {
        self.store.session_dir(session.id().as_str())
    }

    /// Write the session's outputs and clear its buffers.
    ///
    /// Fails without side effects if the barrier hasn't fired or the session
    /// was already finalized. A directory-creation failure aborts before any
    /// write; buffers are cleared on every path past the guard.
    pub async fn finalize(&self, session: &mut RecordingSession) -> SessionResult<FinalizeReport> {
        if session.is_finalized() {
            return Err(SessionError::AlreadyFinalized);
        }
        if !session.claim_finalization() {
            return Err(SessionError::BarrierPending {
                completed: session.completion_count(),
                expected: session.expected_completions(),
            });
        }

        let result = self.write_outputs(session).await;
        session.clear_buffers();
        result
    }

    async fn write_outputs(&self, session: &RecordingSession) -> SessionResult<FinalizeReport> {
        let output_dir = self.output_dir(session);

        if let Err(e) = self.store.create_dir(&output_dir).await {
            tracing::error!("Error creating folder: {}", e);
            return Err(e.into());
        }

        let secondary_recorded = session
            .pipeline(PipelineKind::Secondary)
            .is_some_and(|p| !p.is_empty());

        let mut written = Vec::new();
        let mut failed = Vec::new();
        let mut composite_discarded = false;

        for pipeline in session.pipelines() {
            let kind = pipeline.kind();
            if pipeline.is_empty() {
                continue;
            }
            if kind == PipelineKind::Composite && !secondary_recorded {
                composite_discarded = true;
                continue;
            }

            let path = output_dir.join(kind.file_name(&self.profile));
            let bytes = pipeline.concat();
            let len = bytes.len();

            match self.store.write_file(&path, bytes).await {
                Ok(()) => {
                    tracing::info!("{} recording saved to {:?} ({} bytes)", kind, path, len);
                    written.push(path);
                }
                Err(e) => {
                    tracing::error!("Error saving {} recording: {}", kind, e);
                    failed.push(FailedWrite {
                        kind,
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        if !secondary_recorded {
            tracing::info!("Final combined video not saved because camera recording was not present");
        }

        Ok(FinalizeReport {
            session_id: session.id().to_string(),
            output_dir,
            written,
            failed,
            composite_discarded,
            finalized_at: Utc::now(),
        })
    }
}
