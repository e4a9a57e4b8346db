//! Recording session
//!
//! A session owns its pipelines and the completion barrier. It is plain data
//! driven by one caller at a time; the coordinator's session loop is that
//! caller at runtime.

use super::barrier::CompletionBarrier;
use super::state::{Pipeline, PipelineKind, PipelineState, SessionSnapshot};
use crate::encoder::EncodedChunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Names a session and its output directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Random identifier: 36-char hyphenated lowercase hex (UUID v4)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Use the user's name when it has content, otherwise generate one.
    ///
    /// Path separators become `-` so the id always names a single directory.
    pub fn from_name(name: Option<&str>) -> Self {
        let cleaned = name
            .map(str::trim)
            .unwrap_or_default()
            .replace(['/', '\\'], "-");

        match cleaned.as_str() {
            "" | "." | ".." => Self::generate(),
            _ => Self(cleaned),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One recording session: up to three pipelines behind a completion barrier
#[derive(Debug)]
pub struct RecordingSession {
    id: SessionId,
    pipelines: Vec<Pipeline>,
    barrier: CompletionBarrier,
    finalized: bool,
    created_at: DateTime<Utc>,
}

impl RecordingSession {
    /// Screen and composite pipelines always exist; the secondary one only
    /// when its stream was acquired. The barrier expects one completion per
    /// pipeline created here.
    pub fn new(id: SessionId, secondary_present: bool) -> Self {
        let pipelines: Vec<Pipeline> = PipelineKind::ALL
            .into_iter()
            .filter(|kind| *kind != PipelineKind::Secondary || secondary_present)
            .map(Pipeline::new)
            .collect();
        let barrier = CompletionBarrier::new(pipelines.len());

        tracing::debug!(
            "Session {} created with {} pipelines",
            id,
            pipelines.len()
        );

        Self {
            id,
            pipelines,
            barrier,
            finalized: false,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn expected_completions(&self) -> usize {
        self.barrier.expected()
    }

    pub fn completion_count(&self) -> usize {
        self.barrier.count()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    pub fn pipeline(&self, kind: PipelineKind) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.kind() == kind)
    }

    fn pipeline_mut(&mut self, kind: PipelineKind) -> Option<&mut Pipeline> {
        self.pipelines.iter_mut().find(|p| p.kind() == kind)
    }

    pub fn has_pipeline(&self, kind: PipelineKind) -> bool {
        self.pipeline(kind).is_some()
    }

    pub fn is_recording(&self) -> bool {
        self.pipelines
            .iter()
            .any(|p| p.state() == PipelineState::Recording)
    }

    /// Move every idle pipeline to recording. Returns the ones that moved.
    pub fn start(&mut self) -> Vec<PipelineKind> {
        self.pipelines
            .iter_mut()
            .filter_map(|p| p.start().then(|| p.kind()))
            .collect()
    }

    /// Buffer a chunk emitted by `kind`
    pub fn push_chunk(&mut self, kind: PipelineKind, chunk: EncodedChunk) -> bool {
        self.pipeline_mut(kind)
            .map(|p| p.push_chunk(chunk))
            .unwrap_or(false)
    }

    /// Flag an encoder failure; the pipeline still completes on stop
    pub fn mark_failed(&mut self, kind: PipelineKind) {
        if let Some(pipeline) = self.pipeline_mut(kind) {
            pipeline.mark_failed();
        }
    }

    /// Stop every recording pipeline.
    ///
    /// Returns true if this call satisfied the completion barrier.
    pub fn stop(&mut self) -> bool {
        let recording: Vec<PipelineKind> = self
            .pipelines
            .iter()
            .filter(|p| p.state() == PipelineState::Recording)
            .map(|p| p.kind())
            .collect();

        let mut fired = false;
        for kind in recording {
            fired |= self.stop_pipeline(kind);
        }
        fired
    }

    /// Record that `kind` reached `Stopped`.
    ///
    /// Each pipeline counts once; repeated stops and absent pipelines are
    /// no-ops. Returns true exactly once per session: on the stop that
    /// satisfies the barrier.
    pub fn stop_pipeline(&mut self, kind: PipelineKind) -> bool {
        let Some(pipeline) = self.pipeline_mut(kind) else {
            tracing::debug!("Ignoring stop for absent {} pipeline", kind);
            return false;
        };
        if !pipeline.stop() {
            return false;
        }

        let fired = self.barrier.arrive();
        tracing::debug!(
            "Session {}: {} pipeline stopped ({}/{})",
            self.id,
            kind,
            self.barrier.count(),
            self.barrier.expected()
        );
        fired
    }

    /// Whether the barrier fired and finalization hasn't run yet
    pub fn ready_to_finalize(&self) -> bool {
        self.barrier.has_fired() && !self.finalized
    }

    /// Take the single right to finalize. False if not ready or already taken.
    pub(crate) fn claim_finalization(&mut self) -> bool {
        if !self.ready_to_finalize() {
            return false;
        }
        self.finalized = true;
        true
    }

    /// Drop every buffered chunk
    pub fn clear_buffers(&mut self) {
        for pipeline in &mut self.pipelines {
            pipeline.clear_buffer();
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.to_string(),
            pipelines: self.pipelines.iter().map(Pipeline::snapshot).collect(),
            completion_count: self.barrier.count(),
            expected_completions: self.barrier.expected(),
            finalized: self.finalized,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_canonical_uuid(s: &str) -> bool {
        let bytes = s.as_bytes();
        if bytes.len() != 36 {
            return false;
        }
        for (i, b) in bytes.iter().enumerate() {
            match i {
                8 | 13 | 18 | 23 => {
                    if *b != b'-' {
                        return false;
                    }
                }
                _ => {
                    if !matches!(b, b'0'..=b'9' | b'a'..=b'f') {
                        return false;
                    }
                }
            }
        }
        bytes[14] == b'4' && matches!(bytes[19], b'8' | b'9' | b'a' | b'b')
    }

    fn chunk(bytes: &[u8]) -> EncodedChunk {
        EncodedChunk::from(bytes)
    }

    #[test]
    fn test_generated_id_is_canonical() {
        for _ in 0..32 {
            let id = SessionId::from_name(None);
            assert!(is_canonical_uuid(id.as_str()), "bad id {}", id);
        }
    }

    #[test]
    fn test_user_name_trimmed_and_blank_falls_back() {
        assert_eq!(SessionId::from_name(Some("  demo take 1 ")).as_str(), "demo take 1");
        assert!(is_canonical_uuid(SessionId::from_name(Some("   ")).as_str()));
        assert!(is_canonical_uuid(SessionId::from_name(Some("..")).as_str()));
        assert_eq!(SessionId::from_name(Some("a/b\\c")).as_str(), "a-b-c");
    }

    #[test]
    fn test_expected_completions_follow_secondary() {
        let without = RecordingSession::new(SessionId::generate(), false);
        assert_eq!(without.expected_completions(), 2);
        assert!(!without.has_pipeline(PipelineKind::Secondary));

        let with = RecordingSession::new(SessionId::generate(), true);
        assert_eq!(with.expected_completions(), 3);
        assert!(with.has_pipeline(PipelineKind::Secondary));
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut session = RecordingSession::new(SessionId::generate(), true);
        assert_eq!(session.start().len(), 3);
        assert!(session.start().is_empty());
        assert!(session.is_recording());
    }

    #[test]
    fn test_stop_before_start_changes_nothing() {
        let mut session = RecordingSession::new(SessionId::generate(), false);
        assert!(!session.stop());
        assert_eq!(session.completion_count(), 0);
        assert!(session
            .pipelines()
            .iter()
            .all(|p| p.state() == PipelineState::Idle));
    }

    #[test]
    fn test_barrier_fires_after_third_stop_in_any_order() {
        let mut session = RecordingSession::new(SessionId::generate(), true);
        session.start();
        for kind in PipelineKind::ALL {
            assert!(session.push_chunk(kind, chunk(b"x")));
        }

        assert!(!session.stop_pipeline(PipelineKind::Composite));
        assert!(!session.stop_pipeline(PipelineKind::Screen));
        assert!(!session.ready_to_finalize());
        assert!(session.stop_pipeline(PipelineKind::Secondary));
        assert!(session.ready_to_finalize());
        assert_eq!(session.completion_count(), 3);
    }

    #[test]
    fn test_repeated_stop_is_noop() {
        let mut session = RecordingSession::new(SessionId::generate(), true);
        session.start();

        assert!(!session.stop_pipeline(PipelineKind::Screen));
        assert!(!session.stop_pipeline(PipelineKind::Screen));
        assert_eq!(session.completion_count(), 1);

        assert!(!session.stop_pipeline(PipelineKind::Secondary));
        assert!(session.stop_pipeline(PipelineKind::Composite));
        assert!(!session.stop_pipeline(PipelineKind::Composite));
        assert!(!session.stop());
        assert_eq!(session.completion_count(), 3);
    }

    #[test]
    fn test_absent_secondary_stop_not_counted() {
        let mut session = RecordingSession::new(SessionId::generate(), false);
        session.start();

        assert!(!session.stop_pipeline(PipelineKind::Secondary));
        assert_eq!(session.completion_count(), 0);
        assert!(session.stop());
        assert_eq!(session.completion_count(), 2);
    }

    #[test]
    fn test_finalization_claimed_once() {
        let mut session = RecordingSession::new(SessionId::generate(), false);
        assert!(!session.claim_finalization());

        session.start();
        session.stop();
        assert!(session.claim_finalization());
        assert!(session.is_finalized());
        assert!(!session.claim_finalization());
    }

    #[test]
    fn test_chunks_after_stop_are_rejected() {
        let mut session = RecordingSession::new(SessionId::generate(), false);
        session.start();
        assert!(session.push_chunk(PipelineKind::Screen, chunk(b"ok")));
        session.stop_pipeline(PipelineKind::Screen);
        assert!(!session.push_chunk(PipelineKind::Screen, chunk(b"late")));
        assert!(!session.push_chunk(PipelineKind::Secondary, chunk(b"absent")));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.pipeline(PipelineKind::Screen).unwrap().chunk_count, 1);
        assert_eq!(snapshot.completion_count, 1);
    }
}
