//! Recording state management
//!
//! Per-pipeline state machine and the serializable snapshots handed to the
//! host.

use crate::encoder::{EncodedChunk, EncoderProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three pipelines a session can own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    /// Raw screen/window capture
    Screen,
    /// Camera capture
    Secondary,
    /// Picture-in-picture composite
    Composite,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] = [
        PipelineKind::Screen,
        PipelineKind::Secondary,
        PipelineKind::Composite,
    ];

    /// Base name of the output file
    pub fn file_stem(&self) -> &'static str {
        match self {
            PipelineKind::Screen => "screen",
            PipelineKind::Secondary => "webcam",
            PipelineKind::Composite => "final",
        }
    }

    pub fn file_name(&self, profile: &EncoderProfile) -> String {
        format!("{}.{}", self.file_stem(), profile.extension())
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Screen => write!(f, "screen"),
            PipelineKind::Secondary => write!(f, "secondary"),
            PipelineKind::Composite => write!(f, "composite"),
        }
    }
}

/// Coordinator phase as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No source selected
    #[default]
    Idle,
    /// Source selected, pipelines created
    Ready,
    Recording,
    /// Stop requested, waiting on the barrier and the finalizer
    Finalizing,
    Complete,
}

/// Lifecycle of a single pipeline. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    #[default]
    Idle,
    Recording,
    Stopped,
}

/// One capture+encode unit and the chunks it has produced
#[derive(Debug)]
pub struct Pipeline {
    kind: PipelineKind,
    state: PipelineState,
    buffer: Vec<EncodedChunk>,
    buffered_bytes: usize,
    failed: bool,
}

impl Pipeline {
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            kind,
            state: PipelineState::Idle,
            buffer: Vec::new(),
            buffered_bytes: 0,
            failed: false,
        }
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn chunks(&self) -> &[EncodedChunk] {
        &self.buffer
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Idle → Recording. Any other state is left untouched.
    pub fn start(&mut self) -> bool {
        if self.state != PipelineState::Idle {
            return false;
        }
        self.state = PipelineState::Recording;
        true
    }

    /// Append a chunk while recording. Empty chunks and chunks arriving in
    /// any other state are dropped.
    pub fn push_chunk(&mut self, chunk: EncodedChunk) -> bool {
        if self.state != PipelineState::Recording || chunk.is_empty() {
            return false;
        }
        self.buffered_bytes += chunk.len();
        self.buffer.push(chunk);
        true
    }

    /// Move to `Stopped`. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        if self.state == PipelineState::Stopped {
            return false;
        }
        self.state = PipelineState::Stopped;
        true
    }

    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    /// All chunks joined in emission order
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.buffered_bytes);
        for chunk in &self.buffer {
            out.extend_from_slice(chunk.as_bytes());
        }
        out
    }

    /// Release the buffered chunks
    pub fn clear_buffer(&mut self) {
        self.buffer = Vec::new();
        self.buffered_bytes = 0;
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            kind: self.kind,
            state: self.state,
            chunk_count: self.buffer.len(),
            buffered_bytes: self.buffered_bytes,
            failed: self.failed,
        }
    }
}

/// Host-facing view of one pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSnapshot {
    pub kind: PipelineKind,
    pub state: PipelineState,
    pub chunk_count: usize,
    pub buffered_bytes: usize,
    pub failed: bool,
}

/// Host-facing view of a recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub pipelines: Vec<PipelineSnapshot>,
    pub completion_count: usize,
    pub expected_completions: usize,
    pub finalized: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn pipeline(&self, kind: PipelineKind) -> Option<&PipelineSnapshot> {
        self.pipelines.iter().find(|p| p.kind == kind)
    }
}
