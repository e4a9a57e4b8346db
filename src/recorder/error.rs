//! Recording errors

use crate::capture::AcquisitionError;
use crate::encoder::EncodingError;
use crate::output::StorageError;
use thiserror::Error;

/// Errors surfaced by session operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No capture source selected")]
    NoSession,

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Session is not finalized yet")]
    NotFinalized,

    #[error("Completion barrier not reached ({completed}/{expected})")]
    BarrierPending { completed: usize, expected: usize },

    #[error("Session already finalized")]
    AlreadyFinalized,

    #[error("Session loop ended unexpectedly")]
    LoopClosed,

    #[error("Failed to open output location: {0}")]
    OpenLocation(#[source] std::io::Error),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
