//! Recording system module
//!
//! - `RecordingSession` owns the pipelines and the completion barrier
//! - `PipelineWorker` runs capture+encode for one pipeline
//! - `RecordingCoordinator` drives a session's tasks for the host
//! - `SessionFinalizer` writes the outputs once the barrier fires

pub mod barrier;
pub mod channel;
pub mod coordinator;
pub mod error;
pub mod finalizer;
pub mod session;
pub mod state;

pub use barrier::CompletionBarrier;
pub use channel::{PipelineCommand, PipelineEvent, PipelineWorker};
pub use coordinator::{RecordingCoordinator, RecordingEvent};
pub use error::{SessionError, SessionResult};
pub use finalizer::{FailedWrite, FinalizeReport, SessionFinalizer};
pub use session::{RecordingSession, SessionId};
pub use state::{
    Pipeline, PipelineKind, PipelineSnapshot, PipelineState, RecordingState, SessionSnapshot,
};
