//! Capture sources and live streams
//!
//! Platform capture lives behind [`CaptureBackend`]; this module owns the
//! stream types the rest of the crate consumes and the acquisition policy.

pub mod acquisition;
pub mod memory;
pub mod stream;
pub mod traits;

pub use acquisition::{AcquiredStreams, CaptureAcquisition};
pub use memory::MemoryCaptureBackend;
pub use stream::{live_stream, FramePublisher, LiveStream, VideoFrame};
pub use traits::{
    AcquisitionError, CaptureBackend, CaptureSource, Resolution, SourceCatalog, SourceKind,
};
