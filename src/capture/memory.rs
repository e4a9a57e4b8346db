//! In-memory capture backend
//!
//! Sources and the camera are plain frame publishers. Hosts without native
//! capture and the test suites feed frames through it.

use super::stream::{live_stream, FramePublisher, LiveStream, VideoFrame};
use super::traits::{AcquisitionError, CaptureBackend, CaptureSource, Resolution, SourceCatalog};
use async_trait::async_trait;
use parking_lot::RwLock;

struct MemorySource {
    source: CaptureSource,
    resolution: Option<Resolution>,
    publisher: FramePublisher,
}

struct MemoryCamera {
    resolution: Option<Resolution>,
    publisher: FramePublisher,
}

struct Inner {
    sources: Vec<MemorySource>,
    camera: Option<MemoryCamera>,
    permission_granted: bool,
}

/// Capture backend whose frames are pushed by the caller
pub struct MemoryCaptureBackend {
    inner: RwLock<Inner>,
}

impl MemoryCaptureBackend {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                sources: Vec::new(),
                camera: None,
                permission_granted: true,
            }),
        }
    }

    /// Register a selectable screen/window source
    pub fn add_source(&self, source: CaptureSource, resolution: Option<Resolution>) {
        let (publisher, _) = live_stream(&source.id, resolution);
        self.inner.write().sources.push(MemorySource {
            source,
            resolution,
            publisher,
        });
    }

    pub fn attach_camera(&self, resolution: Option<Resolution>) {
        let (publisher, _) = live_stream("camera", resolution);
        self.inner.write().camera = Some(MemoryCamera {
            resolution,
            publisher,
        });
    }

    pub fn detach_camera(&self) {
        self.inner.write().camera = None;
    }

    pub fn set_permission_granted(&self, granted: bool) {
        self.inner.write().permission_granted = granted;
    }

    /// Push a frame to a screen source. Returns false for unknown ids.
    pub fn publish_screen(&self, source_id: &str, frame: VideoFrame) -> bool {
        let inner = self.inner.read();
        match inner.sources.iter().find(|s| s.source.id == source_id) {
            Some(source) => {
                source.publisher.publish(frame);
                true
            }
            None => false,
        }
    }

    /// Push a frame to the camera. Returns false when no camera is attached.
    pub fn publish_camera(&self, frame: VideoFrame) -> bool {
        match self.inner.read().camera.as_ref() {
            Some(camera) => {
                camera.publisher.publish(frame);
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryCaptureBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureBackend for MemoryCaptureBackend {
    async fn open_screen(&self, source_id: &str) -> Result<LiveStream, AcquisitionError> {
        let inner = self.inner.read();
        if !inner.permission_granted {
            return Err(AcquisitionError::PermissionDenied(
                "screen recording permission not granted".to_string(),
            ));
        }

        inner
            .sources
            .iter()
            .find(|s| s.source.id == source_id)
            .map(|s| s.publisher.subscribe(&s.source.id, s.resolution))
            .ok_or_else(|| AcquisitionError::InvalidSource(source_id.to_string()))
    }

    async fn open_camera(&self) -> Result<LiveStream, AcquisitionError> {
        let inner = self.inner.read();
        if !inner.permission_granted {
            return Err(AcquisitionError::PermissionDenied(
                "camera permission not granted".to_string(),
            ));
        }

        inner
            .camera
            .as_ref()
            .map(|c| c.publisher.subscribe("camera", c.resolution))
            .ok_or_else(|| AcquisitionError::DeviceUnavailable("no camera attached".to_string()))
    }
}

#[async_trait]
impl SourceCatalog for MemoryCaptureBackend {
    async fn sources(&self) -> Vec<CaptureSource> {
        self.inner
            .read()
            .sources
            .iter()
            .map(|s| s.source.clone())
            .collect()
    }
}
