//! Stream acquisition
//!
//! Obtains the screen stream and, when requested, the camera stream before a
//! session is assembled.

use super::stream::LiveStream;
use super::traits::{AcquisitionError, CaptureBackend, CaptureSource};
use std::sync::Arc;

/// Streams handed to the compositor and the recording pipelines
#[derive(Debug, Clone)]
pub struct AcquiredStreams {
    pub screen: LiveStream,
    pub secondary: Option<LiveStream>,
}

/// Thin policy layer over a [`CaptureBackend`]
#[derive(Clone)]
pub struct CaptureAcquisition {
    backend: Arc<dyn CaptureBackend>,
}

impl CaptureAcquisition {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self { backend }
    }

    /// Acquire the live stream for a screen or window source
    pub async fn acquire_screen(&self, source_id: &str) -> Result<LiveStream, AcquisitionError> {
        if source_id.trim().is_empty() {
            return Err(AcquisitionError::InvalidSource(source_id.to_string()));
        }

        let stream = self.backend.open_screen(source_id).await?;
        tracing::info!(
            "Acquired screen stream '{}' ({:?})",
            stream.label(),
            stream.resolution()
        );
        Ok(stream)
    }

    /// Acquire the camera stream. Not requested is `Ok(None)`, not an error.
    pub async fn acquire_secondary(
        &self,
        requested: bool,
    ) -> Result<Option<LiveStream>, AcquisitionError> {
        if !requested {
            return Ok(None);
        }

        let stream = self.backend.open_camera().await?;
        tracing::info!("Acquired camera stream '{}'", stream.label());
        Ok(Some(stream))
    }

    /// Acquire everything a session needs, screen first.
    ///
    /// With `degrade_on_secondary_failure` a camera failure leaves the
    /// secondary stream absent instead of failing the whole acquisition.
    pub async fn acquire(
        &self,
        source: &CaptureSource,
        include_secondary: bool,
        degrade_on_secondary_failure: bool,
    ) -> Result<AcquiredStreams, AcquisitionError> {
        let screen = self.acquire_screen(&source.id).await?;

        let secondary = match self.acquire_secondary(include_secondary).await {
            Ok(stream) => stream,
            Err(e) if degrade_on_secondary_failure => {
                tracing::warn!("Camera unavailable, recording without it: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        Ok(AcquiredStreams { screen, secondary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::memory::MemoryCaptureBackend;
    use crate::capture::traits::{Resolution, SourceKind};

    fn backend() -> Arc<MemoryCaptureBackend> {
        let backend = MemoryCaptureBackend::new();
        backend.add_source(
            CaptureSource::new("screen:1", "Display 1", SourceKind::Screen),
            Some(Resolution::new(64, 36)),
        );
        Arc::new(backend)
    }

    #[tokio::test]
    async fn test_secondary_not_requested_is_absent() {
        let acquisition = CaptureAcquisition::new(backend());
        assert!(acquisition.acquire_secondary(false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_source_fails() {
        let acquisition = CaptureAcquisition::new(backend());
        let err = acquisition.acquire_screen("window:404").await.unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidSource(_)));

        let err = acquisition.acquire_screen("  ").await.unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidSource(_)));
    }

    #[tokio::test]
    async fn test_missing_camera_aborts_unless_degraded() {
        let backend = backend();
        let acquisition = CaptureAcquisition::new(backend.clone());
        let source = CaptureSource::new("screen:1", "Display 1", SourceKind::Screen);

        let err = acquisition.acquire(&source, true, false).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::DeviceUnavailable(_)));

        let streams = acquisition.acquire(&source, true, true).await.unwrap();
        assert!(streams.secondary.is_none());
        assert_eq!(streams.screen.resolution(), Some(Resolution::new(64, 36)));
    }

    #[tokio::test]
    async fn test_permission_denied_propagates() {
        let backend = backend();
        backend.set_permission_granted(false);
        let acquisition = CaptureAcquisition::new(backend);

        let err = acquisition.acquire_screen("screen:1").await.unwrap_err();
        assert!(matches!(err, AcquisitionError::PermissionDenied(_)));
    }
}
