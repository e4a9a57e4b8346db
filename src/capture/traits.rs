//! Capture trait definitions
//!
//! Platform-agnostic types and the collaborator traits that supply live
//! capture streams and the catalog of selectable sources.

use super::stream::LiveStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while acquiring a live stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unknown capture source: {0}")]
    InvalidSource(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Kind of a capturable source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Window,
    Screen,
}

/// A capturable window or screen as reported by the source catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSource {
    /// Opaque source id understood by the capture backend
    pub id: String,

    /// Human readable label
    pub display_name: String,

    pub kind: SourceKind,
}

impl CaptureSource {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind,
        }
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size in bytes of one RGBA frame at this resolution
    pub fn rgba_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Supplies live streams for screen/window sources and the camera.
///
/// Both calls suspend until the platform permission or device handshake
/// resolves. Returned streams stay live for as long as the caller holds them.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Open the screen or window identified by `source_id`
    async fn open_screen(&self, source_id: &str) -> Result<LiveStream, AcquisitionError>;

    /// Open the default camera
    async fn open_camera(&self) -> Result<LiveStream, AcquisitionError>;
}

/// Enumerates the sources a user can pick from
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    async fn sources(&self) -> Vec<CaptureSource>;
}
