//! Encoder types
//!
//! Encoded output chunks, the container/codec profile, and the traits an
//! encoder implementation plugs in through.

use crate::capture::{Resolution, VideoFrame};
use crate::recorder::state::PipelineKind;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Errors raised by an encoder mid-recording
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Failed to start encoder: {0}")]
    Spawn(String),

    #[error("Encoder IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoder process failed: {0}")]
    Process(String),

    #[error("Encoding error: {0}")]
    Other(String),
}

/// One immutable segment of encoded output
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    data: Vec<u8>,
}

impl EncodedChunk {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for EncodedChunk {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for EncodedChunk {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl fmt::Debug for EncodedChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedChunk({} bytes)", self.data.len())
    }
}

/// Container + codec every pipeline records with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderProfile {
    pub container: &'static str,
    pub codec: &'static str,
}

impl EncoderProfile {
    /// WebM container, VP9 video
    pub const WEBM_VP9: EncoderProfile = EncoderProfile {
        container: "webm",
        codec: "vp9",
    };

    pub fn extension(&self) -> &'static str {
        self.container
    }

    pub fn mime_type(&self) -> String {
        format!("video/{}; codecs={}", self.container, self.codec)
    }
}

/// Turns raw frames into encoded chunks for one pipeline
#[async_trait]
pub trait FrameEncoder: Send {
    /// Encode one frame, returning whatever output became available
    async fn encode(&mut self, frame: &VideoFrame) -> Result<Vec<EncodedChunk>, EncodingError>;

    /// Flush and close the encoder, returning the remaining output
    async fn finish(&mut self) -> Result<Vec<EncodedChunk>, EncodingError>;

    /// A failure hit after output was already returned. Checked after every
    /// `encode` and `finish`, once their chunks have been forwarded.
    fn take_error(&mut self) -> Option<EncodingError> {
        None
    }
}

/// Creates the encoder for each pipeline of a session
pub trait EncoderFactory: Send + Sync {
    fn create(
        &self,
        kind: PipelineKind,
        resolution: Option<Resolution>,
    ) -> Result<Box<dyn FrameEncoder>, EncodingError>;
}
