//! Live frame streams
//!
//! A stream is a latest-value channel: publishers overwrite the current frame
//! and readers either sample it or wait for the next one. Slow readers never
//! hold up the publisher.

use super::traits::Resolution;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// A single RGBA video frame
#[derive(Clone, PartialEq)]
pub struct VideoFrame {
    /// Raw pixel data (RGBA, tightly packed)
    pub data: Vec<u8>,

    pub width: u32,

    pub height: u32,

    /// Capture timestamp in milliseconds (process time)
    pub timestamp_ms: f64,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>, timestamp_ms: f64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms,
        }
    }

    /// Frame filled with a single color
    pub fn solid(width: u32, height: u32, rgba: [u8; 4], timestamp_ms: f64) -> Self {
        let pixels = width as usize * height as usize;
        let data = rgba.iter().copied().cycle().take(pixels * 4).collect();
        Self::new(width, height, data, timestamp_ms)
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Read one pixel, `None` when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        self.data
            .get(idx..idx + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .field("timestamp_ms", &self.timestamp_ms)
            .finish()
    }
}

type Slot = Option<Arc<VideoFrame>>;

/// Create a connected publisher/stream pair
pub fn live_stream(label: &str, resolution: Option<Resolution>) -> (FramePublisher, LiveStream) {
    let (tx, rx) = watch::channel(None);
    let publisher = FramePublisher { tx };
    let stream = LiveStream {
        rx,
        resolution,
        label: Arc::from(label),
    };
    (publisher, stream)
}

/// Write side of a live stream
#[derive(Debug)]
pub struct FramePublisher {
    tx: watch::Sender<Slot>,
}

impl FramePublisher {
    /// Replace the current frame. Never blocks, even with no readers.
    pub fn publish(&self, frame: VideoFrame) {
        self.tx.send_replace(Some(Arc::new(frame)));
    }

    /// Another read handle onto the same stream
    pub fn subscribe(&self, label: &str, resolution: Option<Resolution>) -> LiveStream {
        LiveStream {
            rx: self.tx.subscribe(),
            resolution,
            label: Arc::from(label),
        }
    }
}

/// Read side of a live stream
#[derive(Debug, Clone)]
pub struct LiveStream {
    rx: watch::Receiver<Slot>,
    resolution: Option<Resolution>,
    label: Arc<str>,
}

impl LiveStream {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Native resolution, if the source reported one
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    /// Most recently published frame
    pub fn latest(&self) -> Option<Arc<VideoFrame>> {
        self.rx.borrow().clone()
    }

    /// Wait for a frame newer than the last one seen through this handle.
    ///
    /// Returns `None` once the publisher is gone.
    pub async fn next_frame(&mut self) -> Option<Arc<VideoFrame>> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(frame) = self.rx.borrow_and_update().clone() {
                return Some(frame);
            }
        }
    }

    /// Whether the publisher is still attached
    pub fn is_live(&self) -> bool {
        self.rx.has_changed().is_ok()
    }
}
