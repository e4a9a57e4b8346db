//! Recorder configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use crate::capture::Resolution;
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Directory that receives one subdirectory per session
    pub output_root: PathBuf,

    /// Compositor target rate
    pub frame_rate: u32,

    /// Canvas size used when the screen stream reports no resolution
    pub default_canvas: Resolution,

    /// Camera inset geometry on the composite canvas
    pub overlay: OverlayConfig,

    pub encoder: EncoderConfig,

    /// Record without the camera when it was requested but can't be opened
    pub degrade_on_secondary_failure: bool,

    /// Capacity of the recording event broadcast
    pub event_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("videos"),
            frame_rate: 30,
            default_canvas: Resolution::new(1280, 720),
            overlay: OverlayConfig::default(),
            encoder: EncoderConfig::default(),
            degrade_on_secondary_failure: false,
            event_capacity: 100,
        }
    }
}

impl RecorderConfig {
    /// Load a config from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: RecorderConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;

        tracing::debug!("Loaded recorder config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.frame_rate > 0, "frameRate must be positive");
        ensure!(
            self.default_canvas.width > 0 && self.default_canvas.height > 0,
            "defaultCanvas must be non-empty"
        );
        ensure!(self.event_capacity > 0, "eventCapacity must be positive");
        Ok(())
    }

    /// Time between compositor ticks
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}

/// Placement of the camera inset, measured from the bottom-right corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayConfig {
    pub width: u32,
    pub height: u32,
    /// Distance from the right canvas edge to the inset's left edge
    pub right_offset: u32,
    /// Distance from the bottom canvas edge to the inset's top edge
    pub bottom_offset: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            right_offset: 330,
            bottom_offset: 250,
        }
    }
}

/// FFmpeg settings for the VP9/WebM encoders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncoderConfig {
    pub ffmpeg_path: String,
    pub crf: u8,
    /// libvpx deadline (`realtime`, `good`, `best`)
    pub deadline: String,
    pub cpu_used: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            crf: 32,
            deadline: "realtime".to_string(),
            cpu_used: 8,
        }
    }
}
