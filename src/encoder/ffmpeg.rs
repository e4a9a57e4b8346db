//! FFmpeg-backed VP9/WebM encoder
//!
//! Raw RGBA frames are piped into an `ffmpeg` child; its WebM output is read
//! from stdout and surfaced as encoded chunks in emission order.

use super::types::{EncodedChunk, EncoderFactory, EncodingError, FrameEncoder};
use crate::capture::{Resolution, VideoFrame};
use crate::config::EncoderConfig;
use crate::recorder::state::PipelineKind;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const READ_BUFFER_SIZE: usize = 64 * 1024;
const STDERR_TAIL_LINES: usize = 8;

/// Build the FFmpeg argument list for a raw RGBA → VP9/WebM encode
pub fn build_args(config: &EncoderConfig, size: Resolution, frame_rate: u32) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pixel_format".to_string(),
        "rgba".to_string(),
        "-video_size".to_string(),
        format!("{}x{}", size.width, size.height),
        "-framerate".to_string(),
        frame_rate.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-an".to_string(),
        "-c:v".to_string(),
        "libvpx-vp9".to_string(),
        "-deadline".to_string(),
        config.deadline.clone(),
        "-cpu-used".to_string(),
        config.cpu_used.to_string(),
        "-crf".to_string(),
        config.crf.to_string(),
        "-b:v".to_string(),
        "0".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-f".to_string(),
        "webm".to_string(),
        "pipe:1".to_string(),
    ]
}

type OutputReceiver = mpsc::UnboundedReceiver<std::io::Result<Vec<u8>>>;

struct RunningEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    output: OutputReceiver,
    reader: JoinHandle<()>,
    /// Drained continuously so a verbose FFmpeg never blocks on stderr
    diagnostics: JoinHandle<Vec<u8>>,
    size: Resolution,
}

/// Encoder for one pipeline. The FFmpeg process starts on the first frame,
/// sized to that frame.
pub struct FfmpegEncoder {
    config: EncoderConfig,
    frame_rate: u32,
    label: String,
    running: Option<RunningEncoder>,
    /// Failure found after chunks were already handed out
    deferred: Option<EncodingError>,
    frames_written: u64,
    frames_dropped: u64,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig, frame_rate: u32, label: impl Into<String>) -> Self {
        Self {
            config,
            frame_rate,
            label: label.into(),
            running: None,
            deferred: None,
            frames_written: 0,
            frames_dropped: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn spawn(&self, size: Resolution) -> Result<RunningEncoder, EncodingError> {
        let args = build_args(&self.config, size, self.frame_rate);
        tracing::info!("Starting FFmpeg encoder for {}: {:?}", self.label, args);

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EncodingError::Spawn(format!("{}: {}", self.config.ffmpeg_path, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EncodingError::Spawn("Failed to capture FFmpeg stdin".to_string()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| EncodingError::Spawn("Failed to capture FFmpeg stdout".to_string()))?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| EncodingError::Spawn("Failed to capture FFmpeg stderr".to_string()))?;

        let diagnostics = tokio::spawn(async move {
            let mut collected = Vec::new();
            if let Err(e) = stderr.read_to_end(&mut collected).await {
                tracing::debug!("FFmpeg stderr read failed: {}", e);
            }
            collected
        });

        let (tx, output) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let mut buf = vec![0u8; READ_BUFFER_SIZE];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(Ok(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        });

        Ok(RunningEncoder {
            child,
            stdin: Some(stdin),
            output,
            reader,
            diagnostics,
            size,
        })
    }
}

/// Take whatever output is ready without waiting.
///
/// Stops at the first read error, parking it in `deferred`; chunks read
/// before it are still returned.
fn drain_ready(
    output: &mut OutputReceiver,
    deferred: &mut Option<EncodingError>,
) -> Vec<EncodedChunk> {
    let mut chunks = Vec::new();
    while let Ok(read) = output.try_recv() {
        match read {
            Ok(bytes) => chunks.push(EncodedChunk::new(bytes)),
            Err(e) => {
                defer(deferred, EncodingError::Io(e));
                break;
            }
        }
    }
    chunks
}

/// Last few lines of FFmpeg's log, enough to say why it exited
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.trim().lines().collect();
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n")
}

/// Keep the first failure only
fn defer(deferred: &mut Option<EncodingError>, error: EncodingError) {
    if deferred.is_none() {
        *deferred = Some(error);
    }
}

#[async_trait]
impl FrameEncoder for FfmpegEncoder {
    async fn encode(&mut self, frame: &VideoFrame) -> Result<Vec<EncodedChunk>, EncodingError> {
        if let Some(error) = self.deferred.take() {
            return Err(error);
        }
        if self.running.is_none() {
            self.running = Some(self.spawn(frame.resolution())?);
        }
        let Some(running) = self.running.as_mut() else {
            return Ok(Vec::new());
        };

        if frame.resolution() != running.size {
            self.frames_dropped += 1;
            if self.frames_dropped == 1 {
                tracing::warn!(
                    "{}: dropping {}x{} frame, encoder is {}x{}",
                    self.label,
                    frame.width,
                    frame.height,
                    running.size.width,
                    running.size.height
                );
            }
            return Ok(drain_ready(&mut running.output, &mut self.deferred));
        }

        let stdin = running
            .stdin
            .as_mut()
            .ok_or_else(|| EncodingError::Other("encoder already finished".to_string()))?;
        match stdin.write_all(&frame.data).await {
            Ok(()) => self.frames_written += 1,
            Err(e) => defer(&mut self.deferred, e.into()),
        }

        Ok(drain_ready(&mut running.output, &mut self.deferred))
    }

    async fn finish(&mut self) -> Result<Vec<EncodedChunk>, EncodingError> {
        let Some(mut running) = self.running.take() else {
            return Ok(Vec::new());
        };

        // EOF on stdin lets FFmpeg flush and exit
        if let Some(mut stdin) = running.stdin.take() {
            if let Err(e) = stdin.shutdown().await {
                defer(&mut self.deferred, e.into());
            }
        }
        if let Err(e) = (&mut running.reader).await {
            tracing::warn!("{}: output reader task failed: {}", self.label, e);
        }

        // The reader has exited, so everything it produced is queued
        let chunks = drain_ready(&mut running.output, &mut self.deferred);

        let status = match running.child.wait().await {
            Ok(status) => status,
            Err(e) => {
                defer(&mut self.deferred, e.into());
                return Ok(chunks);
            }
        };
        let stderr = running.diagnostics.await.unwrap_or_default();
        if !status.success() {
            let error = EncodingError::Process(format!(
                "exited with {}: {}",
                status,
                stderr_tail(&stderr)
            ));
            // Output already read is kept; the failure surfaces via take_error
            defer(&mut self.deferred, error);
            return Ok(chunks);
        }

        tracing::info!(
            "{}: FFmpeg finished, {} frames written, {} dropped",
            self.label,
            self.frames_written,
            self.frames_dropped
        );
        Ok(chunks)
    }

    fn take_error(&mut self) -> Option<EncodingError> {
        self.deferred.take()
    }
}

/// Creates one [`FfmpegEncoder`] per pipeline
#[derive(Debug, Clone)]
pub struct FfmpegEncoderFactory {
    config: EncoderConfig,
    frame_rate: u32,
}

impl FfmpegEncoderFactory {
    pub fn new(config: EncoderConfig, frame_rate: u32) -> Self {
        Self { config, frame_rate }
    }
}

impl EncoderFactory for FfmpegEncoderFactory {
    fn create(
        &self,
        kind: PipelineKind,
        _resolution: Option<Resolution>,
    ) -> Result<Box<dyn FrameEncoder>, EncodingError> {
        Ok(Box::new(FfmpegEncoder::new(
            self.config.clone(),
            self.frame_rate,
            kind.to_string(),
        )))
    }
}
