//! Real-time picture-in-picture compositor
//!
//! Samples the latest screen and camera frames on a fixed cadence, draws them
//! onto an off-screen canvas, and publishes each canvas as the composite
//! stream. It never waits on its inputs: a stalled source just gets redrawn
//! from its last frame, and a tick with no screen frame yet is skipped.

mod canvas;

pub use canvas::Canvas;

use crate::capture::{live_stream, FramePublisher, LiveStream, Resolution};
use crate::config::{OverlayConfig, RecorderConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Renders screen + optional camera inset into the composite stream
pub struct Compositor {
    screen: LiveStream,
    secondary: Option<LiveStream>,
    canvas: Canvas,
    overlay: OverlayConfig,
    publisher: FramePublisher,
    started: Instant,
    frames_rendered: u64,
}

impl Compositor {
    /// Build a compositor and the composite stream it feeds.
    ///
    /// The canvas takes the screen's native resolution, or the configured
    /// default when the screen reports none.
    pub fn new(
        screen: LiveStream,
        secondary: Option<LiveStream>,
        config: &RecorderConfig,
    ) -> (Self, LiveStream) {
        let size = canvas_size(screen.resolution(), config.default_canvas);
        let (publisher, composite) = live_stream("composite", Some(size));

        tracing::info!(
            "Compositor canvas {}x{}, camera inset: {}",
            size.width,
            size.height,
            secondary.is_some()
        );

        let compositor = Self {
            screen,
            secondary,
            canvas: Canvas::new(size),
            overlay: config.overlay,
            publisher,
            started: Instant::now(),
            frames_rendered: 0,
        };
        (compositor, composite)
    }

    pub fn canvas_size(&self) -> Resolution {
        self.canvas.size()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Render and publish one composite frame.
    ///
    /// Returns false when the tick was skipped because no screen frame has
    /// arrived yet.
    pub fn render_tick(&mut self) -> bool {
        let Some(screen) = self.screen.latest() else {
            return false;
        };
        let size = self.canvas.size();

        self.canvas.clear();
        self.canvas.draw_scaled(&screen, 0, 0, size.width, size.height);

        if let Some(camera) = self.secondary.as_ref().and_then(|s| s.latest()) {
            let x = size.width as i64 - self.overlay.right_offset as i64;
            let y = size.height as i64 - self.overlay.bottom_offset as i64;
            self.canvas
                .draw_scaled(&camera, x, y, self.overlay.width, self.overlay.height);
        }

        let timestamp_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.publisher.publish(self.canvas.snapshot(timestamp_ms));
        self.frames_rendered += 1;
        true
    }

    /// Run the render loop as a background task, one tick per `period`
    pub fn spawn(mut self, period: Duration) -> CompositorHandle {
        let cancel = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());

        let task_cancel = cancel.clone();
        let task_wake = wake.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = task_wake.notified() => {}
                    _ = interval.tick() => {}
                }
                if task_cancel.load(Ordering::Acquire) {
                    break;
                }
                self.render_tick();
            }

            tracing::debug!("Compositor stopped after {} frames", self.frames_rendered);
            self.frames_rendered
        });

        CompositorHandle { cancel, wake, task }
    }
}

/// Control handle for a running compositor task
pub struct CompositorHandle {
    cancel: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<u64>,
}

impl CompositorHandle {
    /// Request the loop to stop; it exits before rendering another frame
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Cancel and wait for the loop to exit. Returns the frames rendered.
    pub async fn shutdown(self) -> u64 {
        self.cancel();
        match self.task.await {
            Ok(frames) => frames,
            Err(e) => {
                tracing::error!("Compositor task failed: {}", e);
                0
            }
        }
    }
}

fn canvas_size(native: Option<Resolution>, fallback: Resolution) -> Resolution {
    match native {
        Some(r) if r.width > 0 && r.height > 0 => r,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::VideoFrame;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn small_config() -> RecorderConfig {
        RecorderConfig {
            overlay: OverlayConfig {
                width: 4,
                height: 3,
                right_offset: 5,
                bottom_offset: 4,
            },
            ..RecorderConfig::default()
        }
    }

    #[test]
    fn test_canvas_falls_back_to_default_size() {
        let (_screen_pub, screen) = live_stream("screen", None);
        let (compositor, composite) = Compositor::new(screen, None, &RecorderConfig::default());

        assert_eq!(compositor.canvas_size(), Resolution::new(1280, 720));
        assert_eq!(composite.resolution(), Some(Resolution::new(1280, 720)));
    }

    #[test]
    fn test_tick_without_screen_frame_is_skipped() {
        let (_screen_pub, screen) = live_stream("screen", Some(Resolution::new(8, 6)));
        let (mut compositor, composite) = Compositor::new(screen, None, &small_config());

        assert!(!compositor.render_tick());
        assert!(composite.latest().is_none());
        assert_eq!(compositor.frames_rendered(), 0);
    }

    #[test]
    fn test_camera_inset_bottom_right() {
        let (screen_pub, screen) = live_stream("screen", Some(Resolution::new(16, 12)));
        let (camera_pub, camera) = live_stream("camera", None);
        let (mut compositor, composite) = Compositor::new(screen, Some(camera), &small_config());

        screen_pub.publish(VideoFrame::solid(32, 24, RED, 0.0));
        camera_pub.publish(VideoFrame::solid(8, 6, BLUE, 0.0));
        assert!(compositor.render_tick());

        let frame = composite.latest().unwrap();
        assert_eq!((frame.width, frame.height), (16, 12));
        // inset spans x 11..15, y 8..11
        assert_eq!(frame.pixel(10, 8), Some(RED));
        assert_eq!(frame.pixel(11, 8), Some(BLUE));
        assert_eq!(frame.pixel(14, 10), Some(BLUE));
        assert_eq!(frame.pixel(15, 10), Some(RED));
        assert_eq!(frame.pixel(14, 11), Some(RED));
    }

    #[test]
    fn test_stalled_camera_redraws_last_frame() {
        let (screen_pub, screen) = live_stream("screen", Some(Resolution::new(16, 12)));
        let (camera_pub, camera) = live_stream("camera", None);
        let (mut compositor, composite) = Compositor::new(screen, Some(camera), &small_config());

        screen_pub.publish(VideoFrame::solid(16, 12, RED, 0.0));
        camera_pub.publish(VideoFrame::solid(4, 3, BLUE, 0.0));
        drop(camera_pub);

        assert!(compositor.render_tick());
        assert!(compositor.render_tick());
        assert_eq!(composite.latest().unwrap().pixel(12, 9), Some(BLUE));
        assert_eq!(compositor.frames_rendered(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_renders_until_cancelled() {
        let (screen_pub, screen) = live_stream("screen", Some(Resolution::new(4, 4)));
        let (compositor, mut composite) = Compositor::new(screen, None, &small_config());
        screen_pub.publish(VideoFrame::solid(4, 4, RED, 0.0));

        let handle = compositor.spawn(Duration::from_millis(33));
        let first = composite.next_frame().await.unwrap();
        assert_eq!(first.pixel(0, 0), Some(RED));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let frames = handle.shutdown().await;
        assert!(frames >= 2);

        // the loop owned the publisher, so the composite stream is closed
        assert!(!composite.is_live());
    }
}
