//! Off-screen RGBA canvas

use crate::capture::{Resolution, VideoFrame};

/// Off-screen drawing surface the composite frames are rendered on
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Canvas {
    pub fn new(size: Resolution) -> Self {
        Self {
            width: size.width,
            height: size.height,
            data: vec![0; size.rgba_len()],
        }
    }

    pub fn size(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Reset every pixel to transparent black
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Draw `frame` scaled into the rectangle at (`dest_x`, `dest_y`).
    ///
    /// Nearest-neighbor sampling. Parts of the rectangle outside the canvas
    /// are clipped; a malformed frame (short buffer, zero size) draws nothing.
    pub fn draw_scaled(
        &mut self,
        frame: &VideoFrame,
        dest_x: i64,
        dest_y: i64,
        dest_width: u32,
        dest_height: u32,
    ) {
        if frame.width == 0 || frame.height == 0 || dest_width == 0 || dest_height == 0 {
            return;
        }
        if frame.data.len() < frame.resolution().rgba_len() {
            tracing::warn!(
                "Skipping malformed frame: {} bytes for {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            );
            return;
        }

        let canvas_w = self.width as i64;
        let canvas_h = self.height as i64;

        for dy in 0..dest_height as i64 {
            let y = dest_y + dy;
            if y < 0 || y >= canvas_h {
                continue;
            }
            let src_y = ((dy as u64 * frame.height as u64) / dest_height as u64)
                .min(frame.height as u64 - 1);

            for dx in 0..dest_width as i64 {
                let x = dest_x + dx;
                if x < 0 || x >= canvas_w {
                    continue;
                }
                let src_x = ((dx as u64 * frame.width as u64) / dest_width as u64)
                    .min(frame.width as u64 - 1);

                let src_idx = ((src_y * frame.width as u64 + src_x) * 4) as usize;
                let dst_idx = ((y * canvas_w + x) * 4) as usize;
                self.data[dst_idx..dst_idx + 4].copy_from_slice(&frame.data[src_idx..src_idx + 4]);
            }
        }
    }

    /// Copy the current canvas contents into a frame
    pub fn snapshot(&self, timestamp_ms: f64) -> VideoFrame {
        VideoFrame::new(self.width, self.height, self.data.clone(), timestamp_ms)
    }
}
