//! Video encoding
//!
//! Each recording pipeline owns one [`FrameEncoder`]. The shipped
//! implementation drives FFmpeg; hosts can plug in their own through
//! [`EncoderFactory`].

pub mod ffmpeg;
pub mod types;

pub use ffmpeg::{FfmpegEncoder, FfmpegEncoderFactory};
pub use types::{EncodedChunk, EncoderFactory, EncoderProfile, EncodingError, FrameEncoder};
