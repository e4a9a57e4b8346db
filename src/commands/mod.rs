//! Host command handlers
//!
//! The entry points an embedding application calls. Each returns a plain
//! `Result<_, String>` so hosts can forward errors over IPC unchanged.

pub mod recording;

pub use recording::RecorderState;
