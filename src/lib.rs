//! PiP Recorder - screen recordings with a live camera inset.
//!
//! Captures a screen or window, optionally a camera, and composites both
//! into a picture-in-picture stream. Each stream is encoded independently;
//! when recording stops the session waits for every pipeline to deliver its
//! last chunk, then writes `screen.webm`, `webcam.webm` and `final.webm`
//! into the session's directory.
//!
//! Hosts embed the crate through [`commands::RecorderState`] and the
//! functions in [`commands::recording`].

pub mod capture;
pub mod commands;
pub mod compositor;
pub mod config;
pub mod encoder;
pub mod output;
pub mod recorder;
pub mod utils;

pub use commands::RecorderState;
pub use config::RecorderConfig;
pub use recorder::{
    FinalizeReport, RecordingCoordinator, RecordingEvent, SessionError, SessionSnapshot,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `pip_recorder=debug` filter. Calling it
/// again after a subscriber is installed is a no-op.
pub fn init_logging() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pip_recorder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Starting PiP Recorder v{}", env!("CARGO_PKG_VERSION"));
    }
}
