//! "Open output location" action

use std::path::Path;
use std::process::Command;

/// Reveals a finished session's directory to the user
pub trait LocationOpener: Send + Sync {
    fn open(&self, dir: &Path) -> std::io::Result<()>;
}

/// Launches the platform file browser
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl LocationOpener for SystemOpener {
    fn open(&self, dir: &Path) -> std::io::Result<()> {
        #[cfg(target_os = "macos")]
        let program = "open";

        #[cfg(target_os = "windows")]
        let program = "explorer";

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let program = "xdg-open";

        tracing::info!("Opening output location {:?}", dir);
        Command::new(program).arg(dir).spawn()?;
        Ok(())
    }
}
