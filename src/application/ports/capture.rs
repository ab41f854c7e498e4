//! Capture process port interfaces

use std::io;
use std::path::Path;

use async_trait::async_trait;

/// How a capture process ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureExit {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Last diagnostic line the process wrote to stderr
    pub last_error_line: Option<String>,
}

impl CaptureExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A running capture process, exclusively owned by one session
#[async_trait]
pub trait CaptureProcess: Send {
    /// OS process id, if still known
    fn id(&self) -> Option<u32>;

    /// Ask the process to finish writing and exit.
    async fn interrupt(&mut self) -> io::Result<()>;

    /// Kill the process without waiting for it.
    fn kill(&mut self) -> io::Result<()>;

    /// Wait for the process to exit.
    ///
    /// Must be cancel safe: it is polled inside `select!` and may be
    /// dropped and called again.
    async fn wait(&mut self) -> io::Result<CaptureExit>;
}

/// Port for spawning capture processes
pub trait CaptureLauncher: Send + Sync {
    /// Spawn `program` with `args`.
    ///
    /// An error of kind `NotFound` means the program does not exist.
    fn launch(&self, program: &Path, args: &[String]) -> io::Result<Box<dyn CaptureProcess>>;
}
