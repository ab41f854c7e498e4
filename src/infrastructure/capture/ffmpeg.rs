//! FFmpeg capture process adapter

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::trace;

use crate::application::ports::{CaptureExit, CaptureLauncher, CaptureProcess};

/// Global options placed before the capture arguments
const GLOBAL_ARGS: [&str; 2] = ["-hide_banner", "-y"];

/// Upper bound on a single buffered stderr line
const MAX_LINE_BYTES: usize = 8 * 1024;

/// How long `wait` lets the stderr reader catch the final lines
const DRAIN_GRACE: StdDuration = StdDuration::from_millis(500);

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Spawns ffmpeg as a capture process
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegLauncher;

impl FfmpegLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureLauncher for FfmpegLauncher {
    fn launch(&self, program: &Path, args: &[String]) -> io::Result<Box<dyn CaptureProcess>> {
        let mut command = Command::new(program);
        command
            .args(GLOBAL_ARGS)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group: a terminal Ctrl+C reaches only the controller
        #[cfg(unix)]
        command.process_group(0);
        #[cfg(windows)]
        command.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);

        let mut child = command.spawn()?;
        let stdin = child.stdin.take();
        let last_line = Arc::new(Mutex::new(None));
        let drain = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_stderr(stderr, Arc::clone(&last_line))));

        Ok(Box::new(FfmpegProcess {
            child,
            stdin,
            last_line,
            drain,
        }))
    }
}

/// A running ffmpeg child
pub struct FfmpegProcess {
    child: Child,
    /// Kept open: ffmpeg reads interactive commands from it
    #[cfg_attr(unix, allow(dead_code))]
    stdin: Option<ChildStdin>,
    last_line: Arc<Mutex<Option<String>>>,
    drain: Option<JoinHandle<()>>,
}

impl FfmpegProcess {
    fn last_line(&self) -> Option<String> {
        self.last_line
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CaptureProcess for FfmpegProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    #[cfg(unix)]
    async fn interrupt(&mut self) -> io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let Some(id) = self.child.id() else {
            return Ok(());
        };
        // SIGINT makes ffmpeg finalize the container before exiting
        match signal::kill(Pid::from_raw(id as i32), Signal::SIGINT) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(io::Error::from(e)),
        }
    }

    #[cfg(not(unix))]
    async fn interrupt(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;

        let Some(stdin) = self.stdin.as_mut() else {
            return Ok(());
        };
        // `q` is ffmpeg's interactive quit command
        let result = async {
            stdin.write_all(b"q").await?;
            stdin.flush().await
        }
        .await;
        match result {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            other => other,
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    async fn wait(&mut self) -> io::Result<CaptureExit> {
        let status = self.child.wait().await?;
        self.stdin = None;
        if let Some(drain) = self.drain.take() {
            let _ = tokio::time::timeout(DRAIN_GRACE, drain).await;
        }
        Ok(CaptureExit {
            code: status.code(),
            last_error_line: self.last_line(),
        })
    }
}

async fn drain_stderr(mut stderr: ChildStderr, last_line: Arc<Mutex<Option<String>>>) {
    let mut splitter = LineSplitter::default();
    let mut chunk = [0u8; 4096];
    let mut record = |line: &str| {
        trace!(target: "screen_recorder::ffmpeg", "{}", line);
        *last_line.lock().unwrap_or_else(PoisonError::into_inner) = Some(line.to_string());
    };

    loop {
        match stderr.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => splitter.feed(&chunk[..n], &mut record),
        }
    }
    splitter.finish(&mut record);
}

/// Splits ffmpeg stderr into diagnostic lines.
///
/// ffmpeg redraws its progress line with `\r`, so both `\r` and `\n` end a
/// line. Progress lines are dropped.
#[derive(Debug, Default)]
struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    fn feed(&mut self, bytes: &[u8], on_line: &mut impl FnMut(&str)) {
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                self.flush(on_line);
            } else if self.buf.len() < MAX_LINE_BYTES {
                self.buf.push(byte);
            }
        }
    }

    fn finish(&mut self, on_line: &mut impl FnMut(&str)) {
        self.flush(on_line);
    }

    fn flush(&mut self, on_line: &mut impl FnMut(&str)) {
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim();
        if !line.is_empty() && !is_progress_line(line) {
            on_line(line);
        }
        self.buf.clear();
    }
}

fn is_progress_line(line: &str) -> bool {
    line.starts_with("frame=") || line.starts_with("size=")
}
