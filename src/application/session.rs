//! Recording session use case
//!
//! Owns the lifecycle of one capture process: start, graceful stop bounded by
//! a timeout, force-kill fallback, an exit watcher and an elapsed-time
//! reporter. Every state transition happens under one lock, so a process that
//! exits while a stop is in flight still ends the session exactly once.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration as StdDuration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::domain::recording::{
    build_capture_args, CaptureArgsError, CaptureParameters, Duration, InvalidStateTransition, Platform,
    RecordingLifecycle, RecordingState, StateUpdate, UnsupportedPlatform,
};

use super::ports::{CaptureExit, CaptureLauncher, CaptureProcess};

/// Errors returned by session operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("ffmpeg binary not found. Run 'screen-recorder ffmpeg install' or pass --ffmpeg <PATH>")]
    BinaryNotFound,

    #[error(transparent)]
    UnsupportedPlatform(#[from] UnsupportedPlatform),

    #[error("Failed to start capture process: {0}")]
    SpawnFailed(String),

    #[error("Failed to stop capture process: {0}")]
    StopFailed(String),

    #[error(transparent)]
    InvalidState(#[from] InvalidStateTransition),
}

impl From<CaptureArgsError> for SessionError {
    fn from(err: CaptureArgsError) -> Self {
        match err {
            CaptureArgsError::UnsupportedPlatform(e) => Self::UnsupportedPlatform(e),
            e @ CaptureArgsError::NonUtf8Output(_) => Self::SpawnFailed(e.to_string()),
        }
    }
}

/// Why a recording ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Graceful stop requested through `stop`
    UserStopped,
    /// Process killed through `force_kill`
    ForceKilled,
    /// Process exited on its own while recording
    ProcessExited {
        code: Option<i32>,
        detail: Option<String>,
    },
    /// Waiting on the process failed; the session is Failed
    Lost(String),
}

/// Events published by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        from: RecordingState,
        to: RecordingState,
    },
    Elapsed(Duration),
    Ended {
        reason: EndReason,
    },
}

/// Tunables for a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub platform: Platform,
    /// Upper bound on the wait after a graceful stop or kill request
    pub stop_timeout: Duration,
    /// Period of `Elapsed` events
    pub report_interval: StdDuration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            platform: Platform::current(),
            stop_timeout: Duration::default_stop_timeout(),
            report_interval: StdDuration::from_secs(1),
        }
    }
}

enum Control {
    Interrupt(oneshot::Sender<io::Result<()>>),
    Kill(oneshot::Sender<io::Result<()>>),
}

#[derive(Debug, Clone)]
enum ProcessOutcome {
    Exited(CaptureExit),
    Lost(String),
}

struct ActiveCapture {
    control: mpsc::UnboundedSender<Control>,
    exit: watch::Receiver<Option<ProcessOutcome>>,
    watcher: JoinHandle<()>,
    reporter: JoinHandle<()>,
}

impl ActiveCapture {
    fn abort(&self) {
        self.reporter.abort();
        self.watcher.abort();
    }
}

#[derive(Default)]
struct Shared {
    lifecycle: RecordingLifecycle,
    generation: u64,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    output: Option<PathBuf>,
    parameters: Option<CaptureParameters>,
    active: Option<ActiveCapture>,
}

impl Shared {
    fn end_clock(&mut self) {
        self.stopped_at = Some(Instant::now());
        if let Some(active) = &self.active {
            active.reporter.abort();
        }
    }
}

struct Inner {
    shared: Mutex<Shared>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // Receiver may be gone; the session keeps working without listeners
        let _ = self.events.send(event);
    }

    fn transition(&self, from: RecordingState, to: RecordingState) {
        debug!(%from, %to, "recording state changed");
        self.emit(SessionEvent::StateChanged { from, to });
    }
}

/// One screen recording backed by an external capture process
pub struct RecordingSession<L: CaptureLauncher> {
    binary: Option<PathBuf>,
    launcher: L,
    options: SessionOptions,
    inner: Arc<Inner>,
}

impl<L: CaptureLauncher> RecordingSession<L> {
    /// Create an idle session and the receiver for its events.
    ///
    /// `binary` is the capture executable found by the locator, if any.
    pub fn new(
        binary: Option<PathBuf>,
        launcher: L,
        options: SessionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            shared: Mutex::new(Shared::default()),
            events,
        });
        let session = Self {
            binary,
            launcher,
            options,
            inner,
        };
        (session, receiver)
    }

    /// Replace the capture executable, e.g. after provisioning one
    pub fn set_binary(&mut self, binary: Option<PathBuf>) {
        self.binary = binary;
    }

    pub fn binary(&self) -> Option<&PathBuf> {
        self.binary.as_ref()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Spawn the capture process writing to `output`.
    ///
    /// The session stays Idle on every error.
    pub fn start(
        &self,
        output: PathBuf,
        parameters: CaptureParameters,
    ) -> Result<(), SessionError> {
        let mut shared = self.inner.lock();
        shared.lifecycle.check_begin()?;

        let binary = self.binary.as_ref().ok_or(SessionError::BinaryNotFound)?;
        let args = build_capture_args(self.options.platform, &parameters, &output)?;

        debug!(binary = %binary.display(), ?args, "spawning capture process");
        let process = self.launcher.launch(binary, &args).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                SessionError::BinaryNotFound
            } else {
                SessionError::SpawnFailed(e.to_string())
            }
        })?;
        info!(pid = ?process.id(), output = %output.display(), "recording started");

        shared.lifecycle.begin()?;
        shared.generation += 1;
        let generation = shared.generation;
        let started_at = Instant::now();
        shared.started_at = Some(started_at);
        shared.stopped_at = None;
        shared.output = Some(output);
        shared.parameters = Some(parameters);

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        let watcher = tokio::spawn(watch_process(
            Arc::clone(&self.inner),
            process,
            control_rx,
            exit_tx,
        ));
        let reporter = tokio::spawn(report_elapsed(
            Arc::clone(&self.inner),
            generation,
            started_at,
            self.options.report_interval,
        ));
        shared.active = Some(ActiveCapture {
            control: control_tx,
            exit: exit_rx,
            watcher,
            reporter,
        });

        self.inner
            .transition(RecordingState::Idle, RecordingState::Recording);
        Ok(())
    }

    /// Ask the capture process to finish and wait for it to exit.
    ///
    /// On `StopFailed` the session stays Stopping; retry `stop` or call
    /// `force_kill`.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let (control, exit) = {
            let mut shared = self.inner.lock();
            let from = shared.lifecycle.state();
            shared.lifecycle.request_stop()?;
            if from != RecordingState::Stopping {
                self.inner.transition(from, RecordingState::Stopping);
            }
            let active = shared
                .active
                .as_ref()
                .ok_or_else(|| SessionError::StopFailed("no capture process".to_string()))?;
            active.reporter.abort();
            (active.control.clone(), active.exit.clone())
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if control.send(Control::Interrupt(reply_tx)).is_ok() {
            match reply_rx.await {
                Ok(Ok(())) => debug!("stop requested"),
                Ok(Err(e)) => {
                    warn!(error = %e, "failed to signal capture process");
                    return Err(SessionError::StopFailed(format!(
                        "could not signal process: {}",
                        e
                    )));
                }
                // Watcher already finished: the process has exited
                Err(_) => {}
            }
        }

        self.await_exit(exit).await?;
        self.settle(EndReason::UserStopped)
    }

    /// Kill a process that did not honor `stop`.
    pub async fn force_kill(&self) -> Result<(), SessionError> {
        let (control, exit) = {
            let shared = self.inner.lock();
            let state = shared.lifecycle.state();
            match shared.active.as_ref() {
                Some(active) if state == RecordingState::Stopping => {
                    (active.control.clone(), active.exit.clone())
                }
                _ => {
                    return Err(InvalidStateTransition {
                        current_state: state,
                        action: "force kill".to_string(),
                    }
                    .into())
                }
            }
        };

        warn!("force killing capture process");
        let (reply_tx, reply_rx) = oneshot::channel();
        if control.send(Control::Kill(reply_tx)).is_ok() {
            if let Ok(Err(e)) = reply_rx.await {
                return Err(SessionError::StopFailed(format!(
                    "could not kill process: {}",
                    e
                )));
            }
        }

        self.await_exit(exit).await?;
        self.settle(EndReason::ForceKilled)
    }

    /// Stop gracefully, killing the process if it does not exit in time
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        match self.stop().await {
            Err(SessionError::StopFailed(reason)) if self.state() == RecordingState::Stopping => {
                warn!(%reason, "graceful stop failed, escalating");
                self.force_kill().await
            }
            other => other,
        }
    }

    /// Return a finished session to Idle so it can record again
    pub fn reset(&self) -> Result<(), SessionError> {
        let mut shared = self.inner.lock();
        let from = shared.lifecycle.state();
        shared.lifecycle.reset()?;
        if let Some(active) = shared.active.take() {
            active.abort();
        }
        shared.started_at = None;
        shared.stopped_at = None;
        shared.output = None;
        shared.parameters = None;
        self.inner.transition(from, RecordingState::Idle);
        Ok(())
    }

    pub fn state(&self) -> RecordingState {
        self.inner.lock().lifecycle.state()
    }

    /// Time spent recording; frozen once the recording ends
    pub fn elapsed(&self) -> Duration {
        let shared = self.inner.lock();
        elapsed_of(&shared)
    }

    /// Snapshot for the on-screen indicator
    pub fn state_update(&self) -> StateUpdate {
        let shared = self.inner.lock();
        StateUpdate {
            state: shared.lifecycle.state(),
            elapsed_ms: elapsed_of(&shared).as_millis(),
        }
    }

    pub fn output(&self) -> Option<PathBuf> {
        self.inner.lock().output.clone()
    }

    pub fn parameters(&self) -> Option<CaptureParameters> {
        self.inner.lock().parameters.clone()
    }

    async fn await_exit(
        &self,
        mut exit: watch::Receiver<Option<ProcessOutcome>>,
    ) -> Result<(), SessionError> {
        let timeout = self.options.stop_timeout;
        match time::timeout(timeout.as_std(), exit.wait_for(Option::is_some)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(SessionError::StopFailed(
                "capture watcher ended unexpectedly".to_string(),
            )),
            Err(_) => {
                warn!(%timeout, "capture process did not exit in time");
                Err(SessionError::StopFailed(format!(
                    "process did not exit within {}",
                    timeout
                )))
            }
        }
    }

    fn settle(&self, reason: EndReason) -> Result<(), SessionError> {
        let mut shared = self.inner.lock();
        match shared.lifecycle.state() {
            RecordingState::Stopping => {
                shared.lifecycle.finish_stop()?;
                shared.end_clock();
                shared.active = None;
                info!(?reason, "recording stopped");
                self.inner
                    .transition(RecordingState::Stopping, RecordingState::Stopped);
                self.inner.emit(SessionEvent::Ended { reason });
                Ok(())
            }
            RecordingState::Failed => {
                let detail = shared
                    .active
                    .as_ref()
                    .and_then(|a| match a.exit.borrow().as_ref() {
                        Some(ProcessOutcome::Lost(detail)) => Some(detail.clone()),
                        _ => None,
                    })
                    .unwrap_or_else(|| "capture process was lost".to_string());
                Err(SessionError::StopFailed(detail))
            }
            state => Err(InvalidStateTransition {
                current_state: state,
                action: "finish stopping".to_string(),
            }
            .into()),
        }
    }
}

impl<L: CaptureLauncher> Drop for RecordingSession<L> {
    fn drop(&mut self) {
        // Aborting the watcher drops the process handle, which kills it
        if let Some(active) = self.inner.lock().active.take() {
            active.abort();
        }
    }
}

fn elapsed_of(shared: &Shared) -> Duration {
    match shared.started_at {
        Some(start) => {
            let end = shared.stopped_at.unwrap_or_else(Instant::now);
            Duration::from_std(end.saturating_duration_since(start))
        }
        None => Duration::from_millis(0),
    }
}

async fn watch_process(
    inner: Arc<Inner>,
    mut process: Box<dyn CaptureProcess>,
    mut control: mpsc::UnboundedReceiver<Control>,
    exit_tx: watch::Sender<Option<ProcessOutcome>>,
) {
    let outcome = loop {
        tokio::select! {
            result = process.wait() => {
                break match result {
                    Ok(exit) => ProcessOutcome::Exited(exit),
                    Err(e) => ProcessOutcome::Lost(e.to_string()),
                };
            }
            Some(command) = control.recv() => match command {
                Control::Interrupt(reply) => {
                    let _ = reply.send(process.interrupt().await);
                }
                Control::Kill(reply) => {
                    let _ = reply.send(process.kill());
                }
            },
        }
    };

    let mut shared = inner.lock();
    let state = shared.lifecycle.state();
    match &outcome {
        ProcessOutcome::Exited(exit) => {
            debug!(code = ?exit.code, %state, "capture process exited");
            if shared.lifecycle.process_exited().is_ok() {
                shared.end_clock();
                warn!(code = ?exit.code, detail = ?exit.last_error_line, "capture process exited unexpectedly");
                inner.transition(state, RecordingState::Stopped);
                inner.emit(SessionEvent::Ended {
                    reason: EndReason::ProcessExited {
                        code: exit.code,
                        detail: exit.last_error_line.clone(),
                    },
                });
            }
        }
        ProcessOutcome::Lost(detail) => {
            warn!(%detail, "lost track of capture process");
            if shared.lifecycle.fail().is_ok() {
                shared.end_clock();
                inner.transition(state, RecordingState::Failed);
                inner.emit(SessionEvent::Ended {
                    reason: EndReason::Lost(detail.clone()),
                });
            }
        }
    }
    exit_tx.send_replace(Some(outcome));
}

async fn report_elapsed(
    inner: Arc<Inner>,
    generation: u64,
    started_at: Instant,
    period: StdDuration,
) {
    let mut ticker = time::interval_at(started_at + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let shared = inner.lock();
        if shared.generation != generation || !shared.lifecycle.is_recording() {
            break;
        }
        let elapsed = Duration::from_std(started_at.elapsed());
        trace!(elapsed_ms = elapsed.as_millis(), "elapsed");
        inner.emit(SessionEvent::Elapsed(elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test handle to make a mock process exit from outside
    #[derive(Clone)]
    struct ProcessHandle {
        exit: Arc<watch::Sender<Option<CaptureExit>>>,
        interrupts: Arc<AtomicUsize>,
    }

    impl ProcessHandle {
        fn exit_with(&self, code: Option<i32>, line: Option<&str>) {
            self.exit.send_replace(Some(CaptureExit {
                code,
                last_error_line: line.map(str::to_string),
            }));
        }

        fn interrupts(&self) -> usize {
            self.interrupts.load(Ordering::SeqCst)
        }
    }

    struct MockProcess {
        handle: ProcessHandle,
        exit: watch::Receiver<Option<CaptureExit>>,
        ignore_interrupt: bool,
    }

    #[async_trait]
    impl CaptureProcess for MockProcess {
        fn id(&self) -> Option<u32> {
            Some(4242)
        }

        async fn interrupt(&mut self) -> io::Result<()> {
            self.handle.interrupts.fetch_add(1, Ordering::SeqCst);
            if !self.ignore_interrupt {
                self.handle.exit_with(Some(255), None);
            }
            Ok(())
        }

        fn kill(&mut self) -> io::Result<()> {
            self.handle.exit_with(None, None);
            Ok(())
        }

        async fn wait(&mut self) -> io::Result<CaptureExit> {
            let exit = self
                .exit
                .wait_for(Option::is_some)
                .await
                .map_err(|_| io::Error::other("process handle dropped"))?;
            Ok((*exit).clone().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct MockLauncher {
        fail_with: Option<io::ErrorKind>,
        ignore_interrupt: bool,
        launched: Mutex<Vec<(PathBuf, Vec<String>, ProcessHandle)>>,
    }

    impl MockLauncher {
        fn last(&self) -> ProcessHandle {
            self.launched.lock().unwrap().last().unwrap().2.clone()
        }

        fn launch_count(&self) -> usize {
            self.launched.lock().unwrap().len()
        }
    }

    impl CaptureLauncher for MockLauncher {
        fn launch(&self, program: &Path, args: &[String]) -> io::Result<Box<dyn CaptureProcess>> {
            if let Some(kind) = self.fail_with {
                return Err(io::Error::new(kind, "mock launch failure"));
            }
            let (tx, rx) = watch::channel(None);
            let handle = ProcessHandle {
                exit: Arc::new(tx),
                interrupts: Arc::new(AtomicUsize::new(0)),
            };
            self.launched.lock().unwrap().push((
                program.to_path_buf(),
                args.to_vec(),
                handle.clone(),
            ));
            Ok(Box::new(MockProcess {
                handle,
                exit: rx,
                ignore_interrupt: self.ignore_interrupt,
            }))
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            platform: Platform::Linux,
            stop_timeout: Duration::from_millis(300),
            report_interval: StdDuration::from_millis(40),
        }
    }

    fn session_with(
        launcher: MockLauncher,
    ) -> (
        RecordingSession<MockLauncher>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        RecordingSession::new(Some(PathBuf::from("/usr/bin/ffmpeg")), launcher, options())
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn count_transitions_to(events: &[SessionEvent], target: RecordingState) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, SessionEvent::StateChanged { to, .. } if *to == target))
            .count()
    }

    #[tokio::test]
    async fn start_spawns_with_platform_arguments() {
        let (session, mut rx) = session_with(MockLauncher::default());
        session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap();

        assert_eq!(session.state(), RecordingState::Recording);
        assert_eq!(session.output(), Some(PathBuf::from("out.mp4")));
        assert_eq!(session.parameters(), Some(CaptureParameters::default()));

        let launched = session.launcher.launched.lock().unwrap();
        let (program, args, _) = &launched[0];
        assert_eq!(program, Path::new("/usr/bin/ffmpeg"));
        assert_eq!(
            args.join(" "),
            "-f x11grab -i :0.0 -c:v libx264 -pix_fmt yuv420p -r 30 -b:v 2000k out.mp4"
        );
        drop(launched);

        assert_eq!(
            drain(&mut rx),
            vec![SessionEvent::StateChanged {
                from: RecordingState::Idle,
                to: RecordingState::Recording
            }]
        );
    }

    #[tokio::test]
    async fn start_while_recording_is_rejected() {
        let (session, _rx) = session_with(MockLauncher::default());
        session
            .start(PathBuf::from("a.mp4"), CaptureParameters::default())
            .unwrap();

        let err = session
            .start(PathBuf::from("b.mp4"), CaptureParameters::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidState(_)));
        assert_eq!(session.launcher.launch_count(), 1);
        assert_eq!(session.launcher.last().interrupts(), 0);
        assert_eq!(session.output(), Some(PathBuf::from("a.mp4")));
        assert_eq!(session.state(), RecordingState::Recording);
    }

    #[tokio::test]
    async fn stop_from_idle_is_rejected_without_side_effects() {
        let (session, mut rx) = session_with(MockLauncher::default());
        let err = session.stop().await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidState(_)));
        assert_eq!(session.state(), RecordingState::Idle);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn missing_binary_keeps_session_idle() {
        let (session, _rx) =
            RecordingSession::new(None, MockLauncher::default(), options());
        let err = session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap_err();
        assert_eq!(err, SessionError::BinaryNotFound);
        assert_eq!(session.state(), RecordingState::Idle);
        assert_eq!(session.launcher.launch_count(), 0);
    }

    #[tokio::test]
    async fn launch_errors_are_classified() {
        let launcher = MockLauncher {
            fail_with: Some(io::ErrorKind::NotFound),
            ..Default::default()
        };
        let (session, _rx) = session_with(launcher);
        let err = session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap_err();
        assert_eq!(err, SessionError::BinaryNotFound);

        let launcher = MockLauncher {
            fail_with: Some(io::ErrorKind::PermissionDenied),
            ..Default::default()
        };
        let (session, _rx) = session_with(launcher);
        let err = session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::SpawnFailed(_)));
        assert_eq!(session.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn unsupported_platform_does_not_spawn() {
        let mut opts = options();
        opts.platform = Platform::Unsupported;
        let (session, _rx) = RecordingSession::new(
            Some(PathBuf::from("ffmpeg")),
            MockLauncher::default(),
            opts,
        );
        let err = session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::UnsupportedPlatform(_)));
        assert_eq!(session.launcher.launch_count(), 0);
        assert_eq!(session.state(), RecordingState::Idle);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_output_does_not_spawn() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (session, _rx) = session_with(MockLauncher::default());
        let output = PathBuf::from(OsStr::from_bytes(b"clip-\xff.mp4"));
        let err = session
            .start(output, CaptureParameters::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::SpawnFailed(ref msg) if msg.contains("UTF-8")));
        assert_eq!(session.launcher.launch_count(), 0);
        assert_eq!(session.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn graceful_stop_reaches_stopped() {
        let (session, mut rx) = session_with(MockLauncher::default());
        session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap();
        session.stop().await.unwrap();

        assert_eq!(session.state(), RecordingState::Stopped);
        assert_eq!(session.launcher.last().interrupts(), 1);

        let events = drain(&mut rx);
        assert_eq!(count_transitions_to(&events, RecordingState::Stopping), 1);
        assert_eq!(count_transitions_to(&events, RecordingState::Stopped), 1);
        assert_eq!(
            events.last(),
            Some(&SessionEvent::Ended {
                reason: EndReason::UserStopped
            })
        );

        // Stopped rejects a second stop
        assert!(matches!(
            session.stop().await,
            Err(SessionError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn elapsed_events_stop_with_the_recording() {
        let (session, mut rx) = session_with(MockLauncher::default());
        session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap();
        tokio::time::sleep(StdDuration::from_millis(130)).await;
        session.stop().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(130)).await;

        let events = drain(&mut rx);
        let stopping_at = events
            .iter()
            .position(|e| {
                matches!(
                    e,
                    SessionEvent::StateChanged {
                        to: RecordingState::Stopping,
                        ..
                    }
                )
            })
            .unwrap();
        assert!(events[..stopping_at]
            .iter()
            .any(|e| matches!(e, SessionEvent::Elapsed(_))));
        assert!(!events[stopping_at..]
            .iter()
            .any(|e| matches!(e, SessionEvent::Elapsed(_))));

        let frozen = session.elapsed();
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(session.elapsed(), frozen);
    }

    #[tokio::test]
    async fn process_exit_while_recording_ends_session() {
        let (session, mut rx) = session_with(MockLauncher::default());
        session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap();
        session
            .launcher
            .last()
            .exit_with(Some(1), Some("Cannot open display :0.0"));
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        assert_eq!(session.state(), RecordingState::Stopped);
        let events = drain(&mut rx);
        assert_eq!(count_transitions_to(&events, RecordingState::Stopped), 1);
        assert!(events.contains(&SessionEvent::Ended {
            reason: EndReason::ProcessExited {
                code: Some(1),
                detail: Some("Cannot open display :0.0".to_string()),
            }
        }));

        assert!(matches!(
            session.stop().await,
            Err(SessionError::InvalidState(_))
        ));
        assert_eq!(count_transitions_to(&drain(&mut rx), RecordingState::Stopped), 0);
    }

    #[tokio::test]
    async fn process_exit_during_stop_settles_once() {
        let launcher = MockLauncher {
            ignore_interrupt: true,
            ..Default::default()
        };
        let (session, mut rx) = session_with(launcher);
        let session = Arc::new(session);
        session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap();

        let stopper = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.stop().await })
        };
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(session.state(), RecordingState::Stopping);

        session.launcher.last().exit_with(Some(1), Some("crash"));
        stopper.await.unwrap().unwrap();

        assert_eq!(session.state(), RecordingState::Stopped);
        let events = drain(&mut rx);
        assert_eq!(count_transitions_to(&events, RecordingState::Stopped), 1);
        assert!(!events.iter().any(|e| matches!(
            e,
            SessionEvent::Ended {
                reason: EndReason::ProcessExited { .. }
            }
        )));
    }

    #[tokio::test]
    async fn stop_timeout_then_force_kill() {
        let launcher = MockLauncher {
            ignore_interrupt: true,
            ..Default::default()
        };
        let (session, mut rx) = session_with(launcher);
        session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap();

        let err = session.stop().await.unwrap_err();
        assert!(matches!(err, SessionError::StopFailed(_)));
        assert_eq!(session.state(), RecordingState::Stopping);

        // A fresh start is still refused while the process lingers
        assert!(matches!(
            session.start(PathBuf::from("b.mp4"), CaptureParameters::default()),
            Err(SessionError::InvalidState(_))
        ));

        session.force_kill().await.unwrap();
        assert_eq!(session.state(), RecordingState::Stopped);
        assert_eq!(
            drain(&mut rx).last(),
            Some(&SessionEvent::Ended {
                reason: EndReason::ForceKilled
            })
        );
    }

    #[tokio::test]
    async fn force_kill_requires_stopping() {
        let (session, _rx) = session_with(MockLauncher::default());
        assert!(matches!(
            session.force_kill().await,
            Err(SessionError::InvalidState(_))
        ));

        session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap();
        assert!(matches!(
            session.force_kill().await,
            Err(SessionError::InvalidState(_))
        ));
        assert_eq!(session.state(), RecordingState::Recording);
    }

    #[tokio::test]
    async fn shutdown_escalates_to_kill() {
        let launcher = MockLauncher {
            ignore_interrupt: true,
            ..Default::default()
        };
        let (session, mut rx) = session_with(launcher);
        session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap();
        session.shutdown().await.unwrap();
        assert_eq!(session.state(), RecordingState::Stopped);
        assert!(drain(&mut rx).contains(&SessionEvent::Ended {
            reason: EndReason::ForceKilled
        }));
    }

    #[tokio::test]
    async fn reset_allows_recording_again() {
        let (session, _rx) = session_with(MockLauncher::default());
        assert!(matches!(session.reset(), Err(SessionError::InvalidState(_))));

        session
            .start(PathBuf::from("one.mp4"), CaptureParameters::default())
            .unwrap();
        session.stop().await.unwrap();
        session.reset().unwrap();

        assert_eq!(session.state(), RecordingState::Idle);
        assert_eq!(session.elapsed(), Duration::from_millis(0));
        assert!(session.output().is_none());

        session
            .start(PathBuf::from("two.mp4"), CaptureParameters::default())
            .unwrap();
        assert_eq!(session.launcher.launch_count(), 2);
        assert_eq!(session.output(), Some(PathBuf::from("two.mp4")));
    }

    #[tokio::test]
    async fn state_update_tracks_recording() {
        let (session, _rx) = session_with(MockLauncher::default());
        assert_eq!(session.state_update().state, RecordingState::Idle);
        session
            .start(PathBuf::from("out.mp4"), CaptureParameters::default())
            .unwrap();
        tokio::time::sleep(StdDuration::from_millis(30)).await;
        let update = session.state_update();
        assert_eq!(update.state, RecordingState::Recording);
        assert!(update.elapsed_ms >= 20);
    }
}
