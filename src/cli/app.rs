//! Main app runner for foreground recording

use std::env;
use std::future;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::application::ports::{BinaryLocator, ConfigStore, NotificationIcon, Notifier};
use crate::application::{
    EndReason, RecordingSession, SessionError, SessionEvent, SessionOptions,
};
use crate::domain::config::AppConfig;
use crate::domain::recording::{
    CaptureParameters, Duration, Platform, RecordingState, StateUpdate,
};
use crate::infrastructure::{create_notifier, FfmpegLauncher, FfmpegLocator, XdgConfigStore};

use super::args::RecordArgs;
use super::presenter::Presenter;
use super::signals::{StopRequest, StopSignal};

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment variable naming the ffmpeg binary
pub const FFMPEG_PATH_ENV: &str = "FFMPEG_PATH";

/// Title used for desktop notifications
const NOTIFY_TITLE: &str = "Screen Recorder";

/// Lines typed on stdin, read on a dedicated thread.
///
/// A blocking read parked in the runtime would hold up shutdown, so the
/// reader lives outside it and is simply abandoned on exit.
pub struct InputLines {
    receiver: mpsc::Receiver<String>,
}

impl InputLines {
    /// Next line, or `None` once stdin is closed
    pub async fn next_line(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

/// Start reading stdin line by line
pub fn input_lines() -> InputLines {
    let (tx, rx) = mpsc::channel(8);
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    InputLines { receiver: rx }
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = store.load().await.unwrap_or_else(|e| {
        debug!(error = %e, "ignoring unreadable config file");
        AppConfig::empty()
    });

    let env_config = AppConfig {
        ffmpeg_path: env::var(FFMPEG_PATH_ENV).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config)
        .merge(cli_config)
}

/// Session tunables from configuration
pub fn session_options(config: &AppConfig) -> SessionOptions {
    SessionOptions {
        platform: Platform::current(),
        stop_timeout: config.stop_timeout_or_default(),
        ..Default::default()
    }
}

/// Find the ffmpeg binary the configuration points at
pub fn locate_ffmpeg(config: &AppConfig) -> Option<PathBuf> {
    FfmpegLocator::new(config.ffmpeg_path()).locate()
}

/// Why the controller asked the recording to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTrigger {
    Signal(StopRequest),
    Input,
    MaxDuration,
}

/// How waiting on a recording ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The controller should stop the session
    Stop(StopTrigger),
    /// The session ended on its own
    Ended(EndReason),
}

/// Inputs that can end a recording, besides the session itself
pub struct StopControls<'a> {
    pub signals: Option<&'a mut StopSignal>,
    pub input: Option<&'a mut InputLines>,
    pub deadline: Option<Instant>,
    pub indicator: Option<&'a broadcast::Sender<StateUpdate>>,
}

/// Whether a typed line asks to stop recording (Enter, `s`, `stop`, `q`)
pub fn is_stop_command(line: &str) -> bool {
    matches!(
        line.trim().to_lowercase().as_str(),
        "" | "s" | "stop" | "q" | "quit"
    )
}

async fn next_signal(signals: Option<&mut StopSignal>) -> Option<StopRequest> {
    match signals {
        Some(signals) => signals.recv().await,
        None => future::pending().await,
    }
}

async fn read_line(input: Option<&mut InputLines>) -> Option<String> {
    match input {
        Some(lines) => lines.next_line().await,
        None => future::pending().await,
    }
}

/// Render session events until something asks the recording to end
pub async fn wait_for_stop(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    controls: StopControls<'_>,
    presenter: &Presenter,
    output: &Path,
) -> WaitOutcome {
    let StopControls {
        mut signals,
        mut input,
        deadline,
        indicator,
    } = controls;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Elapsed(elapsed)) => {
                    presenter.update_spinner(&presenter.format_recording(elapsed, output));
                    if let Some(indicator) = indicator {
                        let _ = indicator.send(StateUpdate {
                            state: RecordingState::Recording,
                            elapsed_ms: elapsed.as_millis(),
                        });
                    }
                }
                Some(SessionEvent::Ended { reason }) => return WaitOutcome::Ended(reason),
                Some(SessionEvent::StateChanged { .. }) => {}
                None => {
                    return WaitOutcome::Ended(EndReason::Lost(
                        "session event channel closed".to_string(),
                    ))
                }
            },
            Some(request) = next_signal(signals.as_deref_mut()) => {
                return WaitOutcome::Stop(StopTrigger::Signal(request));
            }
            line = read_line(input.as_deref_mut()) => match line {
                Some(line) if is_stop_command(&line) => {
                    return WaitOutcome::Stop(StopTrigger::Input);
                }
                Some(_) => {}
                // stdin closed: keep recording, stop via signals
                None => input = None,
            },
            _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                return WaitOutcome::Stop(StopTrigger::MaxDuration);
            }
        }
    }
}

/// Describe an involuntary end for the user
pub fn describe_end(reason: &EndReason) -> String {
    match reason {
        EndReason::UserStopped => "Recording stopped".to_string(),
        EndReason::ForceKilled => "ffmpeg was killed after it ignored the stop request".to_string(),
        EndReason::ProcessExited { code, detail } => {
            let code = code
                .map(|c| format!("code {}", c))
                .unwrap_or_else(|| "a signal".to_string());
            match detail {
                Some(detail) => format!("ffmpeg exited unexpectedly ({}): {}", code, detail),
                None => format!("ffmpeg exited unexpectedly ({})", code),
            }
        }
        EndReason::Lost(detail) => format!("Lost track of ffmpeg: {}", detail),
    }
}

/// Stop the session after a stop trigger, killing ffmpeg if it lingers.
///
/// Returns the recording length, or the message shown to the user.
pub async fn finish_recording<N: Notifier + ?Sized>(
    session: &RecordingSession<FfmpegLauncher>,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    presenter: &mut Presenter,
    notifier: &N,
    output: &Path,
) -> Result<Duration, String> {
    presenter.update_spinner("Stopping, waiting for ffmpeg to finalize the file...");
    let result = match session.shutdown().await {
        Ok(()) => Ok(session.elapsed()),
        // ffmpeg ended on its own after the trigger fired
        Err(SessionError::InvalidState(e)) if session.state().is_finished() => {
            Err(match pending_end(events) {
                Some(reason) => describe_end(&reason),
                None => e.to_string(),
            })
        }
        Err(e) => Err(e.to_string()),
    };

    match result {
        Ok(elapsed) => {
            let message = format!("Saved {} ({})", output.display(), elapsed.format_clock());
            presenter.spinner_success(&message);
            let _ = notifier
                .notify(NOTIFY_TITLE, &message, NotificationIcon::Success)
                .await;
            Ok(elapsed)
        }
        Err(message) => {
            presenter.spinner_fail(&message);
            let _ = notifier
                .notify(NOTIFY_TITLE, &message, NotificationIcon::Error)
                .await;
            Err(message)
        }
    }
}

/// The end reason already queued by the session, if any
fn pending_end(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Option<EndReason> {
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Ended { reason } = event {
            return Some(reason);
        }
    }
    None
}

/// Start the Linux on-screen indicator if asked to
#[cfg(target_os = "linux")]
pub fn start_indicator(config: &AppConfig) -> Option<broadcast::Sender<StateUpdate>> {
    use super::args::IndicatorPosition;

    if !config.indicator_or_default() {
        return None;
    }
    let position = IndicatorPosition::from_config(config.indicator_position_or_default())
        .unwrap_or_default();
    let (tx, rx) = broadcast::channel(16);
    crate::gui::spawn_indicator(position, rx);
    Some(tx)
}

#[cfg(not(target_os = "linux"))]
pub fn start_indicator(config: &AppConfig) -> Option<broadcast::Sender<StateUpdate>> {
    if config.indicator_or_default() {
        debug!("recording indicator is only available on Linux");
    }
    None
}

/// Everything one recording needs from its caller
pub struct RecordContext<'a> {
    pub session: &'a RecordingSession<FfmpegLauncher>,
    pub events: &'a mut mpsc::UnboundedReceiver<SessionEvent>,
    pub signals: &'a mut StopSignal,
    pub input: &'a mut InputLines,
    pub presenter: &'a mut Presenter,
    pub notifier: &'a dyn Notifier,
    pub config: &'a AppConfig,
}

/// Record to `output` until stopped or until ffmpeg ends on its own.
///
/// Returns whether the file was finalized cleanly.
pub async fn record_until_stopped(
    ctx: RecordContext<'_>,
    output: PathBuf,
    parameters: CaptureParameters,
    max_duration: Option<Duration>,
) -> bool {
    let RecordContext {
        session,
        events,
        signals,
        input,
        presenter,
        notifier,
        config,
    } = ctx;

    // Leftovers from a previous recording must not end this one
    while events.try_recv().is_ok() {}

    if let Err(e) = session.start(output.clone(), parameters) {
        presenter.error(&e.to_string());
        return false;
    }
    info!(output = %output.display(), "recording");

    let indicator = start_indicator(config);
    if let Some(indicator) = &indicator {
        let _ = indicator.send(session.state_update());
    }

    let status = presenter.format_recording(Duration::from_millis(0), &output);
    presenter.start_spinner(&status);
    let _ = notifier
        .notify(
            NOTIFY_TITLE,
            &format!("Recording to {}", output.display()),
            NotificationIcon::Recording,
        )
        .await;

    let controls = StopControls {
        signals: Some(signals),
        input: Some(input),
        deadline: max_duration.map(|d| Instant::now() + d.as_std()),
        indicator: indicator.as_ref(),
    };
    let outcome = wait_for_stop(events, controls, presenter, &output).await;

    if let Some(indicator) = &indicator {
        let _ = indicator.send(StateUpdate {
            state: RecordingState::Stopping,
            elapsed_ms: session.elapsed().as_millis(),
        });
    }

    let finished = match outcome {
        WaitOutcome::Stop(trigger) => {
            debug!(?trigger, "stop requested");
            if trigger == StopTrigger::MaxDuration {
                presenter.update_spinner("Max duration reached, stopping");
            }
            finish_recording(session, events, presenter, notifier, &output)
                .await
                .is_ok()
        }
        WaitOutcome::Ended(reason) => {
            let message = describe_end(&reason);
            presenter.spinner_fail(&message);
            let _ = notifier
                .notify(NOTIFY_TITLE, &message, NotificationIcon::Error)
                .await;
            false
        }
    };

    // Closing the channel takes the indicator down
    drop(indicator);
    finished
}

/// Run one foreground recording
pub async fn run_record(args: RecordArgs, config: AppConfig) -> ExitCode {
    let mut presenter = Presenter::new();

    let max_duration = match config.max_duration.as_deref() {
        Some(value) => match value.parse::<Duration>() {
            Ok(duration) => Some(duration),
            Err(e) => {
                presenter.error(&format!("Invalid max-duration: {}", e));
                return ExitCode::from(EXIT_USAGE_ERROR);
            }
        },
        None => None,
    };

    let mut parameters = config.capture_parameters();
    if let Some(fps) = args.fps {
        parameters.framerate = fps;
    }
    if let Some(bitrate) = args.bitrate {
        parameters.bitrate = bitrate;
    }
    if let Some(resolution) = args.resolution {
        parameters.resolution = Some(resolution);
    }
    if let Some(quality) = args.quality {
        parameters.quality = Some(quality.into());
    }

    let mut signals = match StopSignal::new() {
        Ok(signals) => signals,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let notifier = create_notifier(config.notify_or_default());
    let (session, mut events) = RecordingSession::new(
        locate_ffmpeg(&config),
        FfmpegLauncher::new(),
        session_options(&config),
    );
    let mut input = input_lines();

    let ctx = RecordContext {
        session: &session,
        events: &mut events,
        signals: &mut signals,
        input: &mut input,
        presenter: &mut presenter,
        notifier: notifier.as_ref(),
        config: &config,
    };
    if record_until_stopped(ctx, args.output, parameters, max_duration).await {
        ExitCode::from(EXIT_SUCCESS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_commands() {
        assert!(is_stop_command(""));
        assert!(is_stop_command("  stop "));
        assert!(is_stop_command("S"));
        assert!(is_stop_command("q"));
        assert!(!is_stop_command("start"));
        assert!(!is_stop_command("1"));
    }

    #[test]
    fn describe_unexpected_exit() {
        let text = describe_end(&EndReason::ProcessExited {
            code: Some(1),
            detail: Some(":0.0: Cannot open display".to_string()),
        });
        assert!(text.contains("code 1"));
        assert!(text.contains("Cannot open display"));

        let text = describe_end(&EndReason::ProcessExited {
            code: None,
            detail: None,
        });
        assert!(text.contains("a signal"));
    }

    #[test]
    fn session_options_follow_config() {
        let config = AppConfig {
            stop_timeout: Some("12s".to_string()),
            ..Default::default()
        };
        let options = session_options(&config);
        assert_eq!(options.stop_timeout.as_secs(), 12);
        assert_eq!(options.report_interval, std::time::Duration::from_secs(1));
    }

    #[tokio::test]
    async fn max_duration_deadline_requests_stop() {
        let (_tx, mut events) = mpsc::unbounded_channel();
        let controls = StopControls {
            signals: None,
            input: None,
            deadline: Some(Instant::now() + std::time::Duration::from_millis(20)),
            indicator: None,
        };
        let outcome =
            wait_for_stop(&mut events, controls, &Presenter::new(), Path::new("out.mp4")).await;
        assert_eq!(outcome, WaitOutcome::Stop(StopTrigger::MaxDuration));
    }

    #[tokio::test]
    async fn session_end_is_reported() {
        let (tx, mut events) = mpsc::unbounded_channel();
        tx.send(SessionEvent::Elapsed(Duration::from_secs(1))).unwrap();
        tx.send(SessionEvent::Ended {
            reason: EndReason::ProcessExited {
                code: Some(1),
                detail: None,
            },
        })
        .unwrap();
        let controls = StopControls {
            signals: None,
            input: None,
            deadline: None,
            indicator: None,
        };
        let outcome =
            wait_for_stop(&mut events, controls, &Presenter::new(), Path::new("out.mp4")).await;
        assert!(matches!(
            outcome,
            WaitOutcome::Ended(EndReason::ProcessExited { code: Some(1), .. })
        ));
    }

    #[test]
    fn pending_end_skips_clock_ticks() {
        let (tx, mut events) = mpsc::unbounded_channel();
        assert_eq!(pending_end(&mut events), None);

        tx.send(SessionEvent::Elapsed(Duration::from_secs(3))).unwrap();
        tx.send(SessionEvent::Ended {
            reason: EndReason::Lost("wait failed".to_string()),
        })
        .unwrap();
        assert_eq!(
            pending_end(&mut events),
            Some(EndReason::Lost("wait failed".to_string()))
        );
    }
}
