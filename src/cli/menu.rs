//! Interactive text menu

use std::path::PathBuf;
use std::process::ExitCode;

use tokio::sync::mpsc;
use tracing::debug;

use crate::application::ports::{BinaryLocator, CaptureLauncher, Notifier};
use crate::application::{RecordingSession, SessionError, SessionEvent};
use crate::domain::config::AppConfig;
use crate::domain::error::ParameterError;
use crate::domain::recording::{
    Bitrate, CaptureParameters, Framerate, QualityTier, RecordingState, Resolution,
};
use crate::infrastructure::{create_notifier, FfmpegLauncher, FfmpegLocator};

use super::app::{
    input_lines, record_until_stopped, session_options, InputLines, RecordContext, EXIT_ERROR,
};
use super::args::DEFAULT_OUTPUT;
use super::ffmpeg_cmd;
use super::presenter::Presenter;
use super::signals::StopSignal;

const MAIN_OPTIONS: &[&str] = &["Start recording", "Settings", "Check / install ffmpeg", "Exit"];
const SETTINGS_OPTIONS: &[&str] = &["Resolution", "FPS", "Bitrate", "Quality", "Back"];
const QUALITY_OPTIONS: &[&str] = &["Low", "Medium", "High", "Back"];
const FFMPEG_OPTIONS: &[&str] = &["Check ffmpeg", "Install ffmpeg", "Back"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MainChoice {
    Start,
    Settings,
    Ffmpeg,
    Exit,
}

impl MainChoice {
    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Start),
            "2" => Some(Self::Settings),
            "3" => Some(Self::Ffmpeg),
            "4" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Free-text capture settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setting {
    Resolution,
    Fps,
    Bitrate,
}

impl Setting {
    fn prompt(&self) -> &'static str {
        match self {
            Self::Resolution => "Resolution (e.g. 1920x1080):",
            Self::Fps => "FPS (e.g. 30):",
            Self::Bitrate => "Bitrate (e.g. 2000k):",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsChoice {
    Edit(Setting),
    Quality,
    Back,
}

impl SettingsChoice {
    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Edit(Setting::Resolution)),
            "2" => Some(Self::Edit(Setting::Fps)),
            "3" => Some(Self::Edit(Setting::Bitrate)),
            "4" => Some(Self::Quality),
            "5" => Some(Self::Back),
            _ => None,
        }
    }
}

/// `Some(None)` is "back"
fn parse_quality_choice(input: &str) -> Option<Option<QualityTier>> {
    match input.trim() {
        "1" => Some(Some(QualityTier::Low)),
        "2" => Some(Some(QualityTier::Medium)),
        "3" => Some(Some(QualityTier::High)),
        "4" => Some(None),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FfmpegChoice {
    Check,
    Install,
    Back,
}

impl FfmpegChoice {
    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Check),
            "2" => Some(Self::Install),
            "3" => Some(Self::Back),
            _ => None,
        }
    }
}

/// Validate `value` and store it; parameters are untouched on error
fn apply_setting(
    parameters: &mut CaptureParameters,
    setting: Setting,
    value: &str,
) -> Result<String, ParameterError> {
    match setting {
        Setting::Resolution => {
            let resolution: Resolution = value.parse()?;
            parameters.resolution = Some(resolution);
            Ok(format!("Resolution set to {}", resolution))
        }
        Setting::Fps => {
            let framerate: Framerate = value.parse()?;
            parameters.framerate = framerate;
            Ok(format!("FPS set to {}", framerate))
        }
        Setting::Bitrate => {
            let bitrate: Bitrate = value.parse()?;
            let message = format!("Bitrate set to {}", bitrate);
            parameters.bitrate = bitrate;
            Ok(message)
        }
    }
}

/// Output file from the user's answer, falling back to the default name
fn output_path(answer: &str) -> PathBuf {
    let answer = answer.trim();
    if answer.is_empty() {
        PathBuf::from(DEFAULT_OUTPUT)
    } else {
        PathBuf::from(answer)
    }
}

struct Menu {
    config: AppConfig,
    parameters: CaptureParameters,
    presenter: Presenter,
    input: InputLines,
    signals: StopSignal,
    notifier: Box<dyn Notifier>,
    session: RecordingSession<FfmpegLauncher>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Menu {
    /// Read one answer; `None` when stdin closes or the user hits Ctrl+C
    async fn ask(&mut self, prompt: &str) -> Option<String> {
        self.presenter.prompt(prompt);
        tokio::select! {
            line = self.input.next_line() => line,
            request = self.signals.recv() => {
                debug!(?request, "leaving menu on signal");
                None
            }
        }
    }

    async fn run(&mut self) {
        self.presenter.clear_screen();
        self.presenter.output("Screen Recorder");

        loop {
            self.presenter.menu("Main menu", MAIN_OPTIONS);
            let Some(answer) = self.ask("Choose an option:").await else {
                return;
            };
            match MainChoice::parse(&answer) {
                Some(MainChoice::Start) => {
                    let Some(answer) = self
                        .ask(&format!("Output file [{}]:", DEFAULT_OUTPUT))
                        .await
                    else {
                        return;
                    };
                    self.record(output_path(&answer)).await;
                }
                Some(MainChoice::Settings) => {
                    self.presenter.clear_screen();
                    if !self.settings_menu().await {
                        return;
                    }
                }
                Some(MainChoice::Ffmpeg) => {
                    self.presenter.clear_screen();
                    if !self.ffmpeg_menu().await {
                        return;
                    }
                }
                Some(MainChoice::Exit) => {
                    self.presenter.output("Bye");
                    return;
                }
                None => self.presenter.error("Invalid option"),
            }
        }
    }

    async fn record(&mut self, output: PathBuf) {
        if let Err(e) = prepare_session(&self.session).await {
            self.presenter
                .warn(&format!("The previous recording could not be stopped: {}", e));
            return;
        }

        let ctx = RecordContext {
            session: &self.session,
            events: &mut self.events,
            signals: &mut self.signals,
            input: &mut self.input,
            presenter: &mut self.presenter,
            notifier: self.notifier.as_ref(),
            config: &self.config,
        };
        let max_duration = self.config.max_duration();
        record_until_stopped(ctx, output, self.parameters.clone(), max_duration).await;
    }

    /// Returns false when input ended
    async fn settings_menu(&mut self) -> bool {
        loop {
            self.presenter.menu("Settings", SETTINGS_OPTIONS);
            self.presenter.capture_settings(&self.parameters);
            let Some(answer) = self.ask("Choose an option:").await else {
                return false;
            };
            match SettingsChoice::parse(&answer) {
                Some(SettingsChoice::Edit(setting)) => {
                    let Some(value) = self.ask(setting.prompt()).await else {
                        return false;
                    };
                    match apply_setting(&mut self.parameters, setting, &value) {
                        Ok(message) => self.presenter.success(&message),
                        Err(e) => self.presenter.error(&e.to_string()),
                    }
                }
                Some(SettingsChoice::Quality) => {
                    if !self.quality_menu().await {
                        return false;
                    }
                }
                Some(SettingsChoice::Back) => return true,
                None => self.presenter.error("Invalid option"),
            }
        }
    }

    async fn quality_menu(&mut self) -> bool {
        loop {
            self.presenter.menu("Quality", QUALITY_OPTIONS);
            let Some(answer) = self.ask("Choose a quality:").await else {
                return false;
            };
            match parse_quality_choice(&answer) {
                Some(Some(quality)) => {
                    self.parameters.quality = Some(quality);
                    self.presenter
                        .success(&format!("Quality set to {}", quality));
                    return true;
                }
                Some(None) => return true,
                None => self.presenter.error("Invalid option"),
            }
        }
    }

    async fn ffmpeg_menu(&mut self) -> bool {
        loop {
            self.presenter.menu("ffmpeg", FFMPEG_OPTIONS);
            let Some(answer) = self.ask("Choose an option:").await else {
                return false;
            };
            match FfmpegChoice::parse(&answer) {
                Some(FfmpegChoice::Check) => match self.session.binary() {
                    Some(path) => self
                        .presenter
                        .success(&format!("ffmpeg found at {}", path.display())),
                    None => self.presenter.error("ffmpeg not found"),
                },
                Some(FfmpegChoice::Install) => {
                    let locator = FfmpegLocator::new(self.config.ffmpeg_path());
                    match ffmpeg_cmd::install(&locator, &mut self.presenter, false).await {
                        Ok(()) => self.session.set_binary(locator.locate()),
                        Err(e) => self.presenter.error(&e),
                    }
                }
                Some(FfmpegChoice::Back) => return true,
                None => self.presenter.error("Invalid option"),
            }
        }
    }
}

/// Bring the session back to Idle before the next recording.
///
/// A capture left in Stopping by a failed kill gets another shutdown.
pub async fn prepare_session<L: CaptureLauncher>(
    session: &RecordingSession<L>,
) -> Result<(), SessionError> {
    match session.state() {
        RecordingState::Stopping => {
            if let Err(e) = session.shutdown().await {
                if !session.state().is_finished() {
                    return Err(e);
                }
                debug!(error = %e, "capture ended during shutdown");
            }
            session.reset()
        }
        state if state.is_finished() => session.reset(),
        _ => Ok(()),
    }
}

/// Run the interactive menu until the user exits
pub async fn run_menu(config: AppConfig) -> ExitCode {
    let presenter = Presenter::new();
    let signals = match StopSignal::new() {
        Ok(signals) => signals,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let locator = FfmpegLocator::new(config.ffmpeg_path());
    let (session, events) = RecordingSession::new(
        locator.locate(),
        FfmpegLauncher::new(),
        session_options(&config),
    );

    let mut menu = Menu {
        parameters: config.capture_parameters(),
        notifier: create_notifier(config.notify_or_default()),
        config,
        presenter,
        input: input_lines(),
        signals,
        session,
        events,
    };
    menu.run().await;
    ExitCode::SUCCESS
}
