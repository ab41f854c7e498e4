//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::recording::{Bitrate, Framerate, QualityTier, Resolution};

/// Screen Recorder - record the screen to a video file through ffmpeg
#[derive(Parser, Debug)]
#[command(name = "screen-recorder")]
#[command(version)]
#[command(about = "Record the screen to a video file using ffmpeg")]
#[command(long_about = None)]
pub struct Cli {
    /// Path to the ffmpeg binary (overrides config and FFMPEG_PATH)
    #[arg(long, value_name = "PATH", global = true)]
    pub ffmpeg: Option<PathBuf>,

    /// Print debug logs to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Subcommand (interactive menu when omitted)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record the screen until stopped
    Record(RecordArgs),
    /// Interactive menu
    Menu,
    /// Check for or install ffmpeg
    Ffmpeg {
        #[command(subcommand)]
        action: FfmpegAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options for a one-shot recording
#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Output video file
    #[arg(value_name = "OUTPUT", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Frames per second
    #[arg(short = 'r', long, value_name = "FPS", value_parser = parse_framerate)]
    pub fps: Option<Framerate>,

    /// Video bitrate (e.g., 2000k, 4M)
    #[arg(short = 'b', long, value_name = "RATE", value_parser = parse_bitrate)]
    pub bitrate: Option<Bitrate>,

    /// Capture size (e.g., 1920x1080)
    #[arg(short = 's', long, value_name = "WxH", value_parser = parse_resolution)]
    pub resolution: Option<Resolution>,

    /// Encoding quality
    #[arg(short = 'q', long, value_name = "QUALITY")]
    pub quality: Option<QualityArg>,

    /// Stop automatically after this long (e.g., 30s, 5m)
    #[arg(long, value_name = "TIME")]
    pub max_duration: Option<String>,

    /// Show desktop notifications
    #[arg(short = 'n', long)]
    pub notify: bool,

    /// Show an on-screen recording indicator (Linux, Wayland)
    #[arg(long)]
    pub indicator: bool,

    /// Indicator position
    #[arg(long, value_name = "POSITION")]
    pub indicator_position: Option<IndicatorPosition>,
}

/// ffmpeg management actions
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum FfmpegAction {
    /// Show which ffmpeg binary would be used
    Check,
    /// Download a static ffmpeg build
    Install {
        /// Reinstall even if ffmpeg is already available
        #[arg(long)]
        force: bool,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Quality argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum QualityArg {
    Low,
    Medium,
    High,
}

impl From<QualityArg> for QualityTier {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Low => QualityTier::Low,
            QualityArg::Medium => QualityTier::Medium,
            QualityArg::High => QualityTier::High,
        }
    }
}

/// Where the recording indicator is anchored on screen
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum IndicatorPosition {
    TopLeft,
    TopCenter,
    #[default]
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl IndicatorPosition {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopCenter => "top-center",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
            Self::BottomRight => "bottom-right",
        }
    }

    /// Parse a config value; unknown values yield `None`
    pub fn from_config(value: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(value, true).ok()
    }
}

/// Default output file when none is given
pub const DEFAULT_OUTPUT: &str = "screen_output.mp4";

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "ffmpeg_path",
    "fps",
    "bitrate",
    "resolution",
    "quality",
    "stop_timeout",
    "max_duration",
    "notify",
    "linux.indicator",
    "linux.indicator_position",
];

/// Valid indicator position values
pub const VALID_INDICATOR_POSITIONS: &[&str] = &[
    "top-left",
    "top-center",
    "top-right",
    "bottom-left",
    "bottom-center",
    "bottom-right",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

fn parse_framerate(s: &str) -> Result<Framerate, String> {
    s.parse().map_err(|e: crate::domain::ParameterError| e.to_string())
}

fn parse_bitrate(s: &str) -> Result<Bitrate, String> {
    s.parse().map_err(|e: crate::domain::ParameterError| e.to_string())
}

fn parse_resolution(s: &str) -> Result<Resolution, String> {
    s.parse().map_err(|e: crate::domain::ParameterError| e.to_string())
}
