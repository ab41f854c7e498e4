//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, signal handling,
//! the interactive menu and the recording runners.

pub mod app;
pub mod args;
pub mod config_cmd;
pub mod ffmpeg_cmd;
pub mod logging;
pub mod menu;
pub mod presenter;
pub mod signals;

// Re-export commonly used types
pub use app::{run_record, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE_ERROR};
pub use args::{Cli, Commands, ConfigAction, FfmpegAction, RecordArgs};
pub use menu::run_menu;
pub use presenter::Presenter;
