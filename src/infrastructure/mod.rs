//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with external systems like ffmpeg, the filesystem and
//! the desktop notification service.

pub mod capture;
pub mod config;
pub mod locator;
pub mod notification;

// Re-export adapters
pub use capture::FfmpegLauncher;
pub use config::XdgConfigStore;
pub use locator::FfmpegLocator;
pub use notification::{create_notifier, NoOpNotifier, NotifyRustNotifier};
