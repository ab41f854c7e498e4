//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod capture;
pub mod config;
pub mod locator;
pub mod notifier;

// Re-export common types
pub use capture::{CaptureExit, CaptureLauncher, CaptureProcess};
pub use config::ConfigStore;
pub use locator::{BinaryLocator, ProgressCallback, ProvisionError};
pub use notifier::{NotificationError, NotificationIcon, Notifier};
