//! Screen Recorder - capture the screen to a video file through ffmpeg
//!
//! This crate drives an external ffmpeg process that grabs the desktop and
//! encodes it with libx264, with a managed lifecycle around it: start, a
//! graceful stop bounded by a timeout, force-kill fallback and a live
//! elapsed-time clock.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Capture parameters, platform argument table, lifecycle state machine, config
//! - **Application**: The recording session and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (ffmpeg process, binary locator, config file, notifications)
//! - **CLI**: Command-line interface, interactive menu, and signal handling
//! - **GUI**: Recording indicator overlay (Linux only, uses Wayland layer-shell)

pub mod application;
pub mod cli;
pub mod domain;
#[cfg(target_os = "linux")]
pub mod gui;
pub mod infrastructure;
