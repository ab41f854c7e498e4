//! Capture process adapters

mod ffmpeg;

pub use ffmpeg::{FfmpegLauncher, FfmpegProcess};
