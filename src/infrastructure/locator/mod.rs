//! Capture binary locators

mod ffmpeg;
mod release;

pub use ffmpeg::{default_install_dir, FfmpegLocator};
pub use release::build_url;
