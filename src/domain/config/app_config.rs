//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::recording::{
    Bitrate, CaptureParameters, Duration, Framerate, QualityTier, Resolution, DEFAULT_BITRATE,
    DEFAULT_FRAMERATE,
};

/// Linux-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinuxConfig {
    pub indicator: Option<bool>,
    pub indicator_position: Option<String>,
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub ffmpeg_path: Option<String>,
    pub fps: Option<u32>,
    pub bitrate: Option<String>,
    pub resolution: Option<String>,
    pub quality: Option<String>,
    pub stop_timeout: Option<String>,
    pub max_duration: Option<String>,
    pub notify: Option<bool>,
    pub linux: Option<LinuxConfig>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            ffmpeg_path: None,
            fps: Some(DEFAULT_FRAMERATE),
            bitrate: Some(DEFAULT_BITRATE.to_string()),
            resolution: None,
            quality: None,
            stop_timeout: Some(Duration::default_stop_timeout().to_string()),
            max_duration: None,
            notify: Some(false),
            linux: Some(LinuxConfig {
                indicator: Some(false),
                indicator_position: Some("top-right".to_string()),
            }),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            ffmpeg_path: other.ffmpeg_path.or(self.ffmpeg_path),
            fps: other.fps.or(self.fps),
            bitrate: other.bitrate.or(self.bitrate),
            resolution: other.resolution.or(self.resolution),
            quality: other.quality.or(self.quality),
            stop_timeout: other.stop_timeout.or(self.stop_timeout),
            max_duration: other.max_duration.or(self.max_duration),
            notify: other.notify.or(self.notify),
            linux: Self::merge_linux_config(self.linux, other.linux),
        }
    }

    /// Merge Linux config sections
    fn merge_linux_config(
        base: Option<LinuxConfig>,
        other: Option<LinuxConfig>,
    ) -> Option<LinuxConfig> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(b), Some(o)) => Some(LinuxConfig {
                indicator: o.indicator.or(b.indicator),
                indicator_position: o.indicator_position.or(b.indicator_position),
            }),
        }
    }

    /// Configured ffmpeg binary, if any
    pub fn ffmpeg_path(&self) -> Option<PathBuf> {
        self.ffmpeg_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }

    /// Get fps as a Framerate, or default if not set/invalid
    pub fn framerate_or_default(&self) -> Framerate {
        self.fps
            .and_then(|fps| Framerate::new(fps).ok())
            .unwrap_or_default()
    }

    /// Get bitrate, or default if not set/invalid
    pub fn bitrate_or_default(&self) -> Bitrate {
        self.bitrate
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Get resolution, if set and valid
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution.as_ref().and_then(|s| s.parse().ok())
    }

    /// Get quality tier, if set and valid
    pub fn quality(&self) -> Option<QualityTier> {
        self.quality.as_ref().and_then(|s| s.parse().ok())
    }

    /// Assemble capture parameters from the configured values
    pub fn capture_parameters(&self) -> CaptureParameters {
        CaptureParameters {
            resolution: self.resolution(),
            framerate: self.framerate_or_default(),
            bitrate: self.bitrate_or_default(),
            quality: self.quality(),
        }
    }

    /// Get stop_timeout as parsed Duration, or default if not set/invalid
    pub fn stop_timeout_or_default(&self) -> Duration {
        self.stop_timeout
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_stop_timeout)
    }

    /// Get max_duration, if set and valid (unbounded otherwise)
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration.as_ref().and_then(|s| s.parse().ok())
    }

    /// Get notify setting, or false if not set
    pub fn notify_or_default(&self) -> bool {
        self.notify.unwrap_or(false)
    }

    /// Get indicator setting, or false if not set
    pub fn indicator_or_default(&self) -> bool {
        self.linux
            .as_ref()
            .and_then(|l| l.indicator)
            .unwrap_or(false)
    }

    /// Get indicator position setting, or "top-right" if not set
    pub fn indicator_position_or_default(&self) -> &str {
        self.linux
            .as_ref()
            .and_then(|l| l.indicator_position.as_deref())
            .unwrap_or("top-right")
    }
}
