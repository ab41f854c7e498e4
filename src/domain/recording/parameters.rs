//! Capture parameter value objects

use std::fmt;
use std::str::FromStr;

use crate::domain::error::ParameterError;

/// Default capture framerate
pub const DEFAULT_FRAMERATE: u32 = 30;

/// Highest framerate accepted
pub const MAX_FRAMERATE: u32 = 240;

/// Default video bitrate
pub const DEFAULT_BITRATE: &str = "2000k";

/// Capture size in pixels, `WIDTHxHEIGHT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// Create a resolution; both sides must be non-zero
    pub fn new(width: u32, height: u32) -> Result<Self, ParameterError> {
        if width == 0 || height == 0 {
            return Err(ParameterError::Resolution(format!("{}x{}", width, height)));
        }
        Ok(Self { width, height })
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }
}

impl FromStr for Resolution {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParameterError::Resolution(s.to_string());
        let (width, height) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = width.trim().parse().map_err(|_| invalid())?;
        let height = height.trim().parse().map_err(|_| invalid())?;
        Self::new(width, height).map_err(|_| invalid())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Frames per second requested from the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Framerate(u32);

impl Framerate {
    pub fn new(fps: u32) -> Result<Self, ParameterError> {
        if fps == 0 || fps > MAX_FRAMERATE {
            return Err(ParameterError::Framerate(fps.to_string()));
        }
        Ok(Self(fps))
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self(DEFAULT_FRAMERATE)
    }
}

impl FromStr for Framerate {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fps: u32 = s
            .trim()
            .parse()
            .map_err(|_| ParameterError::Framerate(s.to_string()))?;
        Self::new(fps)
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Video bitrate in ffmpeg notation: digits with an optional `k`/`M` suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bitrate(String);

impl Bitrate {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Bitrate {
    fn default() -> Self {
        Self(DEFAULT_BITRATE.to_string())
    }
}

impl FromStr for Bitrate {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        let digits = value
            .strip_suffix(['k', 'K', 'm', 'M'])
            .unwrap_or(value);

        let valid = !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit())
            && digits.chars().any(|c| c != '0');

        if !valid {
            return Err(ParameterError::Bitrate(s.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encoding quality tier, mapped onto an x264 preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl QualityTier {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// x264 preset trading encoding speed for quality
    pub const fn x264_preset(&self) -> &'static str {
        match self {
            Self::Low => "veryfast",
            Self::Medium => "medium",
            Self::High => "slow",
        }
    }
}

impl FromStr for QualityTier {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParameterError::Quality(s.to_string())),
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration snapshot handed to a recording session at start.
///
/// `resolution` and `quality` are optional: when unset, ffmpeg picks the
/// full display size and its default preset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureParameters {
    pub resolution: Option<Resolution>,
    pub framerate: Framerate,
    pub bitrate: Bitrate,
    pub quality: Option<QualityTier>,
}

impl CaptureParameters {
    pub fn new(framerate: Framerate, bitrate: Bitrate) -> Self {
        Self {
            resolution: None,
            framerate,
            bitrate,
            quality: None,
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_quality(mut self, quality: QualityTier) -> Self {
        self.quality = Some(quality);
        self
    }
}
