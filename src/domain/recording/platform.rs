//! Capture platforms and the ffmpeg argument list they require

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::parameters::CaptureParameters;

/// Video codec used for every capture
pub const VIDEO_CODEC: &str = "libx264";

/// Pixel format used for every capture (widest player compatibility)
pub const PIXEL_FORMAT: &str = "yuv420p";

/// Operating systems the recorder knows how to capture on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
    Unsupported,
}

impl Platform {
    /// The platform this binary was compiled for
    pub const fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Unsupported
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Unsupported => "unsupported",
        }
    }

    /// Screen-grab input for this platform, if capture is supported
    pub fn capture_source(&self) -> Option<&'static CaptureSource> {
        CAPTURE_SOURCES
            .iter()
            .find(|(platform, _)| platform == self)
            .map(|(_, source)| source)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ffmpeg input device (`-f`) and the input it reads (`-i`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSource {
    pub format: &'static str,
    pub input: &'static str,
}

const CAPTURE_SOURCES: &[(Platform, CaptureSource)] = &[
    (
        Platform::Linux,
        CaptureSource {
            format: "x11grab",
            input: ":0.0",
        },
    ),
    (
        Platform::Windows,
        CaptureSource {
            format: "gdigrab",
            input: "desktop",
        },
    ),
    (
        Platform::MacOs,
        CaptureSource {
            format: "avfoundation",
            input: "1:",
        },
    ),
];

/// Error when the platform has no capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Screen capture is not supported on platform '{0}'")]
pub struct UnsupportedPlatform(pub Platform);

/// Error when no argument list can be built for a capture
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureArgsError {
    #[error(transparent)]
    UnsupportedPlatform(#[from] UnsupportedPlatform),

    #[error("Output path is not valid UTF-8: {}", .0.display())]
    NonUtf8Output(PathBuf),
}

/// Build the ffmpeg argument list for a full-screen capture.
///
/// Layout: `-f <format> [-video_size WxH] -i <input> -c:v libx264 [-preset P]
/// -pix_fmt yuv420p -r <fps> -b:v <bitrate> <output>`. The optional parts
/// only appear when the matching parameter is set.
pub fn build_capture_args(
    platform: Platform,
    parameters: &CaptureParameters,
    output: &Path,
) -> Result<Vec<String>, CaptureArgsError> {
    let source = platform
        .capture_source()
        .ok_or(UnsupportedPlatform(platform))?;
    let output = output
        .to_str()
        .ok_or_else(|| CaptureArgsError::NonUtf8Output(output.to_path_buf()))?;

    let mut args = vec!["-f".to_string(), source.format.to_string()];

    // Input option: must precede -i
    if let Some(resolution) = parameters.resolution {
        args.push("-video_size".to_string());
        args.push(resolution.to_string());
    }

    args.extend([
        "-i".to_string(),
        source.input.to_string(),
        "-c:v".to_string(),
        VIDEO_CODEC.to_string(),
    ]);

    if let Some(quality) = parameters.quality {
        args.push("-preset".to_string());
        args.push(quality.x264_preset().to_string());
    }

    args.extend([
        "-pix_fmt".to_string(),
        PIXEL_FORMAT.to_string(),
        "-r".to_string(),
        parameters.framerate.to_string(),
        "-b:v".to_string(),
        parameters.bitrate.to_string(),
        output.to_string(),
    ]);

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recording::{Bitrate, Framerate, QualityTier, Resolution};

    fn params(fps: u32, bitrate: &str) -> CaptureParameters {
        CaptureParameters::new(Framerate::new(fps).unwrap(), bitrate.parse::<Bitrate>().unwrap())
    }

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn linux_argument_list() {
        let args =
            build_capture_args(Platform::Linux, &params(30, "2000k"), Path::new("out.mp4")).unwrap();
        assert_eq!(
            args,
            strings(&[
                "-f", "x11grab", "-i", ":0.0", "-c:v", "libx264", "-pix_fmt", "yuv420p", "-r",
                "30", "-b:v", "2000k", "out.mp4"
            ])
        );
    }

    #[test]
    fn windows_argument_list() {
        let args =
            build_capture_args(Platform::Windows, &params(60, "4M"), Path::new("cap.mkv")).unwrap();
        assert_eq!(
            args,
            strings(&[
                "-f", "gdigrab", "-i", "desktop", "-c:v", "libx264", "-pix_fmt", "yuv420p", "-r",
                "60", "-b:v", "4M", "cap.mkv"
            ])
        );
    }

    #[test]
    fn macos_argument_list() {
        let args =
            build_capture_args(Platform::MacOs, &params(24, "1500k"), Path::new("a.mov")).unwrap();
        assert_eq!(&args[..4], &strings(&["-f", "avfoundation", "-i", "1:"])[..]);
        assert_eq!(args.last().map(String::as_str), Some("a.mov"));
    }

    #[test]
    fn unsupported_platform_has_no_arguments() {
        let err = build_capture_args(Platform::Unsupported, &params(30, "2000k"), Path::new("x"))
            .unwrap_err();
        assert_eq!(err, UnsupportedPlatform(Platform::Unsupported).into());
        assert!(Platform::Unsupported.capture_source().is_none());
    }

    #[test]
    fn optional_parameters_are_placed_around_the_input() {
        let parameters = params(30, "2000k")
            .with_resolution(Resolution::new(1280, 720).unwrap())
            .with_quality(QualityTier::High);
        let args = build_capture_args(Platform::Linux, &parameters, Path::new("out.mp4")).unwrap();
        assert_eq!(
            args,
            strings(&[
                "-f",
                "x11grab",
                "-video_size",
                "1280x720",
                "-i",
                ":0.0",
                "-c:v",
                "libx264",
                "-preset",
                "slow",
                "-pix_fmt",
                "yuv420p",
                "-r",
                "30",
                "-b:v",
                "2000k",
                "out.mp4"
            ])
        );
    }

    #[test]
    fn current_platform_is_known_on_supported_targets() {
        let current = Platform::current();
        if cfg!(any(target_os = "linux", target_os = "windows", target_os = "macos")) {
            assert!(current.capture_source().is_some());
        } else {
            assert_eq!(current, Platform::Unsupported);
        }
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_output_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let output = Path::new(OsStr::from_bytes(b"clip-\xff.mp4"));
        let err = build_capture_args(Platform::Linux, &params(30, "2000k"), output).unwrap_err();
        assert_eq!(err, CaptureArgsError::NonUtf8Output(output.to_path_buf()));
    }
}
