//! Recording domain: capture parameters, platform table and lifecycle

mod duration;
mod parameters;
mod platform;
mod state;

pub use duration::{Duration, DEFAULT_STOP_TIMEOUT_SECS};
pub use parameters::{
    Bitrate, CaptureParameters, Framerate, QualityTier, Resolution, DEFAULT_BITRATE,
    DEFAULT_FRAMERATE, MAX_FRAMERATE,
};
pub use platform::{
    build_capture_args, CaptureArgsError, CaptureSource, Platform, UnsupportedPlatform,
    PIXEL_FORMAT, VIDEO_CODEC,
};
pub use state::{InvalidStateTransition, RecordingLifecycle, RecordingState, StateUpdate};
