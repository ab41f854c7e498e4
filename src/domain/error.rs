//! Domain error types

use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>s, <number>m, or <number>m<number>s (e.g., 5s, 1m, 2m30s)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when a capture parameter fails validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("Invalid resolution: \"{0}\". Expected WIDTHxHEIGHT (e.g., 1920x1080)")]
    Resolution(String),

    #[error("Invalid framerate: \"{0}\". Expected a whole number between 1 and 240")]
    Framerate(String),

    #[error("Invalid bitrate: \"{0}\". Expected a number with an optional k or M suffix (e.g., 2000k)")]
    Bitrate(String),

    #[error("Invalid quality: \"{0}\". Valid values are: low, medium, high")]
    Quality(String),
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
