//! Binary locator port interface

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::recording::Platform;

/// Errors while provisioning a capture binary
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("No ffmpeg build is available for platform '{0}'")]
    UnsupportedPlatform(Platform),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Failed to extract archive: {0}")]
    ExtractFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive did not contain an ffmpeg binary")]
    BinaryMissing,
}

/// Download progress callback.
/// Parameters: (bytes_received, total_bytes)
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Port for finding or installing the capture binary
#[async_trait]
pub trait BinaryLocator: Send + Sync {
    /// Find an existing binary.
    fn locate(&self) -> Option<PathBuf>;

    /// Download and install a binary, returning its path.
    ///
    /// # Arguments
    /// * `on_progress` - Optional callback for download progress
    async fn provision(
        &self,
        on_progress: Option<ProgressCallback>,
    ) -> Result<PathBuf, ProvisionError>;
}
