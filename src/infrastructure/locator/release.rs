//! Static ffmpeg builds and their download

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::application::ports::{ProgressCallback, ProvisionError};
use crate::domain::recording::Platform;

const WINDOWS_BUILD_URL: &str = "https://www.gyan.dev/ffmpeg/builds/ffmpeg-release-essentials.zip";
const MACOS_BUILD_URL: &str = "https://evermeet.cx/ffmpeg/getrelease/zip";
const LINUX_BUILD_BASE: &str = "https://johnvansickle.com/ffmpeg/releases";

/// Release URL of a static ffmpeg build for `platform` on CPU `arch`
/// (as in `std::env::consts::ARCH`).
pub fn build_url(platform: Platform, arch: &str) -> Option<String> {
    match platform {
        Platform::Windows => Some(WINDOWS_BUILD_URL.to_string()),
        Platform::MacOs => Some(MACOS_BUILD_URL.to_string()),
        Platform::Linux => {
            let arch = match arch {
                "x86_64" => "amd64",
                "x86" => "i686",
                "aarch64" => "arm64",
                "arm" => "armhf",
                _ => return None,
            };
            Some(format!(
                "{}/ffmpeg-release-{}-static.tar.xz",
                LINUX_BUILD_BASE, arch
            ))
        }
        Platform::Unsupported => None,
    }
}

/// File name for the downloaded archive; `tar` picks the format from it
pub fn archive_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = [".tar.xz", ".tar.gz", ".tgz", ".zip"]
        .into_iter()
        .find(|ext| path.ends_with(ext))
        .unwrap_or(if path.ends_with("/zip") { ".zip" } else { ".tar.xz" });
    format!("ffmpeg-download{}", ext)
}

/// Stream `url` into `dest`, reporting received bytes
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    on_progress: Option<&ProgressCallback>,
) -> Result<u64, ProvisionError> {
    debug!(url, dest = %dest.display(), "downloading ffmpeg");
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProvisionError::DownloadFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProvisionError::DownloadFailed(format!(
            "server returned {} for {}",
            status, url
        )));
    }

    let total = response.content_length();
    let mut file = fs::File::create(dest).await?;
    let mut received = 0u64;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ProvisionError::DownloadFailed(e.to_string()))?
    {
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;
        if let Some(progress) = on_progress {
            progress(received, total);
        }
    }
    file.flush().await?;

    debug!(bytes = received, "download complete");
    Ok(received)
}
