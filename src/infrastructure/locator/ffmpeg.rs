//! ffmpeg binary locator and installer

use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::application::ports::{BinaryLocator, ProgressCallback, ProvisionError};
use crate::domain::recording::Platform;

use super::release;

/// Directory walk depth when searching the install directory
const MAX_SEARCH_DEPTH: usize = 4;

/// Finds ffmpeg on disk and installs a static build on request
pub struct FfmpegLocator {
    configured: Option<PathBuf>,
    install_dir: PathBuf,
    search_path: bool,
    platform: Platform,
    download_url: Option<String>,
    client: reqwest::Client,
}

impl FfmpegLocator {
    /// Locator using the managed install directory and `PATH`.
    ///
    /// When `configured` is set it is the only candidate.
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self {
            configured,
            install_dir: default_install_dir(),
            search_path: true,
            platform: Platform::current(),
            download_url: None,
            client: reqwest::Client::new(),
        }
    }

    /// Locator that only looks inside `install_dir`
    pub fn isolated(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            configured: None,
            install_dir: install_dir.into(),
            search_path: false,
            platform: Platform::current(),
            download_url: None,
            client: reqwest::Client::new(),
        }
    }

    /// Download from `url` instead of the platform's release URL
    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    fn binary_name(&self) -> &'static str {
        match self.platform {
            Platform::Windows => "ffmpeg.exe",
            _ => "ffmpeg",
        }
    }

    fn locate_configured(&self, configured: &Path) -> Option<PathBuf> {
        if configured.is_file() {
            return Some(configured.to_path_buf());
        }
        // A bare program name is resolved through PATH
        let is_bare_name = configured.components().count() == 1;
        if is_bare_name && self.search_path {
            return search_path_for(configured.as_os_str());
        }
        None
    }
}

impl Default for FfmpegLocator {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl BinaryLocator for FfmpegLocator {
    fn locate(&self) -> Option<PathBuf> {
        if let Some(configured) = &self.configured {
            let found = self.locate_configured(configured);
            debug!(configured = %configured.display(), found = found.is_some(), "configured ffmpeg");
            return found;
        }

        if let Some(found) = find_in_dir(&self.install_dir, self.binary_name(), MAX_SEARCH_DEPTH) {
            debug!(path = %found.display(), "ffmpeg found in install directory");
            return Some(found);
        }

        if self.search_path {
            let found = search_path_for(self.binary_name().as_ref());
            debug!(found = ?found, "searched PATH for ffmpeg");
            return found;
        }
        None
    }

    async fn provision(
        &self,
        on_progress: Option<ProgressCallback>,
    ) -> Result<PathBuf, ProvisionError> {
        let url = match &self.download_url {
            Some(url) => url.clone(),
            None => release::build_url(self.platform, env::consts::ARCH)
                .ok_or(ProvisionError::UnsupportedPlatform(self.platform))?,
        };

        fs::create_dir_all(&self.install_dir).await?;
        let archive = self.install_dir.join(release::archive_name(&url));
        release::download(&self.client, &url, &archive, on_progress.as_ref()).await?;

        let extracted = extract(&archive, &self.install_dir).await;
        let _ = fs::remove_file(&archive).await;
        extracted?;

        let binary = find_in_dir(&self.install_dir, self.binary_name(), MAX_SEARCH_DEPTH)
            .ok_or(ProvisionError::BinaryMissing)?;
        make_executable(&binary).await?;

        info!(path = %binary.display(), "ffmpeg installed");
        Ok(binary)
    }
}

/// `<data_local_dir>/screen-recorder/ffmpeg_bin`
pub fn default_install_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("screen-recorder")
        .join("ffmpeg_bin")
}

fn search_path_for(name: &std::ffi::OsStr) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn find_in_dir(dir: &Path, name: &str, depth: usize) -> Option<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(depth + 1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_type().is_dir() && entry.file_name() == name)
        .min_by_key(|entry| entry.depth())
        .map(DirEntry::into_path)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

async fn extract(archive: &Path, dest: &Path) -> Result<(), ProvisionError> {
    debug!(archive = %archive.display(), "extracting with tar");
    let output = Command::new("tar")
        .arg("-xf")
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .output()
        .await
        .map_err(|e| ProvisionError::ExtractFailed(format!("could not run tar: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProvisionError::ExtractFailed(
            stderr.lines().last().unwrap_or("tar failed").to_string(),
        ));
    }
    Ok(())
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), ProvisionError> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path).await?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<(), ProvisionError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"#!/bin/sh\n").unwrap();
    }

    #[test]
    fn configured_path_is_authoritative() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("ffmpeg"));

        let mut locator = FfmpegLocator::isolated(dir.path());
        locator.configured = Some(PathBuf::from("/nonexistent/ffmpeg"));
        assert!(locator.locate().is_none());

        let configured = dir.path().join("ffmpeg");
        locator.configured = Some(configured.clone());
        assert_eq!(locator.locate(), Some(configured));
    }

    #[test]
    fn finds_binary_nested_in_install_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir
            .path()
            .join("ffmpeg-7.0-amd64-static")
            .join(FfmpegLocator::isolated(dir.path()).binary_name());
        touch(&nested);

        let locator = FfmpegLocator::isolated(dir.path());
        assert_eq!(locator.locate(), Some(nested));
    }

    #[test]
    fn install_dir_search_prefers_shallow_and_stops_at_depth() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("a/b/c/d/e/ffmpeg");
        touch(&deep);
        assert_eq!(find_in_dir(dir.path(), "ffmpeg", MAX_SEARCH_DEPTH), None);

        let within = dir.path().join("a/b/c/d/ffmpeg");
        touch(&within);
        assert_eq!(find_in_dir(dir.path(), "ffmpeg", MAX_SEARCH_DEPTH), Some(within));

        let shallow = dir.path().join("z/ffmpeg");
        touch(&shallow);
        assert_eq!(find_in_dir(dir.path(), "ffmpeg", MAX_SEARCH_DEPTH), Some(shallow));
    }

    #[test]
    fn empty_install_dir_finds_nothing() {
        let dir = TempDir::new().unwrap();
        let locator = FfmpegLocator::isolated(dir.path().join("missing"));
        assert!(locator.locate().is_none());
    }

    #[test]
    fn default_install_dir_is_app_scoped() {
        let dir = default_install_dir();
        assert!(dir.ends_with("screen-recorder/ffmpeg_bin"));
    }

    #[tokio::test]
    async fn provision_on_unsupported_platform_fails() {
        let dir = TempDir::new().unwrap();
        let mut locator = FfmpegLocator::isolated(dir.path());
        locator.platform = Platform::Unsupported;
        let err = locator.provision(None).await.unwrap_err();
        assert!(matches!(err, ProvisionError::UnsupportedPlatform(Platform::Unsupported)));
    }
}
