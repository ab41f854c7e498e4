//! ffmpeg provisioning tests against a local HTTP server
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use screen_recorder::application::ports::{BinaryLocator, ProgressCallback, ProvisionError};
use screen_recorder::infrastructure::FfmpegLocator;

/// A gzip tarball laid out like the static Linux builds
fn static_build_archive(scratch: &Path) -> Vec<u8> {
    let build = scratch.join("ffmpeg-7.0.2-amd64-static");
    std::fs::create_dir_all(&build).unwrap();
    std::fs::write(build.join("ffmpeg"), "#!/bin/sh\necho ffmpeg version 7.0.2\n").unwrap();
    std::fs::write(build.join("readme.txt"), "static build\n").unwrap();

    let archive = scratch.join("build.tar.gz");
    let status = Command::new("tar")
        .arg("-czf")
        .arg(&archive)
        .arg("-C")
        .arg(scratch)
        .arg("ffmpeg-7.0.2-amd64-static")
        .status()
        .expect("tar is required for this test");
    assert!(status.success());
    std::fs::read(archive).unwrap()
}

#[tokio::test]
async fn provision_downloads_and_extracts() {
    let scratch = TempDir::new().unwrap();
    let install = TempDir::new().unwrap();
    let body = static_build_archive(scratch.path());

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ffmpeg-release-amd64-static.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let locator = FfmpegLocator::isolated(install.path())
        .with_download_url(format!("{}/ffmpeg-release-amd64-static.tar.gz", server.uri()));
    assert!(locator.locate().is_none());

    let received = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&received);
    let on_progress: ProgressCallback = Arc::new(move |bytes, _total| {
        seen.store(bytes, Ordering::SeqCst);
    });

    let binary = locator.provision(Some(on_progress)).await.unwrap();

    assert!(binary.ends_with("ffmpeg-7.0.2-amd64-static/ffmpeg"));
    assert_eq!(received.load(Ordering::SeqCst), body.len() as u64);
    let mode = std::fs::metadata(&binary).unwrap().permissions().mode();
    assert_eq!(mode & 0o755, 0o755);

    // The archive is removed and the binary is found from now on
    assert!(!install.path().join("ffmpeg-download.tar.gz").exists());
    assert_eq!(locator.locate(), Some(binary));
}

#[tokio::test]
async fn provision_reports_http_errors() {
    let install = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let locator = FfmpegLocator::isolated(install.path())
        .with_download_url(format!("{}/missing.tar.xz", server.uri()));
    let err = locator.provision(None).await.unwrap_err();

    assert!(matches!(err, ProvisionError::DownloadFailed(_)), "got {:?}", err);
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn provision_rejects_corrupt_archive() {
    let install = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not an archive".to_vec()))
        .mount(&server)
        .await;

    let locator = FfmpegLocator::isolated(install.path())
        .with_download_url(format!("{}/ffmpeg.tar.gz", server.uri()));
    let err = locator.provision(None).await.unwrap_err();

    assert!(matches!(err, ProvisionError::ExtractFailed(_)), "got {:?}", err);
    assert!(locator.locate().is_none());
}

#[tokio::test]
async fn provision_without_binary_in_archive() {
    let scratch = TempDir::new().unwrap();
    let install = TempDir::new().unwrap();
    std::fs::write(scratch.path().join("notes.txt"), "nothing here").unwrap();
    let archive = scratch.path().join("empty.tar.gz");
    let status = Command::new("tar")
        .arg("-czf")
        .arg(&archive)
        .arg("-C")
        .arg(scratch.path())
        .arg("notes.txt")
        .status()
        .unwrap();
    assert!(status.success());

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(std::fs::read(&archive).unwrap()))
        .mount(&server)
        .await;

    let locator = FfmpegLocator::isolated(install.path())
        .with_download_url(format!("{}/ffmpeg.tar.gz", server.uri()));
    let err = locator.provision(None).await.unwrap_err();
    assert!(matches!(err, ProvisionError::BinaryMissing), "got {:?}", err);
}
