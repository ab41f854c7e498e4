//! ffmpeg subcommand handler

use std::sync::Arc;

use crate::application::ports::{BinaryLocator, ProgressCallback};

use super::args::FfmpegAction;
use super::presenter::Presenter;

/// Handle ffmpeg subcommand
pub async fn handle_ffmpeg_command<L: BinaryLocator>(
    action: FfmpegAction,
    locator: &L,
    presenter: &mut Presenter,
) -> Result<(), String> {
    match action {
        FfmpegAction::Check => check(locator, presenter),
        FfmpegAction::Install { force } => install(locator, presenter, force).await,
    }
}

fn check<L: BinaryLocator>(locator: &L, presenter: &Presenter) -> Result<(), String> {
    match locator.locate() {
        Some(path) => {
            presenter.output(&path.to_string_lossy());
            Ok(())
        }
        None => Err(
            "ffmpeg binary not found. Run 'screen-recorder ffmpeg install' to download it"
                .to_string(),
        ),
    }
}

/// Download ffmpeg unless one is already usable
pub async fn install<L: BinaryLocator>(
    locator: &L,
    presenter: &mut Presenter,
    force: bool,
) -> Result<(), String> {
    if !force {
        if let Some(existing) = locator.locate() {
            presenter.info(&format!(
                "ffmpeg already available at {} (use --force to reinstall)",
                existing.display()
            ));
            return Ok(());
        }
    }

    presenter.info("Downloading ffmpeg...");
    presenter.start_download(None);
    let on_progress: Option<ProgressCallback> = presenter.download_bar().map(|bar| {
        Arc::new(move |downloaded: u64, total: Option<u64>| {
            if let Some(total) = total {
                bar.set_length(total);
            }
            bar.set_position(downloaded);
        }) as ProgressCallback
    });

    let result = locator.provision(on_progress).await;
    presenter.finish_download();

    match result {
        Ok(path) => {
            presenter.success(&format!("ffmpeg installed at {}", path.display()));
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    }
}
