//! Screen Recorder CLI entry point

use std::process::ExitCode;

use clap::Parser;

use screen_recorder::cli::{
    app::{load_merged_config, locate_ffmpeg, EXIT_ERROR},
    args::{Cli, Commands, RecordArgs},
    config_cmd::handle_config_command,
    ffmpeg_cmd::handle_ffmpeg_command,
    logging::init_logging,
    presenter::Presenter,
    run_menu, run_record,
};
use screen_recorder::domain::config::{AppConfig, LinuxConfig};
use screen_recorder::infrastructure::{FfmpegLocator, XdgConfigStore};

/// Config layer built from command-line flags
fn cli_config(cli: &Cli, record: Option<&RecordArgs>) -> AppConfig {
    let mut config = AppConfig {
        ffmpeg_path: cli.ffmpeg.as_ref().map(|p| p.to_string_lossy().into_owned()),
        ..Default::default()
    };

    if let Some(args) = record {
        config.max_duration = args.max_duration.clone();
        config.notify = args.notify.then_some(true);
        if args.indicator || args.indicator_position.is_some() {
            config.linux = Some(LinuxConfig {
                indicator: args.indicator.then_some(true),
                indicator_position: args.indicator_position.map(|p| p.as_str().to_string()),
            });
        }
    }
    config
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut presenter = Presenter::new();

    let record_args = match &cli.command {
        Some(Commands::Record(args)) => Some(args),
        _ => None,
    };
    let config = load_merged_config(cli_config(&cli, record_args)).await;

    match cli.command {
        Some(Commands::Config { action }) => {
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Some(Commands::Ffmpeg { action }) => {
            let locator = FfmpegLocator::new(config.ffmpeg_path());
            if let Err(e) = handle_ffmpeg_command(action, &locator, &mut presenter).await {
                presenter.error(&e);
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Some(Commands::Record(args)) => run_record(args, config).await,
        Some(Commands::Menu) | None => {
            if locate_ffmpeg(&config).is_none() {
                presenter.warn("ffmpeg not found; use the ffmpeg menu to install it");
            }
            run_menu(config).await
        }
    }
}
