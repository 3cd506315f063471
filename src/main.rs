//! bili-downloader - CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use bili_downloader::{
    api::BiliApi,
    cli::Args,
    config::{parse_media_id, validate_config, Config},
    download::{
        resolve_playlist, Aria2cOptions, EngineOptions, HttpConfig, HttpSource, Pipeline,
        PipelineOptions, SegmentedDownloader, TransferSupervisor,
    },
    error::{exit_codes, Error, Result},
    output::{
        create_spinner, print_banner, print_config_summary, print_error, print_info,
        print_run_stats, print_warning, TermPrompt,
    },
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            ExitCode::from(exit_code_for(&e) as u8)
        }
    }
}

fn exit_code_for(error: &Error) -> i32 {
    match error {
        Error::Config(_)
        | Error::ConfigValidation { .. }
        | Error::MissingConfig(_)
        | Error::InvalidMediaId(_)
        | Error::TomlParse(_) => exit_codes::CONFIG_ERROR,
        Error::Api(_) | Error::ApiCode { .. } | Error::NoTrackContainer => exit_codes::API_ERROR,
        Error::HttpStatus { .. }
        | Error::Http(_)
        | Error::Truncated { .. }
        | Error::SegmentsFailed { .. }
        | Error::EmptyTrackUrl
        | Error::Assembly { .. }
        | Error::Mux(_)
        | Error::Aria2c(_)
        | Error::ToolNotFound(_) => exit_codes::DOWNLOAD_ERROR,
        Error::Cancelled | Error::InvalidChoice { .. } => exit_codes::ABORT,
        _ => exit_codes::UNEXPECTED_ERROR,
    }
}

async fn run() -> Result<i32> {
    // Parse CLI arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    print_banner();

    // Load configuration
    let config_path = args.config.clone();
    if Config::locate(&config_path).is_none() {
        print_warning(&format!(
            "Configuration file not found: {}",
            config_path.display()
        ));
        print_info("Using default configuration with CLI arguments");
    }
    let mut config = Config::load_or_default(&config_path)?;

    let input = args.input.clone();
    let info_only = args.info;

    // Merge CLI arguments into config
    args.merge_into_config(&mut config);

    validate_config(&config)?;
    let media_id = parse_media_id(&input)?;

    print_config_summary(
        &media_id.to_string(),
        &config.api.mode.to_string(),
        &config.download.strategy.to_string(),
        &config.work_dir().display().to_string(),
    );

    // Shared HTTP settings for the API client and the transfer engine
    let http = HttpConfig::new(
        config.account.user_agent.as_deref(),
        config.account.cookie.as_deref(),
        Duration::from_secs(config.download.timeout_secs),
    );

    let api = BiliApi::new(
        http.clone(),
        config.api.clone(),
        config.account.access_token.clone(),
    )?;

    let spinner = create_spinner(&format!("Resolving {}...", media_id));
    let playlist = resolve_playlist(&api, &media_id).await;
    spinner.finish_and_clear();
    let playlist = playlist?.select_pages(config.download.select_page.as_deref())?;

    if playlist.entries.is_empty() {
        print_warning("Nothing to download");
        return Ok(exit_codes::SUCCESS);
    }

    let source = Arc::new(HttpSource::new(http.clone())?);
    let engine = SegmentedDownloader::new(
        source,
        EngineOptions {
            segment_size: config.segment_size(),
            multi_segment: true,
            resume_attempts: config.download.resume_attempts,
        },
    );
    let supervisor = TransferSupervisor::new(
        engine,
        config.download.strategy,
        Aria2cOptions {
            program: config.download.aria2c_path.clone(),
            extra_args: config.download.aria2c_args.clone(),
        },
        http,
    );

    // Ctrl-C cancels the running transfer
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            ctrl_c.cancel();
        }
    });

    let pipeline = Pipeline::new(
        &api,
        &supervisor,
        PipelineOptions::from_config(&config, info_only),
    );
    let mut prompt = TermPrompt::new();
    let stats = pipeline.run(&playlist, &mut prompt, &cancel).await?;

    print_run_stats(&stats);

    if stats.has_failures() {
        print_warning(&format!("{} entr(ies) failed", stats.entries_failed));
        return Ok(exit_codes::SOME_ENTRIES_FAILED);
    }

    Ok(exit_codes::SUCCESS)
}
