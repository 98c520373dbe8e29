use anyhow::{Context, Result};
use clap::Parser;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiktok_scribe::cli::{Cli, Commands};
use tiktok_scribe::config::Config;
use tiktok_scribe::http::{HttpFetcher, PageFetcher};
use tiktok_scribe::output;
use tiktok_scribe::platform::PlatformClient;
use tiktok_scribe::tools::{ExtractionTool, Ffmpeg, YtDlp};
use tiktok_scribe::transcribe::{SpeechModel, WhisperCli};
use tiktok_scribe::utils;
use tiktok_scribe::{MediaLocator, PipelineError, TranscriptionPipeline, VideoCatalog};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().await?.with_cookie_override(cli.cookies.clone());
    init_tracing(&cli, &config)?;

    if let Commands::Config { show } = &cli.command {
        if *show {
            config.display();
        } else {
            println!("Configuration file: {}", Config::location()?.display());
            println!("Edit it to change tool paths, timeouts and caption languages.");
        }
        return Ok(());
    }

    // Check for required external dependencies (non-fatal)
    let missing_deps = utils::check_dependencies(&config).await;
    if !missing_deps.is_empty() && !cli.quiet {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(HttpFetcher::new(&config).context("Failed to build HTTP client")?);
    let tool: Arc<dyn ExtractionTool> = Arc::new(YtDlp::new(&config));

    match cli.command {
        Commands::Resolve { url } => {
            let locator = MediaLocator::new(&config, fetcher, tool);
            let direct_url = locator.resolve(&url).await.map_err(report)?;
            println!("{}", direct_url);
        }
        Commands::List {
            user,
            start,
            end,
            format,
        } => {
            if let (Some(start), Some(end)) = (start, end) {
                if start > end {
                    anyhow::bail!("--start {} is after --end {}", start, end);
                }
            }

            let catalog = VideoCatalog::new(&config, PlatformClient::new(&config, fetcher), tool);
            let videos = catalog.list_videos(&user, start, end).await;
            output::print_videos(&videos, format)?;
        }
        Commands::Transcribe {
            url,
            direct_url,
            language,
            output,
            format,
            no_caption_fallback,
        } => {
            let model: Arc<dyn SpeechModel> = Arc::new(WhisperCli::new(&config));
            let mut pipeline = TranscriptionPipeline::new(&config, fetcher, tool, Arc::new(Ffmpeg::new(&config)), model)
                .with_progress(!cli.quiet);
            if no_caption_fallback {
                pipeline = pipeline.with_caption_fallback(false);
            }

            tracing::info!("Starting transcription for URL: {}", url);

            let result = pipeline
                .transcribe(&url, direct_url.as_deref(), language.as_deref())
                .await
                .map_err(report)?;

            match output {
                Some(path) => {
                    output::save_to_file(&result, &path, format).await?;
                    println!("Transcription saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&result, format)?;
                }
            }
        }
        Commands::Subtitles { url, language } => {
            let model: Arc<dyn SpeechModel> = Arc::new(WhisperCli::new(&config));
            let pipeline = TranscriptionPipeline::new(&config, fetcher, tool, Arc::new(Ffmpeg::new(&config)), model);

            let result = pipeline
                .subtitles(&url, language.as_deref())
                .await
                .map_err(report)?;
            println!("{}", result.text);
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_tracing(cli: &Cli, config: &Config) -> Result<()> {
    let default_filter = if cli.verbose {
        "tiktok_scribe=debug"
    } else {
        "tiktok_scribe=info"
    };

    let debug_log = match &config.app.debug_log {
        Some(path) => {
            let file = fs_err::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .context("Failed to open debug log")?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(debug_log)
        .init();

    Ok(())
}

/// Attach the failure category to the message shown to the user
fn report(error: PipelineError) -> anyhow::Error {
    anyhow::anyhow!("{} [{}]", error, error.category())
}
