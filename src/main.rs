//! `clipcast` CLI - produce a video from a script and publish it on a schedule

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use clipcast::publish::{next_peak_instants, VideoMetadata};
use clipcast::{
    Cancellation, Config, ProductionPipeline, ProductionRequest, PublishScheduler, ResumableUploader, RetryPolicy,
    YouTubeTransport,
};

#[derive(Parser)]
#[command(name = "clipcast")]
#[command(about = "Turn a script into a narrated, captioned video and publish it")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/clipcast/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce a video from a request (JSON string, JSON file, or stdin)
    Produce {
        /// Request JSON or path to a JSON file
        input: Option<String>,
    },

    /// Upload a produced video once per daily publish slot
    Publish {
        /// Publish request JSON or path to a JSON file
        input: Option<String>,
    },

    /// Show the upcoming publish slots
    Slots,
}

/// Input of `clipcast publish`
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishRequest {
    video_file_path: PathBuf,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
}

const ACCESS_TOKEN_VAR: &str = "YOUTUBE_ACCESS_TOKEN";

fn demo_request() -> ProductionRequest {
    ProductionRequest {
        title: "AI Breakthrough: New Language Model".to_string(),
        video_type: clipcast::VideoType::Shorts,
        short_script: "Breaking news in AI! A new language model has been released with \
                       unprecedented capabilities. It outperforms previous models on every \
                       benchmark while running twice as fast. Stay tuned for more updates!"
            .to_string(),
        long_script: String::new(),
        image_prompts: vec![
            "Futuristic AI brain with glowing neural networks".to_string(),
            "Computer screen showing benchmark results".to_string(),
            "Fast-moving data streams in cyberspace".to_string(),
        ],
    }
}

/// Read request JSON from an argument (inline or file path) or stdin
fn read_input(input: Option<&str>) -> Result<Option<String>> {
    if let Some(input) = input {
        let path = PathBuf::from(input);
        if !input.trim_start().starts_with('{') && path.is_file() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            return Ok(Some(content));
        }
        return Ok(Some(input.to_string()));
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    stdin.lock().read_to_string(&mut buf).context("failed to read stdin")?;
    Ok(if buf.trim().is_empty() { None } else { Some(buf) })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn failed(error: &anyhow::Error) -> ExitCode {
    let body = json!({ "status": "failed", "error": format!("{error:#}") });
    println!("{body:#}");
    ExitCode::FAILURE
}

/// Cancel in-flight work on Ctrl-C
fn cancel_on_interrupt() -> Cancellation {
    let cancel = Cancellation::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            handle.cancel();
        }
    });
    cancel
}

async fn cmd_produce(config: &Config, input: Option<&str>) -> Result<bool> {
    let request = match read_input(input)? {
        Some(json) => serde_json::from_str::<ProductionRequest>(&json).context("invalid production request")?,
        None => {
            info!("No input given, producing the demo request");
            demo_request()
        }
    };

    let config = config.clone().with_env_overrides();
    let pipeline = ProductionPipeline::from_config(&config).with_cancellation(cancel_on_interrupt());
    let result = pipeline.process(&request).await;
    print_json(&result)?;
    Ok(result.is_success())
}

async fn cmd_publish(config: &Config, input: Option<&str>) -> Result<bool> {
    let json = read_input(input)?.context("no publish request given")?;
    let request: PublishRequest = serde_json::from_str(&json).context("invalid publish request")?;
    let token = std::env::var(ACCESS_TOKEN_VAR).with_context(|| format!("{ACCESS_TOKEN_VAR} is not set"))?;

    let instants = next_peak_instants(&config.schedule)?;
    let metadata =
        VideoMetadata::new(request.title, request.description, &config.upload).with_tags(request.tags);

    let transport = YouTubeTransport::new(token, config.timeouts.upload_request())?
        .with_cancellation(cancel_on_interrupt());
    let uploader = ResumableUploader::new(transport, RetryPolicy::from_config(&config.upload))
        .with_chunk_size(config.upload.chunk_size);
    let scheduler = PublishScheduler::new(uploader);

    let attempts = scheduler
        .schedule(&request.video_file_path, &metadata, &instants)
        .await;
    print_json(&attempts)?;
    Ok(attempts.iter().all(clipcast::UploadAttempt::is_success))
}

fn cmd_slots(config: &Config) -> Result<bool> {
    let instants = next_peak_instants(&config.schedule)?;
    for instant in instants {
        println!("{}", instant.to_rfc3339());
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON result
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let outcome = match Config::load(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Produce { input } => cmd_produce(&config, input.as_deref()).await,
            Commands::Publish { input } => cmd_publish(&config, input.as_deref()).await,
            Commands::Slots => cmd_slots(&config),
        },
        Err(e) => Err(e),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => failed(&e),
    }
}
