//! # Media Normalizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap` (sottocomandi)
//! - Inizializzazione del logging con `tracing` (`RUST_LOG` o `--verbose`), su stderr
//! - Caricamento della configurazione da file e override da CLI
//! - Health check di ffmpeg/ffprobe all'avvio, non per singola richiesta
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-normalizer normalize ./uploads --output ./normalized --workers 8
//! media-normalizer inspect clip.mov
//! media-normalizer trim clip.mov --output ./previews
//! media-normalizer check
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use media_normalizer::config::ResizeMode;
use media_normalizer::file_manager::FileManager;
use media_normalizer::json_output::JsonMessage;
use media_normalizer::tool_resolver::ToolResolver;
use media_normalizer::uploader::LocalDirUploader;
use media_normalizer::{BatchRunner, Config, MediaPipeline, RunMode};

#[derive(Parser)]
#[command(name = "media-normalizer")]
#[command(about = "Normalize images and videos to standard social-media aspect ratios")]
struct Args {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON events on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize files or directories and store the results
    Normalize {
        /// Files or directories to process
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,

        /// JPEG quality (1-100)
        #[arg(short, long)]
        quality: Option<u8>,

        /// Primary video CRF (0-51, higher = smaller)
        #[arg(short, long)]
        crf: Option<u8>,

        /// How images are fitted into the matched format
        #[arg(long, value_enum)]
        resize_mode: Option<ResizeMode>,
    },

    /// Print the metadata record of a file without transforming it
    Inspect {
        file: PathBuf,
    },

    /// Stream-copy trim videos to the configured preview length
    Trim {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Check that ffmpeg and ffprobe are available
    Check,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Output directory for processed files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(args.config.as_ref()).await?;
    config.json_output = args.json;

    let result = match args.command {
        Command::Normalize {
            paths,
            output,
            quality,
            crf,
            resize_mode,
        } => {
            if let Some(quality) = quality {
                config.image_quality = quality;
            }
            if let Some(crf) = crf {
                config.video_crf = crf;
                config.fallback_crf = config.fallback_crf.max(crf);
            }
            if let Some(mode) = resize_mode {
                config.resize_mode = mode;
            }
            run_batch(config, &paths, output, RunMode::Normalize).await
        }
        Command::Trim { paths, output } => run_batch(config, &paths, output, RunMode::Trim).await,
        Command::Inspect { file } => inspect(config, file).await,
        Command::Check => check(config),
    };

    if let Err(ref e) = result {
        if args.json {
            JsonMessage::error(e.to_string(), Some(format!("{:#}", e))).emit();
        }
    }
    result
}

async fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path.cloned().or_else(Config::default_path) {
        Some(path) => Config::from_file(&path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

async fn run_batch(mut config: Config, paths: &[PathBuf], output: OutputArgs, mode: RunMode) -> Result<()> {
    if let Some(dir) = output.output {
        config.output_path = Some(dir);
    }
    if let Some(workers) = output.workers {
        config.workers = workers;
    }
    let output_dir = config
        .output_path
        .get_or_insert_with(|| PathBuf::from("normalized"))
        .clone();
    config.validate()?;

    let pipeline = MediaPipeline::new(config.clone());
    pipeline.health_check()?;

    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    info!("Writing results to {}", output_dir.display());

    let runner = BatchRunner::new(
        Arc::new(config),
        Arc::new(pipeline),
        Arc::new(LocalDirUploader::new(output_dir)),
        mode,
    );
    let summary = runner.run(paths).await?;

    if summary.has_fatal_error() {
        return Err(anyhow::anyhow!("Encoder became unavailable during the run"));
    }
    if summary.stats.errors > 0 {
        error!("{} of {} files failed", summary.stats.errors, summary.stats.files_processed);
    }
    Ok(())
}

async fn inspect(config: Config, file: PathBuf) -> Result<()> {
    config.validate()?;
    let bytes = FileManager::read_upload(&file).await?;
    let pipeline = MediaPipeline::new(config);
    let info = pipeline.describe(&FileManager::upload_name(&file), &bytes).await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn check(config: Config) -> Result<()> {
    let resolver = ToolResolver::new();
    for tool in ["ffmpeg", "ffprobe"] {
        match resolver.resolve(tool) {
            Some(path) => info!("{}: {}", tool, path.display()),
            None => error!("{}: not found", tool),
        }
    }
    MediaPipeline::new(config).health_check()?;
    info!("All required tools are available");
    Ok(())
}
