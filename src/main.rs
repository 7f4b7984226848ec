//! Gym Occupancy OCR
//!
//! Turns screenshots of a gym's occupancy display into structured JSON,
//! merges the results into a history CSV, and captures dashboard screenshots
//! with a headless browser.

mod capture;
mod config;
mod logging;
mod ocr;
mod paths;
mod pipeline;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use config::AppConfig;
use pipeline::OcrPipeline;

#[derive(Parser)]
#[command(name = "gym-ocr")]
#[command(about = "Gym occupancy screenshot OCR and dashboard capture")]
#[command(version)]
struct Cli {
    /// Path to config.json (defaults to ./config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract occupancy data from inbox screenshots (default)
    Process {
        /// Do not copy new screenshots from the synced source folder
        #[arg(long)]
        skip_collect: bool,
    },
    /// Capture light/dark dashboard screenshots with headless Chrome
    Capture {
        /// Exit non-zero when automatic capture fails
        #[arg(long)]
        strict: bool,
        /// Dashboard URL to open instead of the configured one
        #[arg(long)]
        url: Option<String>,
    },
    /// Merge the results JSON into the history CSV
    MergeCsv {
        /// History CSV to update instead of the configured one
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Locate Tesseract and make sure its language data is installed
    SetupTesseract,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_source) = config::load_config(cli.config.as_deref());
    logging::init_logging(&paths::get_logs_dir(), config.log_level());
    logging::install_panic_hook();
    config_source.log();

    match cli.command.unwrap_or(Commands::Process { skip_collect: false }) {
        Commands::Process { skip_collect } => run_process(config, skip_collect),
        Commands::Capture { strict, url } => {
            let mut capture_config = config.capture;
            if let Some(url) = url {
                capture_config.dashboard_url = url;
            }
            if capture::run_capture(&capture_config).is_none() && strict {
                tracing::error!("Capture failed in strict mode");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::MergeCsv { csv } => {
            let csv_path = csv.unwrap_or_else(|| paths::resolve(&config.history.csv_file));
            pipeline::csv_merge::merge_into_history(&config.pipeline.output_path(), &csv_path)?;
            Ok(())
        }
        Commands::SetupTesseract => {
            let tessdata = ocr::ensure_tesseract(&config.ocr)?;
            tracing::info!("Tesseract language data ready: {}", tessdata.display());
            Ok(())
        }
    }
}

fn run_process(config: AppConfig, skip_collect: bool) -> Result<()> {
    tracing::info!("Gym occupancy OCR started");

    let chain = ocr::build_chain(&config.ocr);
    let mut pipeline = OcrPipeline::new(config.pipeline, chain);
    if skip_collect {
        pipeline = pipeline.without_collection();
    }

    let summary = pipeline.run()?;
    if summary.output_written {
        println!(
            "Extracted {} of {} images",
            summary.extracted, summary.images
        );
    }
    Ok(())
}
