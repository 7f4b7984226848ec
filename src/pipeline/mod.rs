//! Screenshot-to-JSON extraction pipeline.
//!
//! This module provides:
//! - Collection of new screenshots from the synced source folder
//! - Per-image OCR and field extraction
//! - The results JSON file and the historical CSV merge

pub mod collect;
pub mod csv_merge;
pub mod export;
pub mod record;

pub use record::{ExtractedRecord, OutputDocument};

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::ocr::{self, OcrChain, OcrError};
use crate::paths::{file_name_str, has_extension};

/// Why an image produced no record.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("OCR produced no text: {0}")]
    Ocr(#[from] OcrError),
    #[error("missing required data: {}", .0.join(", "))]
    Incomplete(Vec<&'static str>),
}

/// Aggregate outcome of one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub images: usize,
    pub extracted: usize,
    pub decode_failures: usize,
    pub ocr_failures: usize,
    pub incomplete: usize,
    /// Records kept even though the count lies outside the status range
    pub inconsistent: usize,
    pub collected: usize,
    /// False when there was nothing to process and no file was written
    pub output_written: bool,
}

impl RunSummary {
    fn record_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::Decode(_) => self.decode_failures += 1,
            SkipReason::Ocr(_) => self.ocr_failures += 1,
            SkipReason::Incomplete(_) => self.incomplete += 1,
        }
    }
}

pub struct OcrPipeline {
    config: PipelineConfig,
    chain: OcrChain,
    collect_enabled: bool,
}

impl OcrPipeline {
    pub fn new(config: PipelineConfig, chain: OcrChain) -> Self {
        Self {
            config,
            chain,
            collect_enabled: true,
        }
    }

    /// Disables the source-folder collection step.
    pub fn without_collection(mut self) -> Self {
        self.collect_enabled = false;
        self
    }

    /// Reads, recognizes and parses one image.
    pub fn process_image(&self, path: &Path, today: NaiveDate) -> Result<ExtractedRecord, SkipReason> {
        let filename = file_name_str(path).unwrap_or_default();
        tracing::info!("   Processing {}...", filename);

        let img = image::open(path)?;
        let preprocessed = ocr::preprocess(&img);
        let recognized = self.chain.read_text(&preprocessed)?;
        tracing::info!("   OCR text ({}): \"{}\"", recognized.engine, recognized.text);

        let fields = ocr::extract_fields(&recognized.text, filename, today);
        if let Some(clock) = &fields.clock {
            tracing::debug!("   Time {} from {:?}", clock.formatted(), clock.source);
        }

        ExtractedRecord::from_fields(filename, local_timestamp(), fields, &recognized.text)
            .map_err(SkipReason::Incomplete)
    }

    /// Lists recognized images in the inbox, sorted by filename.
    pub fn inbox_images(&self, inbox: &Path) -> Result<Vec<String>> {
        let mut files: Vec<String> = fs::read_dir(inbox)
            .with_context(|| format!("Failed to list {}", inbox.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| has_extension(name, &self.config.supported_formats))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Runs the whole batch: collect, process every inbox image, write results.
    ///
    /// Per-image problems are logged and counted; only setup and output
    /// errors abort the run.
    pub fn run(&self) -> Result<RunSummary> {
        if self.chain.is_empty() {
            return Err(anyhow!(
                "No OCR engine available. Install EasyOCR or Tesseract (see `gym-ocr setup-tesseract`)."
            ));
        }
        tracing::info!("Starting OCR run with: {}", self.chain.engine_names().join(" -> "));

        let mut summary = RunSummary::default();
        let inbox = self.config.inbox_path();

        if !self.collect_enabled {
            tracing::info!("Source collection disabled");
        } else if self.config.is_hosted_ci() {
            tracing::info!("Hosted CI detected ({}=true): skipping source collection", self.config.ci_env_var);
        } else {
            match collect::collect_from_source(
                &self.config.source_path(),
                &inbox,
                &self.config.supported_formats,
            ) {
                Ok(collected) => summary.collected = collected.copied,
                Err(e) => tracing::error!("Source collection failed: {:#}", e),
            }
        }

        if !inbox.exists() {
            tracing::warn!("Inbox directory not found: {}", inbox.display());
            return Ok(summary);
        }

        let files = self.inbox_images(&inbox)?;
        if files.is_empty() {
            tracing::info!("No images to process in {}", inbox.display());
            return Ok(summary);
        }
        tracing::info!("Processing {} images...", files.len());

        let today = Local::now().date_naive();
        let mut records = Vec::new();
        for filename in &files {
            summary.images += 1;
            match self.process_image(&inbox.join(filename), today) {
                Ok(record) => {
                    tracing::info!("   Extracted: {}人 {}", record.count, record.status);
                    if !record.is_consistent() {
                        tracing::warn!(
                            "   Count {} outside status range {}-{} for {}",
                            record.count,
                            record.status_min,
                            record.status_max,
                            filename
                        );
                        summary.inconsistent += 1;
                    }
                    records.push(record);
                }
                Err(reason) => {
                    tracing::warn!("   Skipped {}: {}", filename, reason);
                    summary.record_skip(&reason);
                }
            }
        }

        summary.extracted = records.len();
        let output_path = self.config.output_path();
        export::write_output(&OutputDocument::new(local_timestamp(), records), &output_path)?;
        summary.output_written = true;
        tracing::info!("Results saved: {}", output_path.display());

        tracing::info!(
            "Run complete: {} of {} images extracted ({} decode failures, {} OCR failures, {} incomplete, {} inconsistent)",
            summary.extracted,
            summary.images,
            summary.decode_failures,
            summary.ocr_failures,
            summary.incomplete,
            summary.inconsistent
        );

        Ok(summary)
    }
}

/// Local time in ISO-8601 with microseconds.
pub fn local_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::tests::FixedRecognizer;
    use image::{GrayImage, Luma};
    use tempfile::{tempdir, TempDir};

    fn write_png(dir: &Path, name: &str) {
        GrayImage::from_pixel(8, 8, Luma([128])).save(dir.join(name)).unwrap();
    }

    fn setup(response: Result<&'static str, &'static str>) -> (TempDir, OcrPipeline) {
        let dir = tempdir().unwrap();
        let config = PipelineConfig {
            inbox_dir: dir.path().join("inbox").to_string_lossy().to_string(),
            output_file: dir.path().join("out").join("extracted.json").to_string_lossy().to_string(),
            source_dir: dir.path().join("source").to_string_lossy().to_string(),
            ci_env_var: "GYM_OCR_TEST_UNSET_FLAG".to_string(),
            ..PipelineConfig::default()
        };
        fs::create_dir_all(config.inbox_path()).unwrap();
        let chain = OcrChain::new(vec![Box::new(FixedRecognizer { name: "fake", response })]);
        (dir, OcrPipeline::new(config, chain))
    }

    #[test]
    fn test_output_preserves_sorted_order() {
        let (dir, pipeline) = setup(Ok("12人 空いています 21:05"));
        let inbox = dir.path().join("inbox");
        write_png(&inbox, "b.png");
        write_png(&inbox, "a.png");
        fs::write(inbox.join("notes.txt"), "ignored").unwrap();

        let summary = pipeline.run().unwrap();
        assert_eq!(summary.images, 2);
        assert_eq!(summary.extracted, 2);

        let doc = export::read_output(&dir.path().join("out").join("extracted.json")).unwrap();
        let names: Vec<&str> = doc.data.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
        assert_eq!(doc.total_count, 2);
        assert_eq!(doc.data[0].time, "21:05");
        assert_eq!(doc.data[0].status_code, 5);
    }

    #[test]
    fn test_missing_count_drops_record() {
        let (dir, pipeline) = setup(Ok("空いています 21:05"));
        write_png(&dir.path().join("inbox"), "FP24_20250815_222321.png");

        let summary = pipeline.run().unwrap();
        assert_eq!(summary.extracted, 0);
        assert_eq!(summary.incomplete, 1);
        assert!(summary.output_written);

        let doc = export::read_output(&dir.path().join("out").join("extracted.json")).unwrap();
        assert!(doc.data.is_empty());
    }

    #[test]
    fn test_bad_image_does_not_abort_batch() {
        let (dir, pipeline) = setup(Ok("7人 空いています"));
        let inbox = dir.path().join("inbox");
        fs::write(inbox.join("a.png"), b"not an image").unwrap();
        write_png(&inbox, "b.png");

        let summary = pipeline.run().unwrap();
        assert_eq!(summary.decode_failures, 1);
        assert_eq!(summary.extracted, 1);
    }

    #[test]
    fn test_ocr_failure_counted() {
        let (dir, pipeline) = setup(Err("engine crashed"));
        write_png(&dir.path().join("inbox"), "a.png");

        let summary = pipeline.run().unwrap();
        assert_eq!(summary.ocr_failures, 1);
        assert_eq!(summary.extracted, 0);
    }

    #[test]
    fn test_noon_default_when_no_time_anywhere() {
        let (dir, pipeline) = setup(Ok("現在 9人 空いています"));
        let path = dir.path().join("inbox").join("gym.png");
        write_png(&dir.path().join("inbox"), "gym.png");

        let today = NaiveDate::from_ymd_opt(2025, 8, 16).unwrap();
        let record = pipeline.process_image(&path, today).unwrap();
        assert_eq!(record.hour, 12);
        assert_eq!(record.time, "12:00");
        assert_eq!(record.date, "2025-08-16");
    }

    #[test]
    fn test_empty_inbox_writes_nothing() {
        let (dir, pipeline) = setup(Ok("1人 空いています"));
        let summary = pipeline.run().unwrap();
        assert!(!summary.output_written);
        assert!(!dir.path().join("out").join("extracted.json").exists());
    }

    #[test]
    fn test_collection_feeds_inbox() {
        let (dir, pipeline) = setup(Ok("3人 空いています"));
        let source = dir.path().join("source");
        fs::create_dir_all(&source).unwrap();
        write_png(&source, "FP24_20250815_101500.png");

        let summary = pipeline.run().unwrap();
        assert_eq!(summary.collected, 1);
        assert_eq!(summary.extracted, 1);
    }

    #[test]
    fn test_no_engines_is_an_error() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig {
            inbox_dir: dir.path().to_string_lossy().to_string(),
            ..PipelineConfig::default()
        };
        let pipeline = OcrPipeline::new(config, OcrChain::default()).without_collection();
        assert!(pipeline.run().is_err());
    }
}
