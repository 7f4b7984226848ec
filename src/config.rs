//! Configuration types.
//!
//! Loads settings from config.json at startup. Every field has a default, so a
//! partial (or missing) config file is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// Inbox, output and collection settings for the OCR pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding screenshots to process
    pub inbox_dir: String,
    /// Results JSON, overwritten on every run
    pub output_file: String,
    /// Synced folder that new screenshots are collected from (`~/` allowed)
    pub source_dir: String,
    /// Recognized image extensions, lower-case with leading dot
    pub supported_formats: Vec<String>,
    /// Environment variable that marks a hosted CI run (collection skipped when "true")
    pub ci_env_var: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inbox_dir: "screenshots/inbox".to_string(),
            output_file: "scripts/extracted-data.json".to_string(),
            source_dir: "~/Library/Mobile Documents/iCloud~is~workflow~my~workflows/Documents/My_Gym"
                .to_string(),
            supported_formats: [".png", ".jpg", ".jpeg", ".bmp", ".tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ci_env_var: "GITHUB_ACTIONS".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn inbox_path(&self) -> PathBuf {
        paths::resolve(&self.inbox_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        paths::resolve(&self.output_file)
    }

    pub fn source_path(&self) -> PathBuf {
        paths::resolve(&self.source_dir)
    }

    /// Returns true when running inside the hosted CI environment.
    pub fn is_hosted_ci(&self) -> bool {
        std::env::var(&self.ci_env_var).is_ok_and(|v| v == "true")
    }
}

/// OCR engine settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Try the neural reader (EasyOCR) first
    pub easyocr_enabled: bool,
    /// EasyOCR executable; looked up on PATH when relative
    pub easyocr_executable: String,
    /// EasyOCR language codes
    pub easyocr_languages: Vec<String>,
    /// Fragments at or below this confidence are dropped
    pub min_confidence: f32,
    /// Use Tesseract as the fallback engine
    pub tesseract_enabled: bool,
    /// Explicit Tesseract executable; discovered when unset
    pub tesseract_executable: Option<String>,
    /// Explicit tessdata directory; discovered when unset
    pub tessdata_dir: Option<String>,
    /// Tesseract languages joined with `+`, e.g. "jpn+eng"
    pub tesseract_languages: String,
    /// Page segmentation mode
    pub tesseract_psm: u8,
    /// OCR engine mode
    pub tesseract_oem: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            easyocr_enabled: true,
            easyocr_executable: "easyocr".to_string(),
            easyocr_languages: vec!["ja".to_string(), "en".to_string()],
            min_confidence: 0.5,
            tesseract_enabled: true,
            tesseract_executable: None,
            tessdata_dir: None,
            tesseract_languages: "jpn+eng".to_string(),
            tesseract_psm: 6,
            tesseract_oem: 3,
        }
    }
}

/// Dashboard screenshot settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub dashboard_url: String,
    pub screenshot_dir: String,
    pub window_width: u32,
    pub window_height: u32,
    /// Theme toggle candidates, tried in order
    pub dark_mode_selectors: Vec<String>,
    /// Element whose presence marks the page as loaded
    pub ready_selector: String,
    pub ready_timeout_ms: u64,
    /// Extra wait after the page is ready, for client-side rendering
    pub settle_delay_ms: u64,
    /// Wait after clicking the toggle, for the theme transition
    pub toggle_delay_ms: u64,
    /// Explicit Chrome/Chromium executable; auto-detected when unset
    pub chrome_executable: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dashboard_url: "http://localhost:3000/dashboard".to_string(),
            screenshot_dir: "assets/screenshots".to_string(),
            window_width: 1920,
            window_height: 1080,
            dark_mode_selectors: vec![
                "[data-theme='dark']".to_string(),
                ".dark-mode-toggle".to_string(),
                ".theme-toggle".to_string(),
            ],
            ready_selector: "body".to_string(),
            ready_timeout_ms: 10_000,
            settle_delay_ms: 3_000,
            toggle_delay_ms: 2_000,
            chrome_executable: None,
        }
    }
}

impl CaptureConfig {
    pub fn screenshot_path(&self) -> PathBuf {
        paths::resolve(&self.screenshot_dir)
    }
}

/// Historical CSV settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub csv_file: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            csv_file: "public/fit_place24_data.csv".to_string(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub ocr: OcrConfig,
    pub capture: CaptureConfig,
    pub history: HistoryConfig,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        if self.log_level.is_empty() {
            "info"
        } else {
            &self.log_level
        }
    }
}

/// Where the active configuration came from.
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    Missing(PathBuf),
    Unreadable { path: PathBuf, error: String },
    Invalid { path: PathBuf, error: String },
}

impl ConfigSource {
    /// Reports the outcome. Called once the logger is installed.
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => tracing::info!("Config loaded from {}", path.display()),
            ConfigSource::Missing(path) => {
                tracing::info!("{} not found. Using default config.", path.display())
            }
            ConfigSource::Unreadable { path, error } => {
                tracing::warn!("Failed to read {}: {}. Using defaults.", path.display(), error)
            }
            ConfigSource::Invalid { path, error } => {
                tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), error)
            }
        }
    }
}

/// Loads configuration from `path` (or `config.json` in the base directory).
/// Falls back to defaults when the file is missing or invalid.
pub fn load_config(path: Option<&Path>) -> (AppConfig, ConfigSource) {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths::get_base_dir().join("config.json"));

    if !config_path.exists() {
        return (AppConfig::default(), ConfigSource::Missing(config_path));
    }

    match fs::read_to_string(&config_path) {
        Ok(contents) => match parse_config(&contents) {
            Ok(config) => (config, ConfigSource::File(config_path)),
            Err(e) => (
                AppConfig::default(),
                ConfigSource::Invalid {
                    path: config_path,
                    error: e.to_string(),
                },
            ),
        },
        Err(e) => (
            AppConfig::default(),
            ConfigSource::Unreadable {
                path: config_path,
                error: e.to_string(),
            },
        ),
    }
}

fn parse_config(contents: &str) -> serde_json::Result<AppConfig> {
    serde_json::from_str(contents)
}
