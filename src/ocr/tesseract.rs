use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::engine::{OcrError, TextRecognizer};
use super::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::config::OcrConfig;

const ENGINE_NAME: &str = "Tesseract";

/// Traditional OCR fallback, run as a subprocess.
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    languages: String,
    psm: u8,
    oem: u8,
}

impl TesseractEngine {
    /// Locates the executable and language data. Fails if Tesseract cannot run.
    pub fn discover(config: &OcrConfig) -> Result<Self, OcrError> {
        let executable = find_tesseract_executable(config)
            .map_err(|e| OcrError::unavailable(ENGINE_NAME, e))?;
        let tessdata = find_tessdata_dir(config);
        if tessdata.is_none() {
            tracing::warn!(
                "No tessdata directory with all of '{}' found; using Tesseract's default",
                config.tesseract_languages
            );
        }

        Ok(Self {
            executable,
            tessdata,
            languages: config.tesseract_languages.clone(),
            psm: config.tesseract_psm,
            oem: config.tesseract_oem,
        })
    }

    fn command_args(&self, input: &str) -> Vec<String> {
        let mut args = vec![
            input.to_string(),
            "stdout".to_string(),
            "--oem".to_string(),
            self.oem.to_string(),
            "--psm".to_string(),
            self.psm.to_string(),
            "-l".to_string(),
            self.languages.clone(),
        ];
        if let Some(dir) = &self.tessdata {
            args.push("--tessdata-dir".to_string());
            args.push(dir.to_string_lossy().to_string());
        }
        args
    }
}

impl TextRecognizer for TesseractEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
        let temp_input =
            NamedTempFile::with_suffix(".png").map_err(|e| OcrError::failed(ENGINE_NAME, e))?;
        image
            .save(temp_input.path())
            .map_err(|e| OcrError::failed(ENGINE_NAME, e))?;

        let input = temp_input.path().to_string_lossy().to_string();
        let output = Command::new(&self.executable)
            .args(self.command_args(&input))
            .output()
            .map_err(|e| OcrError::failed(ENGINE_NAME, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::failed(ENGINE_NAME, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args() {
        let engine = TesseractEngine {
            executable: PathBuf::from("tesseract"),
            tessdata: Some(PathBuf::from("/data/tessdata")),
            languages: "jpn+eng".to_string(),
            psm: 6,
            oem: 3,
        };
        assert_eq!(
            engine.command_args("in.png"),
            vec![
                "in.png", "stdout", "--oem", "3", "--psm", "6", "-l", "jpn+eng",
                "--tessdata-dir", "/data/tessdata"
            ]
        );
    }

    #[test]
    fn test_missing_executable_is_unavailable() {
        let config = OcrConfig {
            tesseract_executable: Some("/nonexistent/tesseract".to_string()),
            ..OcrConfig::default()
        };
        assert!(matches!(
            TesseractEngine::discover(&config),
            Err(OcrError::Unavailable { .. })
        ));
    }
}
