pub mod easyocr;
pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;
pub mod tesseract;

pub use engine::{OcrChain, OcrError, TextRecognizer};
pub use extract::{extract_fields, ExtractedFields};
pub use preprocess::preprocess;
pub use setup::ensure_tesseract;

use crate::config::OcrConfig;
use easyocr::EasyOcrEngine;
use tesseract::TesseractEngine;

/// Builds the engine chain: neural reader first, Tesseract second.
///
/// Engines that cannot start are logged and left out; an empty chain means
/// OCR is misconfigured, which the caller reports as a run-level error.
pub fn build_chain(config: &OcrConfig) -> OcrChain {
    let mut engines: Vec<Box<dyn TextRecognizer>> = Vec::new();

    if config.easyocr_enabled {
        match EasyOcrEngine::discover(config) {
            Ok(engine) => {
                tracing::info!("EasyOCR initialized ({})", config.easyocr_languages.join(" + "));
                engines.push(Box::new(engine));
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    if config.tesseract_enabled {
        match TesseractEngine::discover(config) {
            Ok(engine) => {
                tracing::info!("Tesseract available ({})", config.tesseract_languages);
                engines.push(Box::new(engine));
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    OcrChain::new(engines)
}
