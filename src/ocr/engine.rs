use image::GrayImage;
use thiserror::Error;

/// Why an OCR attempt produced no text.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine cannot run at all (missing executable, failed probe).
    #[error("{engine} unavailable: {reason}")]
    Unavailable { engine: String, reason: String },
    /// The engine ran but failed on this image.
    #[error("{engine} failed: {reason}")]
    Failed { engine: String, reason: String },
    /// The engine ran but nothing usable came back.
    #[error("{engine} returned no usable text")]
    NoText { engine: String },
}

impl OcrError {
    pub fn failed(engine: &str, reason: impl ToString) -> Self {
        OcrError::Failed {
            engine: engine.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn unavailable(engine: &str, reason: impl ToString) -> Self {
        OcrError::Unavailable {
            engine: engine.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// An OCR backend. Receives the already-preprocessed grayscale image.
pub trait TextRecognizer {
    fn name(&self) -> &str;
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError>;
}

/// Text read from one image and the engine that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedText {
    pub engine: String,
    pub text: String,
}

/// Ordered list of engines: the first one returning non-empty text wins.
#[derive(Default)]
pub struct OcrChain {
    engines: Vec<Box<dyn TextRecognizer>>,
}

impl OcrChain {
    pub fn new(engines: Vec<Box<dyn TextRecognizer>>) -> Self {
        Self { engines }
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn engine_names(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Runs the engines in order until one yields text.
    ///
    /// On total failure returns the last engine's error.
    pub fn read_text(&self, image: &GrayImage) -> Result<RecognizedText, OcrError> {
        let mut last_error = OcrError::NoText {
            engine: "none".to_string(),
        };

        for engine in &self.engines {
            tracing::info!("   Running {}...", engine.name());
            match engine.recognize(image) {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::info!("   {} succeeded", engine.name());
                    return Ok(RecognizedText {
                        engine: engine.name().to_string(),
                        text,
                    });
                }
                Ok(_) => {
                    tracing::debug!("   {} returned empty text", engine.name());
                    last_error = OcrError::NoText {
                        engine: engine.name().to_string(),
                    };
                }
                Err(e) => {
                    tracing::warn!("   {}", e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Returns a fixed response regardless of the image.
    pub struct FixedRecognizer {
        pub name: &'static str,
        pub response: Result<&'static str, &'static str>,
    }

    impl TextRecognizer for FixedRecognizer {
        fn name(&self) -> &str {
            self.name
        }

        fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
            match self.response {
                Ok(text) => Ok(text.to_string()),
                Err(reason) => Err(OcrError::failed(self.name, reason)),
            }
        }
    }

    fn blank() -> GrayImage {
        GrayImage::new(4, 4)
    }

    #[test]
    fn test_primary_engine_wins() {
        let chain = OcrChain::new(vec![
            Box::new(FixedRecognizer { name: "easyocr", response: Ok("12人") }),
            Box::new(FixedRecognizer { name: "tesseract", response: Ok("99人") }),
        ]);
        let result = chain.read_text(&blank()).unwrap();
        assert_eq!(result.engine, "easyocr");
        assert_eq!(result.text, "12人");
    }

    #[test]
    fn test_falls_back_on_empty_text() {
        let chain = OcrChain::new(vec![
            Box::new(FixedRecognizer { name: "easyocr", response: Ok("  ") }),
            Box::new(FixedRecognizer { name: "tesseract", response: Ok("8人") }),
        ]);
        let result = chain.read_text(&blank()).unwrap();
        assert_eq!(result.engine, "tesseract");
    }

    #[test]
    fn test_falls_back_on_error() {
        let chain = OcrChain::new(vec![
            Box::new(FixedRecognizer { name: "easyocr", response: Err("crashed") }),
            Box::new(FixedRecognizer { name: "tesseract", response: Ok("8人") }),
        ]);
        assert_eq!(chain.read_text(&blank()).unwrap().text, "8人");
    }

    #[test]
    fn test_all_engines_fail() {
        let chain = OcrChain::new(vec![
            Box::new(FixedRecognizer { name: "easyocr", response: Ok("") }),
            Box::new(FixedRecognizer { name: "tesseract", response: Err("bad image") }),
        ]);
        let err = chain.read_text(&blank()).unwrap_err();
        assert!(matches!(err, OcrError::Failed { ref engine, .. } if engine == "tesseract"));
    }

    #[test]
    fn test_empty_chain() {
        let chain = OcrChain::default();
        assert!(chain.is_empty());
        assert!(matches!(chain.read_text(&blank()), Err(OcrError::NoText { .. })));
    }
}
