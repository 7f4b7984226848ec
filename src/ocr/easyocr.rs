//! Neural multilingual reader, driven through the `easyocr` command-line tool
//! on the CPU.
//!
//! With `--detail 1` the tool prints one Python tuple per detected fragment:
//!
//! ```text
//! ([[12, 40], [98, 40], [98, 71], [12, 71]], '12人', 0.9731)
//! ```

use image::GrayImage;
use regex::Regex;
use std::path::PathBuf;
use std::process::Command;
use std::sync::LazyLock;
use tempfile::NamedTempFile;

use super::engine::{OcrError, TextRecognizer};
use crate::config::OcrConfig;
use crate::paths;

const ENGINE_NAME: &str = "EasyOCR";

static FRAGMENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\(\[.*\],\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)"),\s*(?:np\.float\d*\()?([0-9.eE+\-]+)\)?\)\s*$"#,
    )
    .expect("fragment pattern must compile")
});

/// One detected text fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrFragment {
    pub text: String,
    pub confidence: f32,
}

pub struct EasyOcrEngine {
    executable: PathBuf,
    languages: Vec<String>,
    min_confidence: f32,
}

impl EasyOcrEngine {
    /// Checks that the reader can be started. Model loading happens per call.
    pub fn discover(config: &OcrConfig) -> Result<Self, OcrError> {
        let executable = paths::expand_home(&config.easyocr_executable);
        if !probe_help(&executable) {
            return Err(OcrError::unavailable(
                ENGINE_NAME,
                format!("'{}' does not run", executable.display()),
            ));
        }

        Ok(Self {
            executable,
            languages: config.easyocr_languages.clone(),
            min_confidence: config.min_confidence,
        })
    }

    fn command_args(&self, input: &str) -> Vec<String> {
        let mut args = vec!["-l".to_string()];
        args.extend(self.languages.iter().cloned());
        // `--gpu` goes through Python's `bool()`, where only the empty
        // string is false; "False" would enable the GPU.
        args.extend(
            ["-f", input, "--detail", "1", "--gpu", ""]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }
}

/// The easyocr CLI has no `--version`; `--help` is the cheapest probe.
fn probe_help(program: &std::path::Path) -> bool {
    Command::new(program)
        .arg("--help")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parses `--detail 1` output, skipping lines that are not fragment tuples.
pub fn parse_fragments(output: &str) -> Vec<OcrFragment> {
    output
        .lines()
        .filter_map(|line| {
            let caps = FRAGMENT_LINE.captures(line.trim())?;
            let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
            let confidence: f32 = caps[3].parse().ok()?;
            Some(OcrFragment {
                text: unescape(raw),
                confidence,
            })
        })
        .collect()
}

/// Joins fragments above the confidence threshold with single spaces.
pub fn join_confident(fragments: &[OcrFragment], min_confidence: f32) -> String {
    fragments
        .iter()
        .filter(|f| f.confidence > min_confidence)
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

impl TextRecognizer for EasyOcrEngine {
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

        let fragments = parse_fragments(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!("EasyOCR returned {} fragments", fragments.len());
        Ok(join_confident(&fragments, self.min_confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
([[12, 40], [98, 40], [98, 71], [12, 71]], '12人', 0.9731)
([[110, 40], [300, 40], [300, 71], [110, 71]], '空いています', 0.88)
([[5, 5], [20, 5], [20, 12], [5, 12]], 'ノイズ', 0.21)
Using CPU. Note: This module is much faster with a GPU.
([[0, 80], [60, 80], [60, 99], [0, 99]], \"22:23\", np.float64(0.7012))
";

    #[test]
    fn test_parse_fragments() {
        let fragments = parse_fragments(SAMPLE);
        assert_eq!(fragments.len(), 4);
        assert_eq!(fragments[0].text, "12人");
        assert!((fragments[0].confidence - 0.9731).abs() < 1e-4);
        assert_eq!(fragments[3].text, "22:23");
        assert!((fragments[3].confidence - 0.7012).abs() < 1e-4);
    }

    #[test]
    fn test_join_confident_drops_low_confidence() {
        let fragments = parse_fragments(SAMPLE);
        assert_eq!(join_confident(&fragments, 0.5), "12人 空いています 22:23");
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let fragments = vec![OcrFragment { text: "x".to_string(), confidence: 0.5 }];
        assert_eq!(join_confident(&fragments, 0.5), "");
    }

    #[test]
    fn test_escaped_quote_in_text() {
        let fragments = parse_fragments(r"([[0, 0], [1, 0], [1, 1], [0, 1]], 'it\'s', 0.9)");
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "it's");
    }

    #[test]
    fn test_command_args() {
        let engine = EasyOcrEngine {
            executable: PathBuf::from("easyocr"),
            languages: vec!["ja".to_string(), "en".to_string()],
            min_confidence: 0.5,
        };
        assert_eq!(
            engine.command_args("img.png"),
            vec!["-l", "ja", "en", "-f", "img.png", "--detail", "1", "--gpu", ""]
        );
    }
}
