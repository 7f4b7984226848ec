//! JSON export of extraction results.

use super::record::OutputDocument;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Writes the results document, replacing any previous file.
///
/// Pretty-printed, with Japanese text kept as UTF-8 rather than escaped.
pub fn write_output(doc: &OutputDocument, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(doc).context("Failed to serialize results to JSON")?;

    let mut file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON file: {}", output_path.display()))?;

    file.write_all(json.as_bytes())
        .context("Failed to write JSON data")?;

    Ok(())
}

/// Reads a results document written by [`write_output`].
pub fn read_output(path: &Path) -> Result<OutputDocument> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid results file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::record::ExtractedRecord;
    use tempfile::tempdir;

    fn record(filename: &str) -> ExtractedRecord {
        ExtractedRecord {
            filename: filename.to_string(),
            timestamp: "2025-08-15T22:30:00.000000".to_string(),
            count: 12,
            status: "やや空いています（~20人）".to_string(),
            status_code: 4,
            status_min: 11,
            status_max: 20,
            hour: 22,
            time: "22:23".to_string(),
            date: "2025-08-15".to_string(),
            raw_text: "12人 やや空い".to_string(),
        }
    }

    #[test]
    fn test_write_output_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scripts").join("extracted-data.json");

        write_output(&OutputDocument::new("first".to_string(), vec![record("a.png"), record("b.png")]), &path)
            .unwrap();
        write_output(&OutputDocument::new("second".to_string(), vec![record("c.png")]), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"processedAt\": \"second\""));
        assert!(content.contains("\"totalCount\": 1"));
        assert!(content.contains("やや空いています"));
        assert!(!content.contains("a.png"));

        let doc = read_output(&path).unwrap();
        assert_eq!(doc.data, vec![record("c.png")]);
    }
}
