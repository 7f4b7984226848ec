//! Collection of new screenshots from the synced source folder into the inbox.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::paths::has_extension;

/// A year followed by a colon, as in shortcut-generated names like `2025:08:15, 22:23.png`.
static YEAR_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:19|20)[0-9]{2}:").expect("year pattern must compile"));

/// Outcome of one collection pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectSummary {
    pub found: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Returns true for names that look like gym screenshots.
pub fn is_candidate(name: &str, extensions: &[String]) -> bool {
    has_extension(name, extensions)
        && (name.contains("FP24") || YEAR_COLON.is_match(name) || name.to_lowercase().contains("fit"))
}

/// Copies candidate screenshots from `source_dir` into `inbox_dir`.
///
/// Files already present in the inbox (by name) are left alone, so repeated
/// runs never duplicate entries. A missing source directory is not an error.
pub fn collect_from_source(
    source_dir: &Path,
    inbox_dir: &Path,
    extensions: &[String],
) -> Result<CollectSummary> {
    let mut summary = CollectSummary::default();

    if !source_dir.exists() {
        tracing::warn!("Source folder not found: {}", source_dir.display());
        return Ok(summary);
    }

    let mut candidates: Vec<String> = fs::read_dir(source_dir)
        .with_context(|| format!("Failed to list {}", source_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_candidate(name, extensions))
        .collect();
    candidates.sort();

    summary.found = candidates.len();
    if candidates.is_empty() {
        tracing::info!("No new gym screenshots in {}", source_dir.display());
        return Ok(summary);
    }
    tracing::info!("Found {} gym screenshots in source folder", candidates.len());

    fs::create_dir_all(inbox_dir)
        .with_context(|| format!("Failed to create {}", inbox_dir.display()))?;

    for name in candidates {
        let source = source_dir.join(&name);
        let dest = inbox_dir.join(&name);

        if dest.exists() {
            tracing::debug!("   Skipping (exists): {}", name);
            summary.skipped += 1;
            continue;
        }

        match copy_preserving_mtime(&source, &dest) {
            Ok(()) => {
                tracing::info!("   Copied: {}", name);
                summary.copied += 1;
            }
            Err(e) => {
                tracing::warn!("   Copy failed [{}]: {:#}", name, e);
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        "Collection complete: {} copied, {} already in inbox, {} failed",
        summary.copied,
        summary.skipped,
        summary.failed
    );
    Ok(summary)
}

fn copy_preserving_mtime(source: &Path, dest: &Path) -> Result<()> {
    fs::copy(source, dest).with_context(|| format!("Failed to copy {}", source.display()))?;
    let modified = fs::metadata(source).and_then(|m| m.modified());
    if let Ok(modified) = modified {
        let file = fs::File::options().write(true).open(dest)?;
        file.set_modified(modified)?;
    }
    Ok(())
}
