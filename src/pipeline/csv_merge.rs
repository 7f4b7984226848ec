//! Merges extraction results into the long-running history CSV.
//!
//! Columns: datetime, date, time, hour, weekday, count, status_label,
//! status_code, status_min, status_max, raw_text

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;

use super::export::read_output;
use super::record::ExtractedRecord;

/// One row of the history CSV. Numeric columns stay textual so rows written
/// by other tools survive a round trip untouched. Missing trailing columns
/// read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryRow {
    pub datetime: String,
    pub date: String,
    pub time: String,
    pub hour: String,
    pub weekday: String,
    pub count: String,
    pub status_label: String,
    pub status_code: String,
    pub status_min: String,
    pub status_max: String,
    pub raw_text: String,
}

impl HistoryRow {
    pub fn from_record(record: &ExtractedRecord) -> Self {
        let weekday = NaiveDate::parse_from_str(&record.date, "%Y-%m-%d")
            .map(|d| d.format("%A").to_string())
            .unwrap_or_default();

        Self {
            datetime: format!("{} {}:00", record.date, record.time),
            date: record.date.clone(),
            time: record.time.clone(),
            hour: record.hour.to_string(),
            weekday,
            count: record.count.to_string(),
            status_label: record.status.clone(),
            status_code: record.status_code.to_string(),
            status_min: record.status_min.to_string(),
            status_max: record.status_max.to_string(),
            raw_text: record.raw_text.clone(),
        }
    }

    fn dedup_key(&self) -> String {
        format!("{}_{}", self.datetime, self.count)
    }

    fn sort_key(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.datetime, "%Y-%m-%d %H:%M:%S").ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub existing: usize,
    pub incoming: usize,
    pub added: usize,
    pub total: usize,
}

/// Reads the history CSV; a missing file is an empty history.
///
/// Short rows are padded with empty columns. Any row that still cannot be
/// read fails the whole read, so the file is never rewritten without it.
pub fn read_history(path: &Path) -> Result<Vec<HistoryRow>> {
    if !path.exists() {
        tracing::info!("History CSV not found, a new one will be created: {}", path.display());
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let mut rows = Vec::new();
    for (line_num, result) in reader.deserialize::<HistoryRow>().enumerate() {
        let row = result.with_context(|| {
            format!("Malformed row {} in {}", line_num + 2, path.display())
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Combines existing and new rows: first occurrence of each
/// `datetime + count` wins, then rows are ordered by datetime.
pub fn merge_rows(existing: Vec<HistoryRow>, incoming: Vec<HistoryRow>) -> Vec<HistoryRow> {
    let mut seen = HashSet::new();
    let mut merged: Vec<HistoryRow> = existing
        .into_iter()
        .chain(incoming)
        .filter(|row| seen.insert(row.dedup_key()))
        .collect();
    // Stable sort: unparseable datetimes keep their relative order at the front.
    merged.sort_by_key(HistoryRow::sort_key);
    merged
}

pub fn write_history(path: &Path, rows: &[HistoryRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row).context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush CSV")?;
    Ok(())
}

/// Merges the results JSON at `results_path` into the CSV at `csv_path`.
///
/// Returns `None` when there is nothing to merge.
pub fn merge_into_history(results_path: &Path, csv_path: &Path) -> Result<Option<MergeSummary>> {
    if !results_path.exists() {
        tracing::info!("No results file found: {}", results_path.display());
        return Ok(None);
    }

    let doc = read_output(results_path)?;
    if doc.data.is_empty() {
        tracing::info!("No new records to merge");
        return Ok(None);
    }

    let existing = read_history(csv_path)?;
    let incoming: Vec<HistoryRow> = doc.data.iter().map(HistoryRow::from_record).collect();
    let existing_count = existing.len();
    let incoming_count = incoming.len();

    let merged = merge_rows(existing, incoming);
    write_history(csv_path, &merged)?;

    let summary = MergeSummary {
        existing: existing_count,
        incoming: incoming_count,
        added: merged.len().saturating_sub(existing_count),
        total: merged.len(),
    };
    tracing::info!(
        "History CSV updated: {} ({} existing + {} incoming -> {} rows, {} new)",
        csv_path.display(),
        summary.existing,
        summary.incoming,
        summary.total,
        summary.added
    );
    Ok(Some(summary))
}
