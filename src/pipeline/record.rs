use serde::{Deserialize, Serialize};

use crate::ocr::ExtractedFields;

/// One successfully parsed screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    pub filename: String,
    pub timestamp: String,
    pub count: u32,
    pub status: String,
    pub status_code: u8,
    pub status_min: u32,
    pub status_max: u32,
    pub hour: u32,
    pub time: String,
    pub date: String,
    pub raw_text: String,
}

impl ExtractedRecord {
    /// Builds a record, or returns the names of the missing required fields.
    pub fn from_fields(
        filename: &str,
        timestamp: String,
        fields: ExtractedFields,
        raw_text: &str,
    ) -> Result<Self, Vec<&'static str>> {
        let missing = fields.missing_fields();
        let (Some(count), Some(status), Some(clock)) = (fields.count, fields.status, fields.clock)
        else {
            return Err(missing);
        };

        Ok(Self {
            filename: filename.to_string(),
            timestamp,
            count,
            status: status.label,
            status_code: status.level.code,
            status_min: status.level.min,
            status_max: status.level.max,
            hour: clock.hour,
            time: clock.formatted(),
            date: fields.date,
            raw_text: raw_text.to_string(),
        })
    }

    /// True if the count lies inside the status's occupancy range.
    pub fn is_consistent(&self) -> bool {
        self.count >= self.status_min && self.count <= self.status_max
    }
}

/// The results file: run metadata plus every record, in processing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDocument {
    pub processed_at: String,
    pub total_count: usize,
    pub data: Vec<ExtractedRecord>,
}

impl OutputDocument {
    pub fn new(processed_at: String, data: Vec<ExtractedRecord>) -> Self {
        Self {
            processed_at,
            total_count: data.len(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::extract_fields;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 20).unwrap()
    }

    #[test]
    fn test_record_from_complete_fields() {
        let text = "現在 12人 やや空いています";
        let fields = extract_fields(text, "FP24_20250815_222321.png", today());
        let record = ExtractedRecord::from_fields(
            "FP24_20250815_222321.png",
            "2025-08-20T10:00:00".to_string(),
            fields,
            text,
        )
        .unwrap();

        assert_eq!(record.count, 12);
        assert_eq!(record.status_code, 5);
        assert_eq!(record.hour, 22);
        assert_eq!(record.time, "22:23");
        assert_eq!(record.date, "2025-08-15");
        assert!(!record.is_consistent());
    }

    #[test]
    fn test_record_dropped_without_count() {
        let text = "空いています 21:30";
        let fields = extract_fields(text, "a.png", today());
        let missing = ExtractedRecord::from_fields("a.png", String::new(), fields, text).unwrap_err();
        assert_eq!(missing, vec!["count"]);
    }

    #[test]
    fn test_json_field_names() {
        let text = "8人 空いています";
        let fields = extract_fields(text, "a.png", today());
        let record =
            ExtractedRecord::from_fields("a.png", "t".to_string(), fields, text).unwrap();
        let doc = OutputDocument::new("now".to_string(), vec![record]);
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["totalCount"], 1);
        assert_eq!(json["processedAt"], "now");
        let item = &json["data"][0];
        for key in [
            "filename", "timestamp", "count", "status", "statusCode", "statusMin", "statusMax",
            "hour", "time", "date", "rawText",
        ] {
            assert!(item.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(item["time"], "12:00");
        assert_eq!(item["status"], "空いています（~10人）");
    }
}
