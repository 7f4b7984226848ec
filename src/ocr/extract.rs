use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// Count patterns, tried in order. Full-width digits are accepted since the
/// Japanese readers often emit them.
const COUNT_PATTERNS: &[&str] = &[
    r"([0-9０-９]{1,2})人",
    r"([0-9０-９]{1,2})\s*人",
    r"利用者数\s*([0-9０-９]{1,2})",
    r"現在\s*([0-9０-９]{1,2})",
];

/// Time-of-day patterns, tried in order.
const TIME_PATTERNS: &[&str] = &[
    r"([0-9０-９]{1,2}):([0-9０-９]{2})",
    r"([0-9０-９]{1,2})\.([0-9０-９]{2})",
    r"([0-9０-９]{1,2})時([0-9０-９]{2})分",
];

/// Filename date conventions: `FP24_20250815_222321.png`, then `2025:08:15, 22:23.png`.
const FILENAME_DATE_PATTERNS: &[&str] = &[
    r"([0-9]{4})([0-9]{2})([0-9]{2})",
    r"([0-9]{4})[:\-]([0-9]{2})[:\-]([0-9]{2})",
];

/// Filename time conventions, same order as the date ones.
const FILENAME_TIME_PATTERNS: &[&str] = &[r"_([0-9]{2})([0-9]{2})([0-9]{2})\.", r"([0-9]{2}):([0-9]{2})\."];

/// One congestion level of the gym's status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLevel {
    pub phrase: &'static str,
    pub code: u8,
    pub min: u32,
    pub max: u32,
}

/// Status phrases in match order. The first phrase found as a substring wins,
/// so "空いています" shadows "やや空いています".
pub const STATUS_TABLE: &[StatusLevel] = &[
    StatusLevel { phrase: "空いています", code: 5, min: 0, max: 10 },
    StatusLevel { phrase: "やや空いています", code: 4, min: 11, max: 20 },
    StatusLevel { phrase: "やや混んでいます", code: 3, min: 21, max: 30 },
    StatusLevel { phrase: "混んでいます", code: 2, min: 31, max: 40 },
    StatusLevel { phrase: "空い", code: 5, min: 0, max: 10 },
    StatusLevel { phrase: "やや空い", code: 4, min: 11, max: 20 },
    StatusLevel { phrase: "やや混ん", code: 3, min: 21, max: 30 },
    StatusLevel { phrase: "混ん", code: 2, min: 31, max: 40 },
];

static COUNT_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(COUNT_PATTERNS));
static TIME_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(TIME_PATTERNS));
static FILENAME_DATE_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(FILENAME_DATE_PATTERNS));
static FILENAME_TIME_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(FILENAME_TIME_PATTERNS));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("built-in pattern must compile"))
        .collect()
}

/// A matched status with its rendered label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMatch {
    pub label: String,
    pub level: StatusLevel,
}

/// Where a clock reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    OcrText,
    Filename,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    pub hour: u32,
    pub minute: u32,
    pub source: ClockSource,
}

impl ClockReading {
    pub const NOON: ClockReading = ClockReading {
        hour: 12,
        minute: 0,
        source: ClockSource::Default,
    };

    /// `HH:MM`, zero-padded.
    pub fn formatted(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// Everything recovered from one image's OCR text and filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub count: Option<u32>,
    pub status: Option<StatusMatch>,
    pub clock: Option<ClockReading>,
    pub date: String,
}

impl ExtractedFields {
    /// Names of the required fields that could not be recovered.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.count.is_none() {
            missing.push("count");
        }
        if self.status.is_none() {
            missing.push("status");
        }
        if self.clock.is_none() {
            missing.push("hour");
        }
        missing
    }
}

/// Parses ASCII or full-width digits.
fn parse_digits(s: &str) -> Option<u32> {
    let normalized: String = s
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            _ => c,
        })
        .collect();
    normalized.parse().ok()
}

/// Returns the first occupancy count matched by the ordered count patterns.
pub fn extract_count(text: &str) -> Option<u32> {
    COUNT_REGEXES
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| parse_digits(&caps[1]))
}

/// Returns the first status phrase (in table order) contained in the text.
pub fn extract_status(text: &str) -> Option<StatusMatch> {
    STATUS_TABLE
        .iter()
        .find(|level| text.contains(level.phrase))
        .map(|level| StatusMatch {
            label: format!("{}（~{}人）", level.phrase, level.max),
            level: *level,
        })
}

/// Returns the first time of day matched by the ordered time patterns.
pub fn extract_time(text: &str) -> Option<ClockReading> {
    let caps = TIME_REGEXES.iter().find_map(|re| re.captures(text))?;
    Some(ClockReading {
        hour: parse_digits(&caps[1])?,
        minute: parse_digits(&caps[2])?,
        source: ClockSource::OcrText,
    })
}

/// Date from filename digit groups as `YYYY-MM-DD`, if a convention matches.
pub fn date_from_filename(filename: &str) -> Option<String> {
    FILENAME_DATE_REGEXES
        .iter()
        .find_map(|re| re.captures(filename))
        .map(|caps| format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]))
}

/// Time from filename digit groups, if a convention matches.
pub fn time_from_filename(filename: &str) -> Option<ClockReading> {
    let caps = FILENAME_TIME_REGEXES.iter().find_map(|re| re.captures(filename))?;
    Some(ClockReading {
        hour: caps[1].parse().ok()?,
        minute: caps[2].parse().ok()?,
        source: ClockSource::Filename,
    })
}

/// Extracts all record fields.
///
/// Time prefers the OCR text, then the filename, then noon. Date only ever
/// comes from the filename, falling back to `today`.
pub fn extract_fields(text: &str, filename: &str, today: NaiveDate) -> ExtractedFields {
    let clock = extract_time(text)
        .or_else(|| time_from_filename(filename))
        .unwrap_or(ClockReading::NOON);

    ExtractedFields {
        count: extract_count(text),
        status: extract_status(text),
        clock: Some(clock),
        date: date_from_filename(filename).unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
    }
}
