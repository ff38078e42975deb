//! Core types for CGM feature preparation
//!
//! This module defines the records read from the store and flat files, the
//! query interval they are fetched over, and the feature table produced by
//! the assembly pipeline.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Storage format for timestamps, fixed width with microseconds so lexical
/// order matches time order.
pub const STORE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Whole-second format used when rendering feature tables
pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column order of every feature table
pub const FEATURE_COLUMNS: [&str; 6] = [
    "glucose_level",
    "meal_flag_hiGI",
    "activity_intensity",
    "sleep_quality",
    "hour_sin",
    "hour_cos",
];

/// Parse a timestamp as written by the store, the CSV exports or RFC 3339.
///
/// Naive timestamps are interpreted as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DataError> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(DataError::DateParse(format!("unrecognised timestamp '{trimmed}'")))
}

/// Format a timestamp for storage. Sub-microsecond digits are truncated.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(STORE_TIMESTAMP_FORMAT).to_string()
}

/// The record streams served by a time-series store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Glucose,
    Meal,
    Activity,
    Sleep,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Glucose => "glucose",
            RecordKind::Meal => "meal",
            RecordKind::Activity => "activity",
            RecordKind::Sleep => "sleep",
        }
    }
}

/// Closed time interval `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Interval covering `minutes` before `end`
    pub fn lookback(end: DateTime<Utc>, minutes: i64) -> Self {
        Self {
            start: end - Duration::minutes(minutes),
            end,
        }
    }

    /// Move the start earlier by `by`, keeping the end
    pub fn widen_start(&self, by: Duration) -> Self {
        Self {
            start: self.start - by,
            end: self.end,
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// A single CGM reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseReading {
    pub timestamp: DateTime<Utc>,
    /// Glucose level (mg/dL)
    pub glucose_level: f64,
}

/// A logged meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealEvent {
    pub timestamp: DateTime<Utc>,
    /// Free-text description of what was eaten
    pub food_items: String,
    /// Glucose at meal time (mg/dL), present in historical exports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_glucose: Option<f64>,
    /// Glucose 60 minutes after the meal (mg/dL)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glucose_at_t60: Option<f64>,
}

impl MealEvent {
    pub fn new(timestamp: DateTime<Utc>, food_items: impl Into<String>) -> Self {
        Self {
            timestamp,
            food_items: food_items.into(),
            baseline_glucose: None,
            glucose_at_t60: None,
        }
    }
}

/// Activity intensity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

impl Intensity {
    /// Parse a stored intensity label (case-insensitive)
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "low" => Some(Intensity::Low),
            "medium" => Some(Intensity::Medium),
            "high" => Some(Intensity::High),
            _ => None,
        }
    }

    /// Ordinal feature value
    pub fn ordinal(&self) -> f64 {
        match self {
            Intensity::Low => 0.0,
            Intensity::Medium => 1.0,
            Intensity::High => 2.0,
        }
    }
}

/// A logged activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub timestamp_start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    pub duration_minutes: f64,
    /// Raw intensity label as stored
    pub intensity: String,
}

impl ActivityLog {
    /// Duration as a time delta, `None` when negative, non-finite or out of range
    pub fn duration(&self) -> Option<Duration> {
        minutes_to_duration(self.duration_minutes)
    }

    /// End of the activity interval, `None` when the duration is unusable
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.timestamp_start.checked_add_signed(self.duration()?)
    }
}

/// Longest duration accepted for an activity or sleep record
pub const MAX_RECORD_DURATION_DAYS: i64 = 7;

/// Convert fractional minutes to a delta within `[0, MAX_RECORD_DURATION_DAYS]`
pub fn minutes_to_duration(minutes: f64) -> Option<Duration> {
    let max_minutes = (MAX_RECORD_DURATION_DAYS * 24 * 60) as f64;
    if !minutes.is_finite() || !(0.0..=max_minutes).contains(&minutes) {
        return None;
    }
    Duration::try_milliseconds((minutes * 60_000.0).round() as i64)
}

/// Sleep quality label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepQuality {
    Good,
    Poor,
}

impl SleepQuality {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "good" => Some(SleepQuality::Good),
            "poor" => Some(SleepQuality::Poor),
            _ => None,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            SleepQuality::Good => 0.0,
            SleepQuality::Poor => 1.0,
        }
    }
}

/// A logged sleep period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepLog {
    pub sleep_start: DateTime<Utc>,
    pub sleep_end: DateTime<Utc>,
    /// Raw quality label as stored
    pub sleep_quality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
}

/// Records returned by a generic store fetch
#[derive(Debug, Clone, PartialEq)]
pub enum Records {
    Glucose(Vec<GlucoseReading>),
    Meal(Vec<MealEvent>),
    Activity(Vec<ActivityLog>),
    Sleep(Vec<SleepLog>),
}

impl Records {
    pub fn kind(&self) -> RecordKind {
        match self {
            Records::Glucose(_) => RecordKind::Glucose,
            Records::Meal(_) => RecordKind::Meal,
            Records::Activity(_) => RecordKind::Activity,
            Records::Sleep(_) => RecordKind::Sleep,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Records::Glucose(r) => r.len(),
            Records::Meal(r) => r.len(),
            Records::Activity(r) => r.len(),
            Records::Sleep(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One row of the prediction feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub glucose_level: f64,
    #[serde(rename = "meal_flag_hiGI")]
    pub meal_flag_hi_gi: f64,
    pub activity_intensity: f64,
    pub sleep_quality: f64,
    pub hour_sin: f64,
    pub hour_cos: f64,
}

impl FeatureRow {
    /// Feature values in [`FEATURE_COLUMNS`] order
    pub fn values(&self) -> [f64; 6] {
        [
            self.glucose_level,
            self.meal_flag_hi_gi,
            self.activity_intensity,
            self.sleep_quality,
            self.hour_sin,
            self.hour_cos,
        ]
    }
}

/// Data quality flags raised while assembling a feature table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// A source could not be read and was treated as empty
    SourceUnavailable(RecordKind),
    /// No sleep record ended inside the lookback
    MissingSleepData,
    /// Sleep record carried a label outside {good, poor}
    UnknownSleepQuality,
    /// Activity records carried labels outside {low, medium, high}
    UnknownActivityIntensity,
    /// Activity records with a negative, non-finite or oversized duration
    InvalidActivityDuration,
    /// Values still missing after forward/backward fill were set to 0
    ZeroFilled { column: String, count: usize },
}

/// Regularly sampled, gap-free feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub end_time: DateTime<Utc>,
    pub window_minutes: u32,
    pub rows: Vec<FeatureRow>,
    pub quality_flags: Vec<QualityFlag>,
}

impl FeatureTable {
    /// Table with no rows, used when the window holds no glucose data
    pub fn empty(end_time: DateTime<Utc>, window_minutes: u32) -> Self {
        Self {
            end_time,
            window_minutes,
            rows: Vec::new(),
            quality_flags: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &FEATURE_COLUMNS
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.rows.iter().map(|r| r.timestamp).collect()
    }

    /// Feature matrix in row-major order, ready for a model
    pub fn to_matrix(&self) -> Vec<[f64; 6]> {
        self.rows.iter().map(FeatureRow::values).collect()
    }

    /// Render as CSV with a leading timestamp column
    pub fn to_csv(&self) -> String {
        let mut out = String::from("timestamp,");
        out.push_str(&FEATURE_COLUMNS.join(","));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.timestamp.format(DISPLAY_TIMESTAMP_FORMAT).to_string());
            for value in row.values() {
                out.push(',');
                out.push_str(&value.to_string());
            }
            out.push('\n');
        }
        out
    }
}

/// Result of a feature-assembly request, distinguishing an empty window
/// from a store that could not be read.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureOutcome {
    Ready(FeatureTable),
    NoData,
    Unavailable(String),
}

impl FeatureOutcome {
    /// Collapse into a table, empty unless `Ready`
    pub fn into_table(self, end_time: DateTime<Utc>, window_minutes: u32) -> FeatureTable {
        match self {
            FeatureOutcome::Ready(table) => table,
            FeatureOutcome::NoData | FeatureOutcome::Unavailable(_) => {
                FeatureTable::empty(end_time, window_minutes)
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, FeatureOutcome::Ready(_))
    }
}

/// A stored conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: String,
    pub user_id: String,
    pub actor: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Pre-aggregated daily CGM statistics row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CgmAggregate {
    pub date: NaiveDate,
    pub mean_glucose: Option<f64>,
    pub time_in_range_pct: Option<f64>,
    pub gmi: Option<f64>,
    pub sd: Option<f64>,
    pub cv: Option<f64>,
    pub hyper_flag: bool,
    pub hypo_flag: bool,
    pub mage: Option<f64>,
}
