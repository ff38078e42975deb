//! Flat-file (CSV export) reader
//!
//! Historical and demo data ship as four comma-separated files with fixed
//! column contracts:
//!
//! - `cgm_stream.csv`: `timestamp, glucose_level`
//! - `meal_events.csv`: `timestamp, food_items, baseline_glucose, glucose_at_t+60min`
//! - `activity_logs.csv`: `timestamp_start, activity_type, duration_min, intensity`
//! - `sleep_logs.csv`: `sleep_start, sleep_end, duration_h, sleep_quality`
//!
//! Columns are located by header name, so extra columns are ignored.
//! Rows with a blank glucose value are skipped.

use std::path::{Path, PathBuf};

use crate::error::DataError;
use crate::types::{
    minutes_to_duration, parse_timestamp, ActivityLog, GlucoseReading, MealEvent, SleepLog,
    MAX_RECORD_DURATION_DAYS,
};

pub const GLUCOSE_FILE: &str = "cgm_stream.csv";
pub const MEAL_FILE: &str = "meal_events.csv";
pub const ACTIVITY_FILE: &str = "activity_logs.csv";
pub const SLEEP_FILE: &str = "sleep_logs.csv";

/// Directory of CSV exports
#[derive(Debug, Clone)]
pub struct FlatFileSource {
    dir: PathBuf,
}

impl FlatFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn glucose_stream(&self) -> Result<Vec<GlucoseReading>, DataError> {
        let path = self.dir.join(GLUCOSE_FILE);
        parse_glucose_stream(&std::fs::read_to_string(&path)?, &path)
    }

    pub fn meal_events(&self) -> Result<Vec<MealEvent>, DataError> {
        let path = self.dir.join(MEAL_FILE);
        parse_meal_events(&std::fs::read_to_string(&path)?, &path)
    }

    pub fn activity_logs(&self) -> Result<Vec<ActivityLog>, DataError> {
        let path = self.dir.join(ACTIVITY_FILE);
        parse_activity_logs(&std::fs::read_to_string(&path)?, &path)
    }

    pub fn sleep_logs(&self) -> Result<Vec<SleepLog>, DataError> {
        let path = self.dir.join(SLEEP_FILE);
        parse_sleep_logs(&std::fs::read_to_string(&path)?, &path)
    }
}

pub fn parse_glucose_stream(content: &str, path: &Path) -> Result<Vec<GlucoseReading>, DataError> {
    let table = CsvTable::parse(content, path)?;
    let ts_col = table.column("timestamp")?;
    let glucose_col = table.column("glucose_level")?;

    let mut readings = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let Some(glucose_level) = row.number(glucose_col)? else {
            continue;
        };
        readings.push(GlucoseReading {
            timestamp: row.timestamp(ts_col)?,
            glucose_level,
        });
    }
    Ok(readings)
}

pub fn parse_meal_events(content: &str, path: &Path) -> Result<Vec<MealEvent>, DataError> {
    let table = CsvTable::parse(content, path)?;
    let ts_col = table.column("timestamp")?;
    let food_col = table.column("food_items")?;
    let baseline_col = table.optional_column("baseline_glucose");
    let t60_col = table.optional_column("glucose_at_t+60min");

    table
        .rows
        .iter()
        .map(|row| {
            Ok(MealEvent {
                timestamp: row.timestamp(ts_col)?,
                food_items: row.text(food_col).to_string(),
                baseline_glucose: match baseline_col {
                    Some(col) => row.number(col)?,
                    None => None,
                },
                glucose_at_t60: match t60_col {
                    Some(col) => row.number(col)?,
                    None => None,
                },
            })
        })
        .collect()
}

pub fn parse_activity_logs(content: &str, path: &Path) -> Result<Vec<ActivityLog>, DataError> {
    let table = CsvTable::parse(content, path)?;
    let start_col = table.column("timestamp_start")?;
    let duration_col = table.column("duration_min")?;
    let type_col = table.optional_column("activity_type");
    let intensity_col = table.optional_column("intensity");

    table
        .rows
        .iter()
        .map(|row| {
            let activity_type = type_col
                .map(|col| row.text(col))
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            Ok(ActivityLog {
                timestamp_start: row.timestamp(start_col)?,
                activity_type,
                duration_minutes: row.duration_minutes(duration_col, 1.0)?.unwrap_or(0.0),
                intensity: intensity_col
                    .map(|col| row.text(col).to_string())
                    .unwrap_or_default(),
            })
        })
        .collect()
}

/// Sleep exports may omit `sleep_end`; it is then derived from `duration_h`.
pub fn parse_sleep_logs(content: &str, path: &Path) -> Result<Vec<SleepLog>, DataError> {
    let table = CsvTable::parse(content, path)?;
    let start_col = table.column("sleep_start")?;
    let quality_col = table.column("sleep_quality")?;
    let end_col = table.optional_column("sleep_end");
    let duration_col = table.optional_column("duration_h");

    table
        .rows
        .iter()
        .map(|row| {
            let sleep_start = row.timestamp(start_col)?;
            let duration_hours = match duration_col {
                Some(col) => row.duration_minutes(col, 60.0)?.map(|minutes| minutes / 60.0),
                None => None,
            };
            let sleep_end = match end_col.filter(|&col| !row.text(col).is_empty()) {
                Some(col) => row.timestamp(col)?,
                None => match duration_hours.and_then(|hours| minutes_to_duration(hours * 60.0)) {
                    Some(duration) => sleep_start
                        .checked_add_signed(duration)
                        .ok_or_else(|| row.error("sleep end out of range"))?,
                    None => return Err(row.error("sleep row has neither sleep_end nor duration_h")),
                },
            };
            Ok(SleepLog {
                sleep_start,
                sleep_end,
                sleep_quality: row.text(quality_col).to_string(),
                duration_hours,
            })
        })
        .collect()
}

struct CsvTable<'a> {
    path: &'a Path,
    header: Vec<String>,
    rows: Vec<CsvRow<'a>>,
}

struct CsvRow<'a> {
    path: &'a Path,
    line: usize,
    fields: Vec<String>,
}

impl<'a> CsvTable<'a> {
    fn parse(content: &str, path: &'a Path) -> Result<Self, DataError> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let header = match lines.next() {
            Some((_, line)) => split_record(line)
                .into_iter()
                .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
                .collect(),
            None => Vec::new(),
        };

        let rows = lines
            .map(|(idx, line)| CsvRow {
                path,
                line: idx + 1,
                fields: split_record(line),
            })
            .collect();

        Ok(Self { path, header, rows })
    }

    fn optional_column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    fn column(&self, name: &str) -> Result<usize, DataError> {
        self.optional_column(name).ok_or_else(|| DataError::MissingColumn {
            path: self.path.to_path_buf(),
            column: name.to_string(),
        })
    }
}

impl CsvRow<'_> {
    fn text(&self, col: usize) -> &str {
        self.fields.get(col).map(|f| f.trim()).unwrap_or("")
    }

    fn number(&self, col: usize) -> Result<Option<f64>, DataError> {
        let raw = self.text(col);
        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
            return Ok(None);
        }
        raw.parse::<f64>()
            .map(Some)
            .map_err(|e| self.error(&format!("invalid number '{raw}': {e}")))
    }

    /// Duration column in units of `unit_minutes`, converted to minutes and
    /// bounded to `[0, MAX_RECORD_DURATION_DAYS]`
    fn duration_minutes(&self, col: usize, unit_minutes: f64) -> Result<Option<f64>, DataError> {
        let Some(value) = self.number(col)? else {
            return Ok(None);
        };
        let minutes = value * unit_minutes;
        if minutes_to_duration(minutes).is_none() {
            return Err(self.error(&format!(
                "duration '{}' must be between 0 and {MAX_RECORD_DURATION_DAYS} days",
                self.text(col)
            )));
        }
        Ok(Some(minutes))
    }

    fn timestamp(&self, col: usize) -> Result<chrono::DateTime<chrono::Utc>, DataError> {
        parse_timestamp(self.text(col)).map_err(|e| self.error(&e.to_string()))
    }

    fn error(&self, message: &str) -> DataError {
        DataError::FlatFile {
            path: self.path.to_path_buf(),
            line: self.line,
            message: message.to_string(),
        }
    }
}

/// Split one CSV record, honouring double-quoted fields and `""` escapes
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', _) => in_quotes = !in_quotes,
            (',', false) => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn path(name: &str) -> PathBuf {
        PathBuf::from(name)
    }

    #[test]
    fn test_split_record_quotes() {
        assert_eq!(
            split_record(r#"2024-03-01 07:00:00,"rice, egg and ""tuyo""",110"#),
            vec!["2024-03-01 07:00:00", r#"rice, egg and "tuyo""#, "110"]
        );
    }

    #[test]
    fn test_glucose_stream_skips_blank_values() {
        let csv = "timestamp,glucose_level\n\
                   2024-03-01 07:00:00,105.5\n\
                   2024-03-01 07:05:00,\n\
                   2024-03-01 07:10:00,110\n";
        let readings = parse_glucose_stream(csv, &path(GLUCOSE_FILE)).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[1].glucose_level, 110.0);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let csv = "time,glucose\n2024-03-01 07:00:00,105\n";
        let err = parse_glucose_stream(csv, &path(GLUCOSE_FILE)).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { ref column, .. } if column == "timestamp"));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let csv = "timestamp,glucose_level\n2024-03-01 07:00:00,high\n";
        let err = parse_glucose_stream(csv, &path(GLUCOSE_FILE)).unwrap_err();
        assert!(matches!(err, DataError::FlatFile { line: 2, .. }));
    }

    #[test]
    fn test_meal_events_optional_glucose_columns() {
        let csv = "timestamp,food_items,baseline_glucose,glucose_at_t+60min\n\
                   2024-03-01 07:00:00,\"rice, fried egg\",98,165\n\
                   2024-03-01 12:00:00,salad,,\n";
        let meals = parse_meal_events(csv, &path(MEAL_FILE)).unwrap();
        assert_eq!(meals[0].food_items, "rice, fried egg");
        assert_eq!(meals[0].baseline_glucose, Some(98.0));
        assert_eq!(meals[0].glucose_at_t60, Some(165.0));
        assert_eq!(meals[1].glucose_at_t60, None);
    }

    #[test]
    fn test_activity_logs() {
        let csv = "timestamp_start,activity_type,duration_min,intensity\n\
                   2024-03-01 17:00:00,walking,30,medium\n";
        let activities = parse_activity_logs(csv, &path(ACTIVITY_FILE)).unwrap();
        assert_eq!(activities[0].activity_type.as_deref(), Some("walking"));
        assert_eq!(activities[0].duration_minutes, 30.0);
        assert_eq!(activities[0].intensity, "medium");
    }

    #[test]
    fn test_unusable_activity_duration_rejected() {
        for value in ["1e18", "inf", "-inf", "-30"] {
            let csv = format!(
                "timestamp_start,activity_type,duration_min,intensity\n\
                 2024-03-01 17:00:00,walking,{value},high\n"
            );
            let err = parse_activity_logs(&csv, &path(ACTIVITY_FILE)).unwrap_err();
            assert!(matches!(err, DataError::FlatFile { line: 2, .. }), "duration {value}");
        }
    }

    #[test]
    fn test_unusable_sleep_duration_rejected() {
        let csv = "sleep_start,duration_h,sleep_quality\n\
                   2024-03-01 22:00:00,1e18,good\n";
        let err = parse_sleep_logs(csv, &path(SLEEP_FILE)).unwrap_err();
        assert!(matches!(err, DataError::FlatFile { line: 2, .. }));
    }

    #[test]
    fn test_sleep_end_derived_from_duration() {
        let csv = "sleep_start,duration_h,sleep_quality\n\
                   2024-03-01 22:00:00,7.5,good\n";
        let sleeps = parse_sleep_logs(csv, &path(SLEEP_FILE)).unwrap();
        assert_eq!(
            sleeps[0].sleep_end,
            Utc.with_ymd_and_hms(2024, 3, 2, 5, 30, 0).unwrap()
        );
    }
}
