//! Descriptive glucose statistics over calendar days

use chrono::{Duration, NaiveDate};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::types::{CgmAggregate, GlucoseReading};

/// Lower bound of the target range (mg/dL, inclusive)
pub const RANGE_LOW: f64 = 70.0;
/// Upper bound of the target range (mg/dL, inclusive)
pub const RANGE_HIGH: f64 = 180.0;

/// Days in the weekly summary, `today` included
pub const WEEK_DAYS: i64 = 7;

/// Mean and time in range over the last week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyStats {
    pub avg_glucose: f64,
    pub avg_time_in_range_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseSummary {
    pub daily: CgmAggregate,
    pub weekly: Option<WeeklyStats>,
}

/// Glucose management indicator (%) from a mean glucose (mg/dL)
pub fn gmi(mean_glucose: f64) -> f64 {
    3.31 + 0.02392 * mean_glucose
}

/// Percentage of values inside the target range
pub fn time_in_range_pct(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let in_range = values
        .iter()
        .filter(|v| (RANGE_LOW..=RANGE_HIGH).contains(*v))
        .count();
    in_range as f64 / values.len() as f64 * 100.0
}

/// Daily stats for `today` and the week ending on it, computed from raw readings
pub fn daily_and_weekly_stats(readings: &[GlucoseReading], today: NaiveDate) -> GlucoseSummary {
    let day_values: Vec<f64> = readings
        .iter()
        .filter(|r| r.timestamp.date_naive() == today)
        .map(|r| r.glucose_level)
        .collect();

    let daily = if day_values.is_empty() {
        warn!("No CGM readings for {today}; daily stats will be empty");
        CgmAggregate {
            date: today,
            mean_glucose: None,
            time_in_range_pct: None,
            gmi: None,
            sd: None,
            cv: None,
            hyper_flag: false,
            hypo_flag: false,
            mage: None,
        }
    } else {
        let mean = day_values.iter().mean();
        // Sample SD is undefined for a single reading
        let sd = Some(day_values.iter().std_dev()).filter(|v| v.is_finite());
        let cv = match sd {
            Some(sd) if mean > 0.0 => Some(sd / mean),
            _ => Some(0.0),
        };
        info!("Computed daily stats for {today} from {} readings", day_values.len());
        CgmAggregate {
            date: today,
            mean_glucose: Some(mean),
            time_in_range_pct: Some(time_in_range_pct(&day_values)),
            gmi: Some(gmi(mean)),
            sd,
            cv,
            hyper_flag: day_values.iter().any(|&v| v > RANGE_HIGH),
            hypo_flag: day_values.iter().any(|&v| v < RANGE_LOW),
            // MAGE is not computed
            mage: Some(0.0),
        }
    };

    let week_start = today - Duration::days(WEEK_DAYS - 1);
    let week_values: Vec<f64> = readings
        .iter()
        .filter(|r| {
            let date = r.timestamp.date_naive();
            date >= week_start && date <= today
        })
        .map(|r| r.glucose_level)
        .collect();

    let weekly = if week_values.is_empty() {
        warn!("No CGM readings for the week ending {today}; weekly stats will be empty");
        None
    } else {
        Some(WeeklyStats {
            avg_glucose: week_values.iter().mean(),
            avg_time_in_range_pct: time_in_range_pct(&week_values),
        })
    };

    GlucoseSummary { daily, weekly }
}

/// Clamp a requested date to the last date holding readings.
///
/// Dates at or before the data are returned unchanged, as is any date when
/// there are no readings at all.
pub fn effective_today(readings: &[GlucoseReading], requested: NaiveDate) -> NaiveDate {
    let Some(latest) = readings.iter().map(|r| r.timestamp.date_naive()).max() else {
        return requested;
    };
    if requested > latest {
        warn!("Requested date {requested} is after the latest data ({latest}); using {latest}");
        latest
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn reading(day: u32, hour: u32, level: f64) -> GlucoseReading {
        GlucoseReading {
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
            glucose_level: level,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_daily_stats() {
        let readings = vec![
            reading(10, 7, 60.0),
            reading(10, 9, 100.0),
            reading(10, 12, 200.0),
            reading(10, 18, 140.0),
            reading(9, 12, 300.0),
        ];
        let summary = daily_and_weekly_stats(&readings, date(10));
        let daily = summary.daily;

        assert_eq!(daily.mean_glucose, Some(125.0));
        assert_eq!(daily.time_in_range_pct, Some(50.0));
        assert_eq!(daily.gmi, Some(3.31 + 0.02392 * 125.0));
        assert!(daily.hyper_flag);
        assert!(daily.hypo_flag);
        assert_eq!(daily.mage, Some(0.0));

        let sd = daily.sd.unwrap();
        assert!((sd - 59.721576).abs() < 1e-4);
        assert!((daily.cv.unwrap() - sd / 125.0).abs() < 1e-12);
    }

    #[test]
    fn test_weekly_window_includes_today() {
        let readings = vec![
            reading(3, 12, 400.0),
            reading(5, 12, 100.0),
            reading(10, 12, 150.0),
            reading(11, 12, 400.0),
        ];
        let weekly = daily_and_weekly_stats(&readings, date(10)).weekly.unwrap();
        assert_eq!(weekly.avg_glucose, 125.0);
        assert_eq!(weekly.avg_time_in_range_pct, 100.0);
    }

    #[test]
    fn test_empty_day() {
        let summary = daily_and_weekly_stats(&[reading(1, 12, 100.0)], date(20));
        assert_eq!(summary.daily.date, date(20));
        assert_eq!(summary.daily.mean_glucose, None);
        assert_eq!(summary.weekly, None);
    }

    #[test]
    fn test_single_reading_has_no_sd() {
        let summary = daily_and_weekly_stats(&[reading(1, 12, 100.0)], date(1));
        assert_eq!(summary.daily.sd, None);
        assert_eq!(summary.daily.cv, Some(0.0));
    }

    #[test]
    fn test_effective_today() {
        let readings = vec![reading(3, 12, 100.0), reading(5, 8, 110.0)];
        assert_eq!(effective_today(&readings, date(9)), date(5));
        assert_eq!(effective_today(&readings, date(4)), date(4));
        assert_eq!(effective_today(&[], date(9)), date(9));
    }
}
