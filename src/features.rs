//! Feature derivation
//!
//! This module derives the per-grid-timestamp feature columns:
//! - high-GI meal flag, held on for the lookback after each meal
//! - activity intensity overlay
//! - most recent sleep quality, broadcast across the grid
//! - cyclical hour-of-day encoding

use std::f64::consts::PI;

use chrono::{DateTime, Duration, Timelike, Utc};
use log::warn;

use crate::config::DEFAULT_HIGH_GI_KEYWORDS;
use crate::types::{ActivityLog, Intensity, MealEvent, QualityFlag, SleepLog, SleepQuality};

/// Sleep value used when no record or no known label is available
pub const NEUTRAL_SLEEP_QUALITY: f64 = 0.5;

/// Keyword classifier for high-glycemic-index meals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighGiClassifier {
    keywords: Vec<String>,
}

impl Default for HighGiClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_GI_KEYWORDS)
    }
}

impl HighGiClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Keywords found in `description`, in configured order
    pub fn matched_keywords(&self, description: &str) -> Vec<String> {
        let text = description.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| text.contains(k.as_str()))
            .cloned()
            .collect()
    }

    pub fn is_high_gi(&self, description: &str) -> bool {
        let text = description.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

/// Derived feature columns for one grid
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumns {
    pub meal_flag_hi_gi: Vec<f64>,
    pub activity_intensity: Vec<f64>,
    pub sleep_quality: f64,
    pub hour_sin: Vec<f64>,
    pub hour_cos: Vec<f64>,
    pub quality_flags: Vec<QualityFlag>,
}

/// Feature deriver for computing grid-aligned signals
pub struct FeatureDeriver<'a> {
    classifier: &'a HighGiClassifier,
}

impl<'a> FeatureDeriver<'a> {
    pub fn new(classifier: &'a HighGiClassifier) -> Self {
        Self { classifier }
    }

    /// Derive every non-glucose column for `grid`
    pub fn derive(
        &self,
        grid: &[DateTime<Utc>],
        meals: &[MealEvent],
        activities: &[ActivityLog],
        sleeps: &[SleepLog],
        window: Duration,
    ) -> DerivedColumns {
        let mut quality_flags = Vec::new();

        let meal_flag_hi_gi = meal_flags(grid, meals, self.classifier, window);
        let activity_intensity = activity_overlay(grid, activities, &mut quality_flags);
        let sleep_quality = latest_sleep_quality(sleeps, &mut quality_flags);
        let (hour_sin, hour_cos): (Vec<f64>, Vec<f64>) = grid.iter().map(|t| hour_encoding(*t)).unzip();

        DerivedColumns {
            meal_flag_hi_gi,
            activity_intensity,
            sleep_quality,
            hour_sin,
            hour_cos,
            quality_flags,
        }
    }
}

/// High-GI flag per grid timestamp.
///
/// A meal counts only when its timestamp equals a grid timestamp. The flag
/// is then 1 for every grid timestamp `t` with `meal <= t <= meal + window`.
pub fn meal_flags(
    grid: &[DateTime<Utc>],
    meals: &[MealEvent],
    classifier: &HighGiClassifier,
    window: Duration,
) -> Vec<f64> {
    let mut last_high_gi: Option<DateTime<Utc>> = None;

    grid.iter()
        .map(|&t| {
            let hit = meals
                .iter()
                .any(|m| m.timestamp == t && classifier.is_high_gi(&m.food_items));
            if hit {
                last_high_gi = Some(t);
            }
            match last_high_gi {
                Some(meal_time) if t - meal_time <= window => 1.0,
                _ => 0.0,
            }
        })
        .collect()
}

/// Activity intensity per grid timestamp, 0 outside every activity.
///
/// Activities are applied in order of start time; on overlap the later
/// start wins. Unknown intensity labels and unusable durations leave the
/// column untouched.
pub fn activity_overlay(
    grid: &[DateTime<Utc>],
    activities: &[ActivityLog],
    quality_flags: &mut Vec<QualityFlag>,
) -> Vec<f64> {
    let mut column = vec![0.0; grid.len()];

    let mut ordered: Vec<&ActivityLog> = activities.iter().collect();
    ordered.sort_by_key(|a| a.timestamp_start);

    let mut unknown = 0usize;
    let mut invalid = 0usize;
    for activity in ordered {
        let Some(intensity) = Intensity::parse(&activity.intensity) else {
            unknown += 1;
            continue;
        };
        let Some(end) = activity.end() else {
            invalid += 1;
            continue;
        };
        let start = activity.timestamp_start;
        for (value, t) in column.iter_mut().zip(grid) {
            if *t >= start && *t <= end {
                *value = intensity.ordinal();
            }
        }
    }

    if unknown > 0 {
        warn!("Skipped {unknown} activity logs with unknown intensity labels");
        quality_flags.push(QualityFlag::UnknownActivityIntensity);
    }
    if invalid > 0 {
        warn!("Skipped {invalid} activity logs with unusable durations");
        quality_flags.push(QualityFlag::InvalidActivityDuration);
    }
    column
}

/// Quality score of the most recently ended sleep record.
pub fn latest_sleep_quality(sleeps: &[SleepLog], quality_flags: &mut Vec<QualityFlag>) -> f64 {
    let Some(latest) = sleeps.iter().max_by_key(|s| s.sleep_end) else {
        quality_flags.push(QualityFlag::MissingSleepData);
        return NEUTRAL_SLEEP_QUALITY;
    };

    match SleepQuality::parse(&latest.sleep_quality) {
        Some(quality) => quality.score(),
        None => {
            warn!(
                "Unknown sleep quality '{}', using neutral value",
                latest.sleep_quality
            );
            quality_flags.push(QualityFlag::UnknownSleepQuality);
            NEUTRAL_SLEEP_QUALITY
        }
    }
}

/// Cyclical hour-of-day encoding `(sin, cos)`
pub fn hour_encoding(timestamp: DateTime<Utc>) -> (f64, f64) {
    let angle = 2.0 * PI * timestamp.hour() as f64 / 24.0;
    (angle.sin(), angle.cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    fn grid(from: DateTime<Utc>, points: usize) -> Vec<DateTime<Utc>> {
        (0..points)
            .map(|i| from + Duration::minutes(5 * i as i64))
            .collect()
    }

    fn activity(start: DateTime<Utc>, minutes: f64, intensity: &str) -> ActivityLog {
        ActivityLog {
            timestamp_start: start,
            activity_type: None,
            duration_minutes: minutes,
            intensity: intensity.to_string(),
        }
    }

    fn sleep(end: DateTime<Utc>, quality: &str) -> SleepLog {
        SleepLog {
            sleep_start: end - Duration::hours(7),
            sleep_end: end,
            sleep_quality: quality.to_string(),
            duration_hours: Some(7.0),
        }
    }

    #[test]
    fn test_classifier_case_insensitive() {
        let classifier = HighGiClassifier::default();
        assert!(classifier.is_high_gi("Two cups of RICE"));
        assert!(classifier.is_high_gi("kan-on ug sabaw"));
        assert!(!classifier.is_high_gi("grilled fish"));
        assert_eq!(
            classifier.matched_keywords("chocolate cake"),
            vec!["cake".to_string(), "chocolate".to_string()]
        );
    }

    #[test]
    fn test_classifier_custom_keywords() {
        let classifier = HighGiClassifier::new(["Pandesal", " "]);
        assert_eq!(classifier.keywords(), &["pandesal".to_string()]);
        assert!(classifier.is_high_gi("pandesal with coffee"));
        assert!(!classifier.is_high_gi("rice"));
    }

    #[test]
    fn test_meal_flag_holds_for_window() {
        let classifier = HighGiClassifier::default();
        let g = grid(at(8, 0), 30);
        let meals = vec![MealEvent::new(at(8, 30), "rice and adobo")];
        let flags = meal_flags(&g, &meals, &classifier, Duration::minutes(90));

        for (t, flag) in g.iter().zip(&flags) {
            let expected = if *t >= at(8, 30) && *t <= at(10, 0) { 1.0 } else { 0.0 };
            assert_eq!(*flag, expected, "at {t}");
        }
    }

    #[test]
    fn test_meal_off_grid_or_low_gi_ignored() {
        let classifier = HighGiClassifier::default();
        let g = grid(at(8, 0), 6);
        let meals = vec![
            MealEvent::new(at(8, 7), "rice"),
            MealEvent::new(at(8, 10), "grilled fish"),
        ];
        let flags = meal_flags(&g, &meals, &classifier, Duration::minutes(90));
        assert_eq!(flags, vec![0.0; 6]);
    }

    #[test]
    fn test_activity_overlay_interval_inclusive() {
        let g = grid(at(8, 0), 8);
        let mut flags = Vec::new();
        let column = activity_overlay(&g, &[activity(at(8, 10), 15.0, "high")], &mut flags);
        assert_eq!(column, vec![0.0, 0.0, 2.0, 2.0, 2.0, 2.0, 0.0, 0.0]);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_activity_overlap_later_start_wins() {
        let g = grid(at(8, 0), 6);
        let mut flags = Vec::new();
        let activities = vec![
            activity(at(8, 10), 10.0, "low"),
            activity(at(8, 0), 30.0, "high"),
        ];
        let column = activity_overlay(&g, &activities, &mut flags);
        assert_eq!(column, vec![2.0, 2.0, 0.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_unknown_intensity_flagged() {
        let g = grid(at(8, 0), 3);
        let mut flags = Vec::new();
        let column = activity_overlay(&g, &[activity(at(8, 0), 10.0, "extreme")], &mut flags);
        assert_eq!(column, vec![0.0; 3]);
        assert_eq!(flags, vec![QualityFlag::UnknownActivityIntensity]);
    }

    #[test]
    fn test_unusable_duration_skipped_and_flagged() {
        let g = grid(at(8, 0), 4);
        let mut flags = Vec::new();
        let activities = vec![
            activity(at(8, 0), 1e18, "high"),
            activity(at(8, 5), f64::NEG_INFINITY, "high"),
            activity(at(8, 10), 5.0, "medium"),
        ];
        let column = activity_overlay(&g, &activities, &mut flags);
        assert_eq!(column, vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(flags, vec![QualityFlag::InvalidActivityDuration]);
    }

    #[test]
    fn test_latest_sleep_wins() {
        let mut flags = Vec::new();
        let sleeps = vec![sleep(at(7, 0), "good"), sleep(at(9, 0), "poor")];
        assert_eq!(latest_sleep_quality(&sleeps, &mut flags), 1.0);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_sleep_defaults_to_neutral() {
        let mut flags = Vec::new();
        assert_eq!(latest_sleep_quality(&[], &mut flags), NEUTRAL_SLEEP_QUALITY);
        assert_eq!(flags, vec![QualityFlag::MissingSleepData]);

        let mut flags = Vec::new();
        let sleeps = vec![sleep(at(7, 0), "restless")];
        assert_eq!(latest_sleep_quality(&sleeps, &mut flags), NEUTRAL_SLEEP_QUALITY);
        assert_eq!(flags, vec![QualityFlag::UnknownSleepQuality]);
    }

    #[test]
    fn test_hour_encoding_on_unit_circle() {
        for h in 0..24 {
            let (s, c) = hour_encoding(at(h, 0));
            assert!((s * s + c * c - 1.0).abs() < 1e-12);
        }
        let (s, c) = hour_encoding(at(6, 0));
        assert!((s - 1.0).abs() < 1e-12);
        assert!(c.abs() < 1e-12);
    }
}
