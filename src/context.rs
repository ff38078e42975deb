//! Context gathering for insights and meal explanations
//!
//! Selects the recent logs that accompany a daily insight request, and
//! finds past meals resembling a new description together with their
//! observed one-hour glucose change.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::types::{ActivityLog, MealEvent, SleepLog};

/// Days before `today` included in the insight context
pub const INSIGHT_LOOKBACK_DAYS: i64 = 2;

const RECENT_MEALS: usize = 3;
const RECENT_SLEEPS: usize = 2;
const RECENT_ACTIVITIES: usize = 3;

/// Recent logs around a requested day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightContext {
    pub recent_meals: Vec<MealEvent>,
    pub recent_sleep: Vec<SleepLog>,
    pub recent_activity: Vec<ActivityLog>,
}

impl InsightContext {
    pub fn is_empty(&self) -> bool {
        self.recent_meals.is_empty() && self.recent_sleep.is_empty() && self.recent_activity.is_empty()
    }
}

/// A past meal similar to a query, with its glucose change after one hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealExample {
    pub food_items: String,
    /// `glucose_at_t60 - baseline_glucose` (mg/dL)
    pub delta: f64,
}

/// Collect the latest meals, sleeps and activities dated within
/// `[today - 2 days, today]`.
///
/// Meals are dated by `timestamp`, sleeps by `sleep_start`, activities by
/// `timestamp_start`.
pub fn insight_context(
    meals: &[MealEvent],
    sleeps: &[SleepLog],
    activities: &[ActivityLog],
    today: NaiveDate,
) -> InsightContext {
    let from = today - Duration::days(INSIGHT_LOOKBACK_DAYS);
    let in_range = |ts: DateTime<Utc>| {
        let date = ts.date_naive();
        date >= from && date <= today
    };

    let context = InsightContext {
        recent_meals: latest(meals, RECENT_MEALS, |m| m.timestamp, in_range),
        recent_sleep: latest(sleeps, RECENT_SLEEPS, |s| s.sleep_start, in_range),
        recent_activity: latest(activities, RECENT_ACTIVITIES, |a| a.timestamp_start, in_range),
    };
    info!(
        "Gathered insight context for {today}: {} meals, {} sleeps, {} activities",
        context.recent_meals.len(),
        context.recent_sleep.len(),
        context.recent_activity.len()
    );
    context
}

/// The last `n` records passing `keep`, in chronological order
fn latest<T: Clone>(
    records: &[T],
    n: usize,
    key: impl Fn(&T) -> DateTime<Utc>,
    keep: impl Fn(DateTime<Utc>) -> bool,
) -> Vec<T> {
    let mut selected: Vec<&T> = records.iter().filter(|r| keep(key(r))).collect();
    selected.sort_by_key(|r| key(r));
    let skip = selected.len().saturating_sub(n);
    selected.into_iter().skip(skip).cloned().collect()
}

/// Lowercased word tokens of `text`
pub fn word_tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Up to `n` past meals sharing words with `description`, best match first.
///
/// Meals without both a baseline and a one-hour glucose value are skipped.
/// Ties keep their original order.
pub fn historical_meal_examples(
    meals: &[MealEvent],
    description: &str,
    n: usize,
) -> Vec<MealExample> {
    let query = word_tokens(description);
    if query.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, MealExample)> = meals
        .iter()
        .filter_map(|meal| {
            let (Some(baseline), Some(after)) = (meal.baseline_glucose, meal.glucose_at_t60) else {
                return None;
            };
            let score = word_tokens(&meal.food_items).intersection(&query).count();
            (score > 0).then(|| {
                (
                    score,
                    MealExample {
                        food_items: meal.food_items.clone(),
                        delta: after - baseline,
                    },
                )
            })
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(n);

    info!("Found {} similar meal examples", scored.len());
    scored.into_iter().map(|(_, example)| example).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn meal(ts: DateTime<Utc>, food: &str, baseline: Option<f64>, t60: Option<f64>) -> MealEvent {
        MealEvent {
            timestamp: ts,
            food_items: food.to_string(),
            baseline_glucose: baseline,
            glucose_at_t60: t60,
        }
    }

    fn sleep(start: DateTime<Utc>) -> SleepLog {
        SleepLog {
            sleep_start: start,
            sleep_end: start + Duration::hours(7),
            sleep_quality: "good".to_string(),
            duration_hours: Some(7.0),
        }
    }

    #[test]
    fn test_word_tokens() {
        let tokens = word_tokens("Fried rice, egg & kan-on");
        let mut sorted: Vec<_> = tokens.into_iter().collect();
        sorted.sort();
        assert_eq!(sorted, vec!["egg", "fried", "kan", "on", "rice"]);
    }

    #[test]
    fn test_meal_examples_ranked_by_overlap() {
        let meals = vec![
            meal(at(1, 7), "rice", Some(100.0), Some(150.0)),
            meal(at(1, 12), "fried rice with egg", Some(95.0), Some(170.0)),
            meal(at(1, 18), "fried fish", Some(90.0), Some(110.0)),
            meal(at(2, 7), "fried rice egg", None, Some(160.0)),
            meal(at(2, 12), "salad", Some(90.0), Some(95.0)),
        ];
        let examples = historical_meal_examples(&meals, "Fried rice and egg", 2);
        assert_eq!(
            examples,
            vec![
                MealExample {
                    food_items: "fried rice with egg".to_string(),
                    delta: 75.0
                },
                MealExample {
                    food_items: "rice".to_string(),
                    delta: 50.0
                },
            ]
        );
    }

    #[test]
    fn test_meal_examples_empty_query() {
        let meals = vec![meal(at(1, 7), "rice", Some(100.0), Some(150.0))];
        assert!(historical_meal_examples(&meals, " , ", 3).is_empty());
    }

    #[test]
    fn test_insight_context_window_and_limits() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let meals = vec![
            meal(at(7, 12), "too old", None, None),
            meal(at(8, 7), "a", None, None),
            meal(at(9, 7), "b", None, None),
            meal(at(10, 7), "c", None, None),
            meal(at(10, 12), "d", None, None),
            meal(at(11, 7), "future", None, None),
        ];
        let sleeps = vec![sleep(at(7, 22)), sleep(at(8, 22)), sleep(at(9, 22))];

        let context = insight_context(&meals, &sleeps, &[], today);
        let foods: Vec<&str> = context.recent_meals.iter().map(|m| m.food_items.as_str()).collect();
        assert_eq!(foods, vec!["b", "c", "d"]);
        assert_eq!(context.recent_sleep.len(), 2);
        assert_eq!(context.recent_sleep[1].sleep_start, at(9, 22));
        assert!(context.recent_activity.is_empty());
        assert!(!context.is_empty());
    }
}
