//! In-memory record store
//!
//! Holds plain vectors of records. Used for demos built from CSV exports and
//! for tests that need a store without a database file.

use super::TimeSeriesStore;
use crate::error::DataError;
use crate::flatfile::FlatFileSource;
use crate::types::{ActivityLog, GlucoseReading, MealEvent, SleepLog, TimeInterval};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub glucose: Vec<GlucoseReading>,
    pub meals: Vec<MealEvent>,
    pub activities: Vec<ActivityLog>,
    pub sleeps: Vec<SleepLog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every CSV export in `source`
    pub fn from_flat_files(source: &FlatFileSource) -> Result<Self, DataError> {
        Ok(Self {
            glucose: source.glucose_stream()?,
            meals: source.meal_events()?,
            activities: source.activity_logs()?,
            sleeps: source.sleep_logs()?,
        })
    }

    pub fn with_glucose(mut self, readings: impl IntoIterator<Item = GlucoseReading>) -> Self {
        self.glucose.extend(readings);
        self
    }

    pub fn with_meals(mut self, meals: impl IntoIterator<Item = MealEvent>) -> Self {
        self.meals.extend(meals);
        self
    }

    pub fn with_activities(mut self, activities: impl IntoIterator<Item = ActivityLog>) -> Self {
        self.activities.extend(activities);
        self
    }

    pub fn with_sleeps(mut self, sleeps: impl IntoIterator<Item = SleepLog>) -> Self {
        self.sleeps.extend(sleeps);
        self
    }
}

impl TimeSeriesStore for MemoryStore {
    fn glucose_readings(&self, interval: &TimeInterval) -> Result<Vec<GlucoseReading>, DataError> {
        Ok(self
            .glucose
            .iter()
            .filter(|r| interval.contains(r.timestamp))
            .cloned()
            .collect())
    }

    fn meal_events(&self, interval: &TimeInterval) -> Result<Vec<MealEvent>, DataError> {
        Ok(self
            .meals
            .iter()
            .filter(|m| interval.contains(m.timestamp))
            .cloned()
            .collect())
    }

    fn activity_logs(&self, interval: &TimeInterval) -> Result<Vec<ActivityLog>, DataError> {
        Ok(self
            .activities
            .iter()
            .filter(|a| interval.contains(a.timestamp_start))
            .cloned()
            .collect())
    }

    fn sleep_logs(&self, interval: &TimeInterval) -> Result<Vec<SleepLog>, DataError> {
        Ok(self
            .sleeps
            .iter()
            .filter(|s| interval.contains(s.sleep_end))
            .cloned()
            .collect())
    }

    fn meals_containing_all(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<MealEvent>, DataError> {
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        Ok(self
            .meals
            .iter()
            .filter(|m| {
                let text = m.food_items.to_lowercase();
                keywords.iter().all(|k| text.contains(k.as_str()))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn peak_glucose(&self, interval: &TimeInterval) -> Result<Option<f64>, DataError> {
        Ok(self
            .glucose
            .iter()
            .filter(|r| interval.contains(r.timestamp))
            .map(|r| r.glucose_level)
            .fold(None, |peak: Option<f64>, v| Some(peak.map_or(v, |p| p.max(v)))))
    }
}
