//! Time-series store adapters
//!
//! A store serves the four record streams (glucose, meals, activity, sleep)
//! over closed time intervals. Callers sort what they receive; no ordering
//! is guaranteed by the adapters.

mod memory;
mod migrations;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{DailySummary, ImportReport, SqliteStore};

use crate::error::DataError;
use crate::types::{
    ActivityLog, GlucoseReading, MealEvent, RecordKind, Records, SleepLog, TimeInterval,
};

/// Trait for record stores feeding the feature pipeline
pub trait TimeSeriesStore {
    /// Glucose readings with `timestamp` inside `interval`
    fn glucose_readings(&self, interval: &TimeInterval) -> Result<Vec<GlucoseReading>, DataError>;

    /// Meals with `timestamp` inside `interval`
    fn meal_events(&self, interval: &TimeInterval) -> Result<Vec<MealEvent>, DataError>;

    /// Activities whose `timestamp_start` is inside `interval`
    fn activity_logs(&self, interval: &TimeInterval) -> Result<Vec<ActivityLog>, DataError>;

    /// Sleep periods whose `sleep_end` is inside `interval`
    fn sleep_logs(&self, interval: &TimeInterval) -> Result<Vec<SleepLog>, DataError>;

    /// Up to `limit` meals whose description contains every keyword
    /// (case-insensitive substring match)
    fn meals_containing_all(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<MealEvent>, DataError>;

    /// Highest glucose reading inside `interval`
    fn peak_glucose(&self, interval: &TimeInterval) -> Result<Option<f64>, DataError>;

    /// Fetch any record stream by kind
    fn fetch(&self, kind: RecordKind, interval: &TimeInterval) -> Result<Records, DataError> {
        Ok(match kind {
            RecordKind::Glucose => Records::Glucose(self.glucose_readings(interval)?),
            RecordKind::Meal => Records::Meal(self.meal_events(interval)?),
            RecordKind::Activity => Records::Activity(self.activity_logs(interval)?),
            RecordKind::Sleep => Records::Sleep(self.sleep_logs(interval)?),
        })
    }
}

impl<S: TimeSeriesStore + ?Sized> TimeSeriesStore for &S {
    fn glucose_readings(&self, interval: &TimeInterval) -> Result<Vec<GlucoseReading>, DataError> {
        (**self).glucose_readings(interval)
    }

    fn meal_events(&self, interval: &TimeInterval) -> Result<Vec<MealEvent>, DataError> {
        (**self).meal_events(interval)
    }

    fn activity_logs(&self, interval: &TimeInterval) -> Result<Vec<ActivityLog>, DataError> {
        (**self).activity_logs(interval)
    }

    fn sleep_logs(&self, interval: &TimeInterval) -> Result<Vec<SleepLog>, DataError> {
        (**self).sleep_logs(interval)
    }

    fn meals_containing_all(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<MealEvent>, DataError> {
        (**self).meals_containing_all(keywords, limit)
    }

    fn peak_glucose(&self, interval: &TimeInterval) -> Result<Option<f64>, DataError> {
        (**self).peak_glucose(interval)
    }
}
