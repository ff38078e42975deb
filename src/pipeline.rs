//! Pipeline orchestration
//!
//! [`DataHandler`] is the public entry point. It owns the store handle and
//! runs the stages in order:
//!
//! 1. Store fetch over the lookback windows
//! 2. [`Resampler`] onto the 5-minute grid
//! 3. [`FeatureDeriver`] for meal, activity, sleep and hour columns
//! 4. [`FeatureAssembler`] to merge and fill
//!
//! Missing data never surfaces as an error here. A store that cannot be
//! opened or read yields [`FeatureOutcome::Unavailable`] and the fixed
//! fallback estimate.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use log::{error, info, warn};

use crate::assembler::FeatureAssembler;
use crate::config::Config;
use crate::context::{
    historical_meal_examples, insight_context, InsightContext, MealExample, INSIGHT_LOOKBACK_DAYS,
};
use crate::error::DataError;
use crate::estimator::{HistoricalMealEstimator, MealEstimate, NoiseSource, UniformNoise};
use crate::features::{FeatureDeriver, HighGiClassifier};
use crate::resample::Resampler;
use crate::stats::{daily_and_weekly_stats, effective_today, GlucoseSummary, WEEK_DAYS};
use crate::store::{SqliteStore, TimeSeriesStore};
use crate::types::{ChatTurn, FeatureOutcome, FeatureTable, QualityFlag, RecordKind, TimeInterval};

/// Days from the Unix epoch to 9999-12-31
const ALL_TIME_DAYS: i64 = 2_932_896;

/// Data access facade for feature assembly and meal estimation
pub struct DataHandler<S> {
    store: Option<S>,
    unavailable_reason: String,
    config: Config,
    classifier: HighGiClassifier,
    resampler: Resampler,
    estimator: HistoricalMealEstimator,
    noise: Box<dyn NoiseSource>,
}

impl DataHandler<SqliteStore> {
    /// Open the configured database, degrading to an unavailable handler
    /// when it cannot be opened.
    pub fn open(config: Config) -> Self {
        match SqliteStore::open(&config.db_path) {
            Ok(store) => Self::new(store, config),
            Err(err) => {
                error!("Failed to open database {}: {err}", config.db_path.display());
                Self::unavailable(config, err.to_string())
            }
        }
    }

    /// Latest date with glucose readings, or `requested` if it is not later
    pub fn effective_today(&self, requested: NaiveDate) -> Result<NaiveDate, DataError> {
        let store = self.require_store()?;
        Ok(effective_today(&store.last_glucose_readings(1)?, requested))
    }

    /// Append a chat turn, keeping the configured number of turns per user
    pub fn add_chat_turn(&mut self, user_id: &str, actor: &str, message: &str) -> Result<usize, DataError> {
        let max_turns = self.config.chat_max_turns;
        match self.store.as_mut() {
            Some(store) => store.add_chat_turn(user_id, actor, message, max_turns),
            None => {
                error!("Cannot add chat turn: no database");
                Err(DataError::StoreUnavailable(self.unavailable_reason.clone()))
            }
        }
    }

    /// Recent chat turns for `user_id`, oldest first
    pub fn chat_history(&self, user_id: &str) -> Result<Vec<ChatTurn>, DataError> {
        self.require_store()?
            .chat_history(user_id, self.config.chat_history_len)
    }
}

impl<S: TimeSeriesStore> DataHandler<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self::build(Some(store), String::new(), config)
    }

    /// Handler without a store; every query degrades to its fallback
    pub fn unavailable(config: Config, reason: impl Into<String>) -> Self {
        Self::build(None, reason.into(), config)
    }

    fn build(store: Option<S>, unavailable_reason: String, config: Config) -> Self {
        let classifier = HighGiClassifier::new(&config.high_gi_keywords);
        let estimator = HistoricalMealEstimator::new(classifier.clone(), config.estimator.clone());
        Self {
            store,
            unavailable_reason,
            resampler: Resampler::new(i64::from(config.grid_step_minutes)),
            classifier,
            estimator,
            config,
            noise: Box::new(UniformNoise::from_entropy()),
        }
    }

    /// Replace the estimator's noise source
    pub fn with_noise(mut self, noise: impl NoiseSource + 'static) -> Self {
        self.noise = Box::new(noise);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Option<&S> {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> Option<&mut S> {
        self.store.as_mut()
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    /// Build the feature table for the `window_minutes` ending at `end_time`.
    pub fn prediction_features(&self, end_time: DateTime<Utc>, window_minutes: u32) -> FeatureOutcome {
        let Some(store) = self.store.as_ref() else {
            error!("Cannot assemble features: {}", self.unavailable_reason);
            return FeatureOutcome::Unavailable(self.unavailable_reason.clone());
        };

        let window = TimeInterval::lookback(end_time, i64::from(window_minutes));
        let readings = match store.glucose_readings(&window) {
            Ok(readings) => readings,
            Err(err) => {
                error!("Failed to fetch glucose readings: {err}");
                return FeatureOutcome::Unavailable(err.to_string());
            }
        };

        let Some(grid) = self.resampler.resample(&readings, &window) else {
            warn!(
                "No glucose data between {} and {}",
                window.start, window.end
            );
            return FeatureOutcome::NoData;
        };

        let mut quality_flags = Vec::new();
        let meals = or_flagged(store.meal_events(&window), RecordKind::Meal, &mut quality_flags);
        let activity_window = window.widen_start(self.config.activity_widen());
        let activities = or_flagged(
            store.activity_logs(&activity_window),
            RecordKind::Activity,
            &mut quality_flags,
        );
        let sleep_window = TimeInterval::new(end_time - self.config.sleep_lookback(), end_time);
        let sleeps = or_flagged(store.sleep_logs(&sleep_window), RecordKind::Sleep, &mut quality_flags);

        let mut derived = FeatureDeriver::new(&self.classifier).derive(
            &grid.timestamps,
            &meals,
            &activities,
            &sleeps,
            Duration::minutes(i64::from(window_minutes)),
        );
        quality_flags.append(&mut derived.quality_flags);
        derived.quality_flags = quality_flags;

        let table = FeatureAssembler::assemble(&grid, derived, end_time, window_minutes);
        info!(
            "Assembled {} feature rows ending {end_time} ({} quality flags)",
            table.len(),
            table.quality_flags.len()
        );
        FeatureOutcome::Ready(table)
    }

    /// Feature table, empty when no data is available
    pub fn get_prediction_features(&self, end_time: DateTime<Utc>, window_minutes: u32) -> FeatureTable {
        self.prediction_features(end_time, window_minutes)
            .into_table(end_time, window_minutes)
    }

    /// Full estimate with its derivation
    pub fn estimate_meal(&mut self, description: &str) -> MealEstimate {
        let noise = self.noise.as_mut();
        match self.store.as_ref() {
            Some(store) => self.estimator.estimate(store, description, noise),
            None => {
                error!("Cannot estimate from history: {}", self.unavailable_reason);
                self.estimator.unavailable(description, noise)
            }
        }
    }

    /// Estimated post-meal glucose (mg/dL) for a free-text description
    pub fn get_historical_meal_estimate(&mut self, description: &str) -> f64 {
        self.estimate_meal(description).value
    }

    /// Daily stats for `today` and the week ending on it
    pub fn glucose_summary(&self, today: NaiveDate) -> Result<GlucoseSummary, DataError> {
        let store = self.require_store()?;
        let week = TimeInterval::new(
            day_start(today - Duration::days(WEEK_DAYS - 1)),
            day_end(today),
        );
        Ok(daily_and_weekly_stats(&store.glucose_readings(&week)?, today))
    }

    /// Recent meals, sleeps and activities around `today`
    pub fn insight_context(&self, today: NaiveDate) -> Result<InsightContext, DataError> {
        let store = self.require_store()?;
        let from = day_start(today - Duration::days(INSIGHT_LOOKBACK_DAYS));
        let range = TimeInterval::new(from, day_end(today));
        // Sleeps are stored by end but dated by start
        let sleep_range = TimeInterval::new(from, day_end(today + Duration::days(1)));

        Ok(insight_context(
            &store.meal_events(&range)?,
            &store.sleep_logs(&sleep_range)?,
            &store.activity_logs(&range)?,
            today,
        ))
    }

    /// Past meals resembling `description` with their one-hour glucose change
    pub fn meal_examples(&self, description: &str, n: usize) -> Result<Vec<MealExample>, DataError> {
        let store = self.require_store()?;
        let all_time = TimeInterval::new(
            DateTime::<Utc>::UNIX_EPOCH,
            DateTime::<Utc>::UNIX_EPOCH + Duration::days(ALL_TIME_DAYS),
        );
        Ok(historical_meal_examples(&store.meal_events(&all_time)?, description, n))
    }

    fn require_store(&self) -> Result<&S, DataError> {
        self.store
            .as_ref()
            .ok_or_else(|| DataError::StoreUnavailable(self.unavailable_reason.clone()))
    }
}

/// Unwrap a secondary source, treating a failed read as empty
fn or_flagged<T>(
    result: Result<Vec<T>, DataError>,
    kind: RecordKind,
    quality_flags: &mut Vec<QualityFlag>,
) -> Vec<T> {
    result.unwrap_or_else(|err| {
        error!("Failed to fetch {} records: {err}", kind.as_str());
        quality_flags.push(QualityFlag::SourceUnavailable(kind));
        Vec::new()
    })
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn day_end(date: NaiveDate) -> DateTime<Utc> {
    day_start(date) + Duration::days(1) - Duration::seconds(1)
}
