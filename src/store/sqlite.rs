//! SQLite-backed record store
//!
//! Owns a single connection for its whole lifetime. Reads are plain range
//! queries; writes used for seeding and chat bookkeeping run in transactions.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{info, warn};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::migrations::run_migrations;
use super::TimeSeriesStore;
use crate::error::DataError;
use crate::flatfile::FlatFileSource;
use crate::types::{
    format_timestamp, parse_timestamp, ActivityLog, CgmAggregate, ChatTurn, GlucoseReading,
    MealEvent, SleepLog, TimeInterval,
};

/// Aggregate rows for a date and the day before it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub today: Option<CgmAggregate>,
    pub yesterday: Option<CgmAggregate>,
}

/// Row counts written by a flat-file import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub glucose_readings: usize,
    pub meal_events: usize,
    pub activity_logs: usize,
    pub sleep_logs: usize,
}

pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring its schema up to date
    pub fn open(path: &Path) -> Result<Self, DataError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(path)
            .map_err(|e| DataError::StoreUnavailable(format!("{}: {e}", path.display())))?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("Failed to enable WAL mode: {err}");
        }
        run_migrations(&mut conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Fresh in-memory database, used by tests and demos
    pub fn open_in_memory() -> Result<Self, DataError> {
        let mut conn = Connection::open_in_memory()?;
        run_migrations(&mut conn)?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn insert_glucose_readings(&mut self, readings: &[GlucoseReading]) -> Result<usize, DataError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO cgm_stream (timestamp, glucose_level) VALUES (?1, ?2)")?;
            for reading in readings {
                stmt.execute(params![format_timestamp(&reading.timestamp), reading.glucose_level])?;
            }
        }
        tx.commit()?;
        Ok(readings.len())
    }

    pub fn insert_meal_events(&mut self, meals: &[MealEvent]) -> Result<usize, DataError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO meal_events (timestamp, food_items, baseline_glucose, glucose_at_t60)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for meal in meals {
                stmt.execute(params![
                    format_timestamp(&meal.timestamp),
                    meal.food_items,
                    meal.baseline_glucose,
                    meal.glucose_at_t60,
                ])?;
            }
        }
        tx.commit()?;
        Ok(meals.len())
    }

    pub fn insert_activity_logs(&mut self, activities: &[ActivityLog]) -> Result<usize, DataError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO activity_logs (timestamp_start, activity_type, duration_min, intensity)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for activity in activities {
                stmt.execute(params![
                    format_timestamp(&activity.timestamp_start),
                    activity.activity_type,
                    activity.duration_minutes,
                    activity.intensity,
                ])?;
            }
        }
        tx.commit()?;
        Ok(activities.len())
    }

    pub fn insert_sleep_logs(&mut self, sleeps: &[SleepLog]) -> Result<usize, DataError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sleep_logs (sleep_start, sleep_end, duration_h, sleep_quality)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for sleep in sleeps {
                stmt.execute(params![
                    format_timestamp(&sleep.sleep_start),
                    format_timestamp(&sleep.sleep_end),
                    sleep.duration_hours,
                    sleep.sleep_quality,
                ])?;
            }
        }
        tx.commit()?;
        Ok(sleeps.len())
    }

    pub fn upsert_aggregate(&mut self, aggregate: &CgmAggregate) -> Result<(), DataError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO cgm_aggregates
                (date, mean_glucose, time_in_range_pct, gmi, sd, cv, hyper_flag, hypo_flag, mage)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                aggregate.date.format("%Y-%m-%d").to_string(),
                aggregate.mean_glucose,
                aggregate.time_in_range_pct,
                aggregate.gmi,
                aggregate.sd,
                aggregate.cv,
                aggregate.hyper_flag,
                aggregate.hypo_flag,
                aggregate.mage,
            ],
        )?;
        Ok(())
    }

    /// Load every CSV export in `source` into the database
    pub fn import_flat_files(&mut self, source: &FlatFileSource) -> Result<ImportReport, DataError> {
        let report = ImportReport {
            glucose_readings: self.insert_glucose_readings(&source.glucose_stream()?)?,
            meal_events: self.insert_meal_events(&source.meal_events()?)?,
            activity_logs: self.insert_activity_logs(&source.activity_logs()?)?,
            sleep_logs: self.insert_sleep_logs(&source.sleep_logs()?)?,
        };
        info!(
            "Imported {} glucose, {} meal, {} activity and {} sleep records from {}",
            report.glucose_readings,
            report.meal_events,
            report.activity_logs,
            report.sleep_logs,
            source.dir().display()
        );
        Ok(report)
    }

    /// Most recent `n` glucose readings, newest first
    pub fn last_glucose_readings(&self, n: usize) -> Result<Vec<GlucoseReading>, DataError> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, glucose_level FROM cgm_stream ORDER BY timestamp DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![n as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(glucose_from_row).collect()
    }

    /// Latest timestamp across meal, activity and sleep logs
    pub fn last_log_timestamp(&self) -> Result<Option<DateTime<Utc>>, DataError> {
        let candidates = [
            self.max_text("SELECT MAX(timestamp) FROM meal_events")?,
            self.max_text("SELECT MAX(timestamp_start) FROM activity_logs")?,
            self.max_text("SELECT MAX(sleep_start) FROM sleep_logs")?,
        ];

        let mut latest: Option<DateTime<Utc>> = None;
        for value in candidates.into_iter().flatten() {
            let ts = parse_timestamp(&value)?;
            latest = Some(latest.map_or(ts, |l| l.max(ts)));
        }

        if latest.is_none() {
            warn!("No user logs found in the database");
        }
        Ok(latest)
    }

    pub fn last_meal_timestamp(&self) -> Result<Option<DateTime<Utc>>, DataError> {
        self.max_text("SELECT MAX(timestamp) FROM meal_events")?
            .map(|value| parse_timestamp(&value))
            .transpose()
    }

    /// Aggregated summary for `target_date` and the day before
    pub fn daily_summary(&self, target_date: NaiveDate) -> Result<DailySummary, DataError> {
        let previous_date = target_date - Duration::days(1);
        Ok(DailySummary {
            today: self.aggregate_for(target_date)?,
            yesterday: self.aggregate_for(previous_date)?,
        })
    }

    /// Append a chat turn and trim the user's history to `max_turns`.
    ///
    /// Insert and trim share one transaction. Returns the number of turns removed.
    pub fn add_chat_turn(
        &mut self,
        user_id: &str,
        actor: &str,
        message: &str,
        max_turns: usize,
    ) -> Result<usize, DataError> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO chat_turns (id, user_id, actor, message, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                uuid::Uuid::new_v4().to_string(),
                user_id,
                actor,
                message,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let turn_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM chat_turns WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        let excess = (turn_count - max_turns as i64).max(0);
        let removed = if excess > 0 {
            tx.execute(
                "DELETE FROM chat_turns WHERE seq IN (
                    SELECT seq FROM chat_turns
                    WHERE user_id = ?1
                    ORDER BY seq ASC
                    LIMIT ?2
                 )",
                params![user_id, excess],
            )?
        } else {
            0
        };

        tx.commit()?;

        if removed > 0 {
            info!("Trimmed {removed} old chat turns for user {user_id}");
        }
        Ok(removed)
    }

    /// Last `n` turns for `user_id`, oldest first
    pub fn chat_history(&self, user_id: &str, n: usize) -> Result<Vec<ChatTurn>, DataError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, actor, message, timestamp FROM chat_turns
             WHERE user_id = ?1
             ORDER BY seq DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, n as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut history = rows
            .into_iter()
            .map(|(id, user_id, actor, message, timestamp)| {
                Ok(ChatTurn {
                    id,
                    user_id,
                    actor,
                    message,
                    timestamp: parse_timestamp(&timestamp)?,
                })
            })
            .collect::<Result<Vec<_>, DataError>>()?;
        history.reverse();
        Ok(history)
    }

    fn max_text(&self, sql: &str) -> Result<Option<String>, DataError> {
        Ok(self.conn.query_row(sql, [], |row| row.get::<_, Option<String>>(0))?)
    }

    fn aggregate_for(&self, date: NaiveDate) -> Result<Option<CgmAggregate>, DataError> {
        let row = self
            .conn
            .query_row(
                "SELECT mean_glucose, time_in_range_pct, gmi, sd, cv, hyper_flag, hypo_flag, mage
                 FROM cgm_aggregates WHERE date = ?1",
                params![date.format("%Y-%m-%d").to_string()],
                |row| {
                    Ok(CgmAggregate {
                        date,
                        mean_glucose: row.get(0)?,
                        time_in_range_pct: row.get(1)?,
                        gmi: row.get(2)?,
                        sd: row.get(3)?,
                        cv: row.get(4)?,
                        hyper_flag: row.get(5)?,
                        hypo_flag: row.get(6)?,
                        mage: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}

/// Text bounds for a closed range query. The start is rounded up to the
/// next microsecond so a truncated bound never admits an earlier record.
fn interval_params(interval: &TimeInterval) -> (String, String) {
    let start = match interval.start.timestamp_subsec_nanos() % 1_000 {
        0 => interval.start,
        rem => interval.start + Duration::nanoseconds(i64::from(1_000 - rem)),
    };
    (format_timestamp(&start), format_timestamp(&interval.end))
}

fn glucose_from_row((timestamp, glucose_level): (String, f64)) -> Result<GlucoseReading, DataError> {
    Ok(GlucoseReading {
        timestamp: parse_timestamp(&timestamp)?,
        glucose_level,
    })
}

type MealRow = (String, String, Option<f64>, Option<f64>);

fn meal_from_row((timestamp, food_items, baseline, t60): MealRow) -> Result<MealEvent, DataError> {
    Ok(MealEvent {
        timestamp: parse_timestamp(&timestamp)?,
        food_items,
        baseline_glucose: baseline,
        glucose_at_t60: t60,
    })
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl TimeSeriesStore for SqliteStore {
    fn glucose_readings(&self, interval: &TimeInterval) -> Result<Vec<GlucoseReading>, DataError> {
        let (start, end) = interval_params(interval);
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, glucose_level FROM cgm_stream WHERE timestamp BETWEEN ?1 AND ?2",
        )?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(glucose_from_row).collect()
    }

    fn meal_events(&self, interval: &TimeInterval) -> Result<Vec<MealEvent>, DataError> {
        let (start, end) = interval_params(interval);
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, food_items, baseline_glucose, glucose_at_t60
             FROM meal_events WHERE timestamp BETWEEN ?1 AND ?2",
        )?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<MealRow>, _>>()?;
        rows.into_iter().map(meal_from_row).collect()
    }

    fn activity_logs(&self, interval: &TimeInterval) -> Result<Vec<ActivityLog>, DataError> {
        let (start, end) = interval_params(interval);
        let mut stmt = self.conn.prepare(
            "SELECT timestamp_start, activity_type, duration_min, intensity
             FROM activity_logs WHERE timestamp_start BETWEEN ?1 AND ?2",
        )?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(start, activity_type, duration_minutes, intensity)| {
                Ok(ActivityLog {
                    timestamp_start: parse_timestamp(&start)?,
                    activity_type,
                    duration_minutes,
                    intensity,
                })
            })
            .collect()
    }

    fn sleep_logs(&self, interval: &TimeInterval) -> Result<Vec<SleepLog>, DataError> {
        let (start, end) = interval_params(interval);
        let mut stmt = self.conn.prepare(
            "SELECT sleep_start, sleep_end, duration_h, sleep_quality
             FROM sleep_logs WHERE sleep_end BETWEEN ?1 AND ?2",
        )?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(sleep_start, sleep_end, duration_hours, sleep_quality)| {
                Ok(SleepLog {
                    sleep_start: parse_timestamp(&sleep_start)?,
                    sleep_end: parse_timestamp(&sleep_end)?,
                    sleep_quality,
                    duration_hours,
                })
            })
            .collect()
    }

    fn meals_containing_all(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<MealEvent>, DataError> {
        let mut sql = String::from(
            "SELECT timestamp, food_items, baseline_glucose, glucose_at_t60 FROM meal_events",
        );
        for (i, _) in keywords.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(&format!("food_items LIKE ?{} ESCAPE '\\'", i + 1));
        }
        sql.push_str(&format!(" LIMIT {limit}"));

        let patterns: Vec<String> = keywords.iter().map(|k| like_pattern(k)).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(patterns.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<MealRow>, _>>()?;
        rows.into_iter().map(meal_from_row).collect()
    }

    fn peak_glucose(&self, interval: &TimeInterval) -> Result<Option<f64>, DataError> {
        let (start, end) = interval_params(interval);
        Ok(self.conn.query_row(
            "SELECT MAX(glucose_level) FROM cgm_stream WHERE timestamp BETWEEN ?1 AND ?2",
            params![start, end],
            |row| row.get::<_, Option<f64>>(0),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordKind, Records};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    fn seeded_store() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_glucose_readings(&[
                GlucoseReading { timestamp: at(7, 0), glucose_level: 100.0 },
                GlucoseReading { timestamp: at(7, 30), glucose_level: 150.0 },
                GlucoseReading { timestamp: at(7, 45), glucose_level: 170.0 },
                GlucoseReading { timestamp: at(9, 0), glucose_level: 110.0 },
            ])
            .unwrap();
        store
            .insert_meal_events(&[
                MealEvent::new(at(7, 0), "Rice and Fried Chicken"),
                MealEvent::new(at(12, 0), "rice with chocolate cake"),
                MealEvent::new(at(18, 0), "Grilled fish"),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_range_query_is_closed() {
        let store = seeded_store();
        let readings = store
            .glucose_readings(&TimeInterval::new(at(7, 0), at(7, 45)))
            .unwrap();
        assert_eq!(readings.len(), 3);
    }

    #[test]
    fn test_fetch_by_kind() {
        let store = seeded_store();
        let records = store
            .fetch(RecordKind::Meal, &TimeInterval::new(at(6, 0), at(13, 0)))
            .unwrap();
        assert_eq!(records.kind(), RecordKind::Meal);
        assert_eq!(records.len(), 2);
        assert!(matches!(records, Records::Meal(_)));
    }

    #[test]
    fn test_meals_containing_all_is_conjunctive_and_case_insensitive() {
        let store = seeded_store();
        let rice = store.meals_containing_all(&["rice".to_string()], 10).unwrap();
        assert_eq!(rice.len(), 2);

        let both = store
            .meals_containing_all(&["rice".to_string(), "cake".to_string()], 10)
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].food_items, "rice with chocolate cake");

        let limited = store.meals_containing_all(&["rice".to_string()], 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_peak_glucose() {
        let store = seeded_store();
        let peak = store
            .peak_glucose(&TimeInterval::new(at(7, 25), at(8, 5)))
            .unwrap();
        assert_eq!(peak, Some(170.0));
        let none = store
            .peak_glucose(&TimeInterval::new(at(20, 0), at(21, 0)))
            .unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn test_last_readings_and_timestamps() {
        let store = seeded_store();
        let last = store.last_glucose_readings(2).unwrap();
        assert_eq!(last[0].timestamp, at(9, 0));
        assert_eq!(last[1].timestamp, at(7, 45));
        assert_eq!(store.last_meal_timestamp().unwrap(), Some(at(18, 0)));
        assert_eq!(store.last_log_timestamp().unwrap(), Some(at(18, 0)));
    }

    #[test]
    fn test_empty_store_has_no_log_timestamp() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.last_log_timestamp().unwrap(), None);
    }

    #[test]
    fn test_daily_summary() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        store
            .upsert_aggregate(&CgmAggregate {
                date,
                mean_glucose: Some(120.0),
                time_in_range_pct: Some(90.0),
                gmi: Some(6.18),
                sd: Some(20.0),
                cv: Some(0.17),
                hyper_flag: false,
                hypo_flag: true,
                mage: None,
            })
            .unwrap();

        let summary = store.daily_summary(date).unwrap();
        assert_eq!(summary.today.as_ref().and_then(|a| a.mean_glucose), Some(120.0));
        assert!(summary.today.unwrap().hypo_flag);
        assert_eq!(summary.yesterday, None);
    }

    #[test]
    fn test_chat_history_is_trimmed() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for i in 0..10 {
            store
                .add_chat_turn("user-1", "user", &format!("message {i}"), 8)
                .unwrap();
        }
        store.add_chat_turn("user-2", "user", "other", 8).unwrap();

        let all = store.chat_history("user-1", 100).unwrap();
        assert_eq!(all.len(), 8);
        assert_eq!(all[0].message, "message 2");
        assert_eq!(all[7].message, "message 9");

        let recent = store.chat_history("user-1", 4).unwrap();
        let messages: Vec<&str> = recent.iter().map(|t| t.message.as_str()).collect();
        assert_eq!(messages, vec!["message 6", "message 7", "message 8", "message 9"]);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        run_migrations(&mut store.conn).unwrap();
        let version: i32 = store
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn test_sub_second_bounds_are_exact() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let fractional = at(8, 0) + Duration::milliseconds(250);
        store
            .insert_meal_events(&[
                MealEvent::new(at(7, 30), "rice"),
                MealEvent::new(fractional, "bread"),
            ])
            .unwrap();

        let later = TimeInterval::new(at(7, 30) + Duration::milliseconds(700), at(8, 0));
        assert!(store.meal_events(&later).unwrap().is_empty());

        let nanos_after = TimeInterval::new(at(7, 30) + Duration::nanoseconds(1), at(8, 5));
        let meals = store.meal_events(&nanos_after).unwrap();
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].timestamp, fractional);

        let exact = TimeInterval::new(fractional, fractional);
        assert_eq!(store.meal_events(&exact).unwrap().len(), 1);
    }

    #[test]
    fn test_whole_second_rows_are_upgraded() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(include_str!("schemas/schema_v1.sql")).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();
        conn.execute(
            "INSERT INTO cgm_stream (timestamp, glucose_level) VALUES ('2024-03-01 07:30:00', 120.0)",
            [],
        )
        .unwrap();
        run_migrations(&mut conn).unwrap();

        let store = SqliteStore {
            conn,
            path: None,
        };
        let readings = store
            .glucose_readings(&TimeInterval::new(at(7, 30), at(7, 30)))
            .unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].timestamp, at(7, 30));
    }
}
