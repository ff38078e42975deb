//! Resampling and alignment
//!
//! Turns an irregular glucose stream into a fixed-interval series:
//! - readings are bucketed on an epoch-aligned grid (bucket `[t, t + step)`)
//! - each bucket takes the mean of its readings
//! - interior gaps are filled by linear interpolation in time
//!
//! Buckets before the first or after the last observed reading stay empty;
//! the assembler resolves them.

use chrono::{DateTime, Duration, DurationRound, Utc};

use crate::types::{GlucoseReading, TimeInterval};

/// Default grid step in minutes
pub const DEFAULT_STEP_MINUTES: i64 = 5;

/// Glucose values aligned to a regular timestamp grid
#[derive(Debug, Clone, PartialEq)]
pub struct GlucoseGrid {
    pub step: Duration,
    pub timestamps: Vec<DateTime<Utc>>,
    /// `None` where no reading or interpolation applies
    pub values: Vec<Option<f64>>,
}

impl GlucoseGrid {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Number of buckets still lacking a value
    pub fn missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }
}

/// Resampler for converting glucose readings to a regular grid
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    step: Duration,
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_MINUTES)
    }
}

impl Resampler {
    pub fn new(step_minutes: i64) -> Self {
        Self {
            step: Duration::minutes(step_minutes.max(1)),
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Timestamp grid covering `window`: from the bucket holding `window.start`
    /// to the bucket holding `window.end`, inclusive.
    pub fn grid(&self, window: &TimeInterval) -> Vec<DateTime<Utc>> {
        let first = self.bucket_of(window.start);
        let last = self.bucket_of(window.end);

        let mut timestamps = Vec::new();
        let mut t = first;
        while t <= last {
            timestamps.push(t);
            t += self.step;
        }
        timestamps
    }

    /// Resample readings inside `window` onto the grid.
    ///
    /// Returns `None` when no reading falls inside the window.
    pub fn resample(&self, readings: &[GlucoseReading], window: &TimeInterval) -> Option<GlucoseGrid> {
        let timestamps = self.grid(window);
        let Some(&grid_start) = timestamps.first() else {
            return None;
        };

        let mut sums = vec![0.0; timestamps.len()];
        let mut counts = vec![0usize; timestamps.len()];
        let step_ms = self.step.num_milliseconds();

        for reading in readings.iter().filter(|r| window.contains(r.timestamp)) {
            let offset_ms = (reading.timestamp - grid_start).num_milliseconds();
            let idx = (offset_ms / step_ms) as usize;
            if idx < sums.len() {
                sums[idx] += reading.glucose_level;
                counts[idx] += 1;
            }
        }

        if counts.iter().all(|&c| c == 0) {
            return None;
        }

        let mut values: Vec<Option<f64>> = sums
            .iter()
            .zip(&counts)
            .map(|(&sum, &count)| (count > 0).then(|| sum / count as f64))
            .collect();

        interpolate_interior(&timestamps, &mut values);

        Some(GlucoseGrid {
            step: self.step,
            timestamps,
            values,
        })
    }

    fn bucket_of(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        // Truncation only fails for steps beyond the representable range
        timestamp.duration_trunc(self.step).unwrap_or(timestamp)
    }
}

/// Fill `None` runs bounded on both sides by known values, linearly in time
fn interpolate_interior(timestamps: &[DateTime<Utc>], values: &mut [Option<f64>]) {
    let mut previous: Option<usize> = None;

    for idx in 0..values.len() {
        let Some(current) = values[idx] else {
            continue;
        };

        if let Some(prev) = previous {
            if idx - prev > 1 {
                // Bracketed by known points at `prev` and `idx`
                let before = values[prev].unwrap_or(current);
                let span = (timestamps[idx] - timestamps[prev]).num_milliseconds() as f64;
                for gap in prev + 1..idx {
                    let offset = (timestamps[gap] - timestamps[prev]).num_milliseconds() as f64;
                    let alpha = offset / span;
                    values[gap] = Some(before + alpha * (current - before));
                }
            }
        }
        previous = Some(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    fn reading(h: u32, m: u32, s: u32, level: f64) -> GlucoseReading {
        GlucoseReading {
            timestamp: at(h, m, s),
            glucose_level: level,
        }
    }

    #[test]
    fn test_grid_covers_window_uniformly() {
        let resampler = Resampler::default();
        let window = TimeInterval::lookback(at(9, 0, 0), 90);
        let grid = resampler.grid(&window);

        assert_eq!(grid.len(), 19);
        assert_eq!(grid[0], at(7, 30, 0));
        assert_eq!(*grid.last().unwrap(), at(9, 0, 0));
        assert!(grid.windows(2).all(|w| w[1] - w[0] == Duration::minutes(5)));
    }

    #[test]
    fn test_grid_aligns_unaligned_window() {
        let resampler = Resampler::default();
        let window = TimeInterval::lookback(at(9, 2, 30), 90);
        let grid = resampler.grid(&window);
        assert_eq!(grid[0], at(7, 30, 0));
        assert_eq!(*grid.last().unwrap(), at(9, 0, 0));
    }

    #[test]
    fn test_empty_window_signals_no_data() {
        let resampler = Resampler::default();
        let window = TimeInterval::lookback(at(9, 0, 0), 90);
        assert!(resampler.resample(&[], &window).is_none());

        let outside = vec![reading(6, 0, 0, 120.0)];
        assert!(resampler.resample(&outside, &window).is_none());
    }

    #[test]
    fn test_bucket_mean() {
        let resampler = Resampler::default();
        let window = TimeInterval::lookback(at(8, 0, 0), 10);
        let readings = vec![
            reading(7, 50, 30, 100.0),
            reading(7, 53, 0, 110.0),
            reading(7, 55, 0, 130.0),
        ];
        let grid = resampler.resample(&readings, &window).unwrap();
        assert_eq!(grid.values, vec![Some(105.0), Some(130.0), None]);
    }

    #[test]
    fn test_interior_gaps_interpolated_edges_left_open() {
        let resampler = Resampler::default();
        let window = TimeInterval::lookback(at(8, 0, 0), 30);
        let readings = vec![reading(7, 40, 0, 100.0), reading(7, 55, 0, 130.0)];
        let grid = resampler.resample(&readings, &window).unwrap();

        assert_eq!(
            grid.values,
            vec![
                None,
                None,
                Some(100.0),
                Some(110.0),
                Some(120.0),
                Some(130.0),
                None,
            ]
        );
        assert_eq!(grid.missing(), 3);
    }
}
