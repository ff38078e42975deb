//! Feature table assembly
//!
//! Merges the resampled glucose column and the derived columns onto the
//! grid in [`FEATURE_COLUMNS`] order, then closes every remaining gap:
//! forward fill, backward fill, and finally zero with a quality flag.

use chrono::{DateTime, Utc};
use log::warn;

use crate::features::DerivedColumns;
use crate::resample::GlucoseGrid;
use crate::types::{FeatureRow, FeatureTable, QualityFlag, FEATURE_COLUMNS};

/// Assembler for the fixed-schema prediction table
pub struct FeatureAssembler;

impl FeatureAssembler {
    /// Merge and fill. The result has no missing values.
    pub fn assemble(
        glucose: &GlucoseGrid,
        derived: DerivedColumns,
        end_time: DateTime<Utc>,
        window_minutes: u32,
    ) -> FeatureTable {
        let len = glucose.len();
        let DerivedColumns {
            meal_flag_hi_gi,
            activity_intensity,
            sleep_quality,
            hour_sin,
            hour_cos,
            mut quality_flags,
        } = derived;

        let mut columns: [Vec<Option<f64>>; 6] = [
            glucose.values.clone(),
            aligned(meal_flag_hi_gi, len),
            aligned(activity_intensity, len),
            vec![Some(sleep_quality); len],
            aligned(hour_sin, len),
            aligned(hour_cos, len),
        ];

        for (name, column) in FEATURE_COLUMNS.iter().zip(columns.iter_mut()) {
            forward_fill(column);
            backward_fill(column);
            let zeroed = zero_fill(column);
            if zeroed > 0 {
                warn!("Feature column {name} had {zeroed} values missing after fill; set to 0");
                quality_flags.push(QualityFlag::ZeroFilled {
                    column: name.to_string(),
                    count: zeroed,
                });
            }
        }

        let rows = glucose
            .timestamps
            .iter()
            .enumerate()
            .map(|(i, &timestamp)| {
                let value = |c: usize| columns[c][i].unwrap_or(0.0);
                FeatureRow {
                    timestamp,
                    glucose_level: value(0),
                    meal_flag_hi_gi: value(1),
                    activity_intensity: value(2),
                    sleep_quality: value(3),
                    hour_sin: value(4),
                    hour_cos: value(5),
                }
            })
            .collect();

        FeatureTable {
            end_time,
            window_minutes,
            rows,
            quality_flags,
        }
    }
}

/// Wrap a derived column, padding or truncating to the grid length
fn aligned(values: Vec<f64>, len: usize) -> Vec<Option<f64>> {
    let mut column: Vec<Option<f64>> = values
        .into_iter()
        .map(|v| v.is_finite().then_some(v))
        .collect();
    column.resize(len, None);
    column
}

/// Propagate the last known value forward
pub fn forward_fill(column: &mut [Option<f64>]) {
    let mut last = None;
    for value in column.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }
}

/// Propagate the next known value backward
pub fn backward_fill(column: &mut [Option<f64>]) {
    let mut next = None;
    for value in column.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }
}

/// Set remaining gaps to 0, returning how many were set
pub fn zero_fill(column: &mut [Option<f64>]) -> usize {
    let mut count = 0;
    for value in column.iter_mut().filter(|v| v.is_none()) {
        *value = Some(0.0);
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn grid_of(values: Vec<Option<f64>>) -> GlucoseGrid {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        GlucoseGrid {
            step: Duration::minutes(5),
            timestamps: (0..values.len())
                .map(|i| start + Duration::minutes(5 * i as i64))
                .collect(),
            values,
        }
    }

    fn derived(len: usize) -> DerivedColumns {
        DerivedColumns {
            meal_flag_hi_gi: vec![0.0; len],
            activity_intensity: vec![1.0; len],
            sleep_quality: 0.5,
            hour_sin: vec![0.0; len],
            hour_cos: vec![1.0; len],
            quality_flags: Vec::new(),
        }
    }

    #[test]
    fn test_fill_passes() {
        let mut column = vec![None, Some(1.0), None, Some(3.0), None];
        forward_fill(&mut column);
        assert_eq!(column, vec![None, Some(1.0), Some(1.0), Some(3.0), Some(3.0)]);
        backward_fill(&mut column);
        assert_eq!(column[0], Some(1.0));

        let mut empty = vec![None, None];
        forward_fill(&mut empty);
        backward_fill(&mut empty);
        assert_eq!(zero_fill(&mut empty), 2);
        assert_eq!(empty, vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn test_edges_filled_from_nearest_reading() {
        let grid = grid_of(vec![None, Some(110.0), Some(120.0), None]);
        let end = grid.timestamps[3];
        let table = FeatureAssembler::assemble(&grid, derived(4), end, 15);

        let glucose: Vec<f64> = table.rows.iter().map(|r| r.glucose_level).collect();
        assert_eq!(glucose, vec![110.0, 110.0, 120.0, 120.0]);
        assert!(table.quality_flags.is_empty());
        assert!(table.rows.iter().all(|r| r.sleep_quality == 0.5));
    }

    #[test]
    fn test_short_derived_column_zero_filled_and_flagged() {
        let grid = grid_of(vec![Some(100.0); 3]);
        let mut columns = derived(3);
        columns.hour_cos = vec![f64::NAN; 3];
        let table = FeatureAssembler::assemble(&grid, columns, grid.timestamps[2], 10);

        assert!(table.rows.iter().all(|r| r.hour_cos == 0.0));
        assert_eq!(
            table.quality_flags,
            vec![QualityFlag::ZeroFilled {
                column: "hour_cos".to_string(),
                count: 3
            }]
        );
    }

    #[test]
    fn test_column_order() {
        let grid = grid_of(vec![Some(100.0)]);
        let table = FeatureAssembler::assemble(&grid, derived(1), grid.timestamps[0], 0);
        assert_eq!(table.to_matrix(), vec![[100.0, 0.0, 1.0, 0.5, 0.0, 1.0]]);
        assert!(table.to_csv().starts_with(
            "timestamp,glucose_level,meal_flag_hiGI,activity_intensity,sleep_quality,hour_sin,hour_cos\n"
        ));
    }
}
