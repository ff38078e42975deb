//! CGM features - data access and prediction feature assembly
//!
//! Reads glucose, meal, activity and sleep records from a time-series store
//! and turns them into a regularly sampled, gap-free feature table for a
//! glucose prediction model: store fetch → resampling → feature derivation
//! → table assembly. Also provides a historical-similarity estimate of the
//! glucose response to a described meal.
//!
//! ## Modules
//!
//! - **Store**: `TimeSeriesStore` with SQLite and in-memory adapters, plus a CSV export reader
//! - **Feature pipeline**: resampling, derivation and assembly behind `DataHandler`
//! - **Estimator**: keyword and quantity based meal estimate with injectable noise
//! - **Summaries**: daily/weekly statistics and insight context

pub mod assembler;
pub mod config;
pub mod context;
pub mod error;
pub mod estimator;
pub mod features;
pub mod flatfile;
pub mod pipeline;
pub mod resample;
pub mod stats;
pub mod store;
pub mod types;

pub use config::{Config, EstimatorConfig};
pub use error::DataError;
pub use estimator::{EstimateBasis, MealEstimate, NoNoise, NoiseSource, UniformNoise};
pub use features::HighGiClassifier;
pub use pipeline::DataHandler;
pub use store::{MemoryStore, SqliteStore, TimeSeriesStore};
pub use types::{FeatureOutcome, FeatureRow, FeatureTable, QualityFlag, TimeInterval, FEATURE_COLUMNS};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "cgm-features";
