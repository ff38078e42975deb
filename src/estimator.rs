//! Historical meal estimator
//!
//! Estimates a post-meal glucose value from a free-text meal description by
//! matching high-GI keywords against past meals and averaging the CGM peaks
//! observed after them. This is a display heuristic, not a calibrated model:
//! the result carries a small uniform perturbation and the quantity scaling
//! is a fixed linear rule.

use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::EstimatorConfig;
use crate::features::HighGiClassifier;
use crate::store::TimeSeriesStore;
use crate::types::TimeInterval;

/// Source of the display perturbation added to estimates
pub trait NoiseSource {
    /// Sample a value in `[-amplitude, amplitude]`
    fn sample(&mut self, amplitude: f64) -> f64;
}

/// Uniform noise from a seedable RNG
pub struct UniformNoise {
    rng: StdRng,
}

impl UniformNoise {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible noise sequence
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for UniformNoise {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl NoiseSource for UniformNoise {
    fn sample(&mut self, amplitude: f64) -> f64 {
        if amplitude <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-amplitude..=amplitude)
    }
}

/// No perturbation; estimates equal their formula value
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNoise;

impl NoiseSource for NoNoise {
    fn sample(&mut self, _amplitude: f64) -> f64 {
        0.0
    }
}

/// Which rule produced an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateBasis {
    /// The store could not be read
    StoreUnavailable,
    /// No high-GI keyword in the description
    LowGi,
    /// High-GI, but no past meal contains every keyword
    NoHistoricalMatch,
    /// Past meals found, none followed by CGM readings
    NoPeakReadings,
    /// Averaged post-meal peaks of past meals
    HistoricalPeaks,
}

/// Estimate with its derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealEstimate {
    /// Final value (`baseline + noise`, mg/dL)
    pub value: f64,
    /// Deterministic formula output
    pub baseline: f64,
    pub noise: f64,
    pub quantity: f64,
    pub matched_keywords: Vec<String>,
    pub peaks_used: usize,
    pub basis: EstimateBasis,
}

/// First word-bounded decimal number in `text`
pub fn parse_quantity(text: &str) -> Option<f64> {
    let chars: Vec<char> = text.chars().collect();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let boundary_after = |idx: usize| idx >= chars.len() || !is_word(chars[idx]);

    let mut i = 0;
    while i < chars.len() {
        let starts_number =
            chars[i].is_ascii_digit() && (i == 0 || !is_word(chars[i - 1]));
        if !starts_number {
            i += 1;
            continue;
        }

        let mut j = i;
        while j < chars.len() && chars[j].is_ascii_digit() {
            j += 1;
        }

        // Prefer the fractional form, fall back to the integer part
        if j + 1 < chars.len() && chars[j] == '.' && chars[j + 1].is_ascii_digit() {
            let mut k = j + 1;
            while k < chars.len() && chars[k].is_ascii_digit() {
                k += 1;
            }
            if boundary_after(k) {
                return chars[i..k].iter().collect::<String>().parse().ok();
            }
        }
        if boundary_after(j) {
            return chars[i..j].iter().collect::<String>().parse().ok();
        }
        i = j;
    }
    None
}

/// Keyword and quantity based glucose estimator
#[derive(Debug, Clone)]
pub struct HistoricalMealEstimator {
    classifier: HighGiClassifier,
    config: EstimatorConfig,
}

impl HistoricalMealEstimator {
    pub fn new(classifier: HighGiClassifier, config: EstimatorConfig) -> Self {
        Self { classifier, config }
    }

    /// Parsed quantity, 1.0 when absent, capped at the configured maximum
    pub fn quantity(&self, description: &str) -> f64 {
        parse_quantity(description)
            .unwrap_or(1.0)
            .min(self.config.max_quantity)
    }

    /// Estimate used when no store is available
    pub fn unavailable(&self, description: &str, noise: &mut dyn NoiseSource) -> MealEstimate {
        self.finish(
            self.config.unavailable_estimate,
            self.quantity(description),
            self.classifier.matched_keywords(description),
            0,
            EstimateBasis::StoreUnavailable,
            noise,
        )
    }

    pub fn estimate<S: TimeSeriesStore + ?Sized>(
        &self,
        store: &S,
        description: &str,
        noise: &mut dyn NoiseSource,
    ) -> MealEstimate {
        let cfg = &self.config;
        let quantity = self.quantity(description);
        info!("Parsed quantity {quantity} from description '{description}'");

        let keywords = self.classifier.matched_keywords(description);
        if keywords.is_empty() {
            info!("No high-GI keywords found; using low-GI estimate");
            let baseline = cfg.low_gi_base + (quantity - 1.0) * cfg.low_gi_per_unit;
            return self.finish(baseline, quantity, keywords, 0, EstimateBasis::LowGi, noise);
        }

        let past_meals = match store.meals_containing_all(&keywords, cfg.max_matches) {
            Ok(meals) => meals,
            Err(err) => {
                error!("Failed to query similar meals: {err}");
                return self.finish(
                    cfg.unavailable_estimate,
                    quantity,
                    keywords,
                    0,
                    EstimateBasis::StoreUnavailable,
                    noise,
                );
            }
        };

        if past_meals.is_empty() {
            warn!("No similar past meals for '{description}'; using scaled default");
            let baseline = cfg.high_gi_base * quantity * cfg.no_match_factor;
            return self.finish(
                baseline,
                quantity,
                keywords,
                0,
                EstimateBasis::NoHistoricalMatch,
                noise,
            );
        }

        let (peak_from, peak_to) = cfg.peak_window();
        let peaks: Vec<f64> = past_meals
            .iter()
            .filter_map(|meal| {
                let window = TimeInterval::new(meal.timestamp + peak_from, meal.timestamp + peak_to);
                match store.peak_glucose(&window) {
                    Ok(peak) => peak,
                    Err(err) => {
                        error!("Failed to read CGM peak after meal at {}: {err}", meal.timestamp);
                        None
                    }
                }
            })
            .collect();

        if peaks.is_empty() {
            warn!(
                "Found {} similar meals but no CGM peaks; using scaled default",
                past_meals.len()
            );
            let baseline = cfg.high_gi_base * quantity * cfg.no_peak_factor;
            return self.finish(
                baseline,
                quantity,
                keywords,
                0,
                EstimateBasis::NoPeakReadings,
                noise,
            );
        }

        let avg_peak = peaks.iter().sum::<f64>() / peaks.len() as f64;
        let baseline = avg_peak + (quantity - 1.0) * avg_peak * cfg.per_unit_peak_fraction;
        info!(
            "Estimated {baseline:.2} mg/dL for '{description}' from {} similar meals",
            peaks.len()
        );
        self.finish(
            baseline,
            quantity,
            keywords,
            peaks.len(),
            EstimateBasis::HistoricalPeaks,
            noise,
        )
    }

    fn finish(
        &self,
        baseline: f64,
        quantity: f64,
        matched_keywords: Vec<String>,
        peaks_used: usize,
        basis: EstimateBasis,
        noise: &mut dyn NoiseSource,
    ) -> MealEstimate {
        let perturbation = noise.sample(self.config.noise_amplitude);
        MealEstimate {
            value: baseline + perturbation,
            baseline,
            noise: perturbation,
            quantity,
            matched_keywords,
            peaks_used,
            basis,
        }
    }
}
