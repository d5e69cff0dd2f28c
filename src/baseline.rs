//! Robust baseline statistics
//!
//! The baseline is the median of the recent readings and the spread is the
//! median absolute deviation (MAD), scaled so that it estimates a standard
//! deviation for normally distributed data. Both are insensitive to the odd
//! outlier night, unlike a mean/standard-deviation pair.
//!
//! The scaled MAD is floored: a very stable history (e.g. identical readings)
//! would otherwise give a spread near zero and turn a 1 ms wobble into an
//! extreme z-score.

use serde::{Deserialize, Serialize};

/// Consistency constant for MAD under normality (1 / Φ⁻¹(3/4))
pub const MAD_SCALE: f64 = 1.4826;

/// Lower bound for the scaled MAD, in milliseconds
pub const MAD_FLOOR: f64 = 3.0;

/// Median of `xs`; the mean of the two central values for even counts.
///
/// Returns `None` for an empty slice.
pub fn median(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }

    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Scaled, floored MAD using the default constants
pub fn mad(xs: &[f64], median: f64) -> f64 {
    mad_with(xs, median, MAD_SCALE, MAD_FLOOR)
}

/// Scaled MAD with explicit scale and floor
pub fn mad_with(xs: &[f64], median_value: f64, scale: f64, floor: f64) -> f64 {
    let deviations: Vec<f64> = xs.iter().map(|x| (x - median_value).abs()).collect();
    match median(&deviations) {
        Some(raw) => (raw * scale).max(floor),
        None => floor,
    }
}

/// Standardized deviation of `value` from `median` in MAD units
pub fn z_score(value: f64, median: f64, mad: f64) -> f64 {
    (value - median) / mad
}

/// Median and scaled MAD of a baseline window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub median: f64,
    pub mad: f64,
}

impl BaselineStats {
    /// Compute stats with the default scale and floor
    pub fn from_values(values: &[f64]) -> Option<Self> {
        Self::from_values_with(values, MAD_SCALE, MAD_FLOOR)
    }

    pub fn from_values_with(values: &[f64], scale: f64, floor: f64) -> Option<Self> {
        let median_value = median(values)?;
        Some(BaselineStats {
            median: median_value,
            mad: mad_with(values, median_value, scale, floor),
        })
    }

    pub fn z_score_of(&self, value: f64) -> f64 {
        z_score(value, self.median, self.mad)
    }

    /// Reading value sitting exactly at z-score `z`
    pub fn value_at(&self, z: f64) -> f64 {
        self.median + z * self.mad
    }

    /// Whole-millisecond readings at the REST and PERFORM boundaries.
    ///
    /// Readings from the first value (inclusive) up to the second
    /// (exclusive) classify as BUILD.
    pub fn build_range(&self, rest_threshold: f64, perform_threshold: f64) -> (f64, f64) {
        (
            self.value_at(rest_threshold).round(),
            self.value_at(perform_threshold).round(),
        )
    }
}
