//! Readiness classification
//!
//! Turns today's reading and the baseline window into a [`Command`]:
//!
//! | Condition                               | Command    |
//! |-----------------------------------------|------------|
//! | fewer than `min_preview_days` values    | `LEARNING` |
//! | z < `rest`                              | `REST`     |
//! | z ≥ `perform`                           | `PERFORM`  |
//! | otherwise                               | `BUILD`    |
//!
//! Between `min_preview_days` and `min_full_days` the command is still issued
//! but flagged as a preview so the caller can signal reduced confidence.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::baseline::{BaselineStats, MAD_FLOOR, MAD_SCALE};
use crate::models::{Command, Reading};

/// Threshold validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("{name} must be a finite number, got {value}")]
    NotFinite { name: &'static str, value: f64 },
    #[error("rest threshold ({rest}) must be below perform threshold ({perform})")]
    InvertedBands { rest: f64, perform: f64 },
    #[error("min_preview_days ({preview}) must be between 1 and min_full_days ({full})")]
    InvalidWindow { preview: usize, full: usize },
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
}

/// Classification thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// z-scores strictly below this are REST
    pub rest: f64,

    /// z-scores at or above this are PERFORM
    pub perform: f64,

    /// Historical days needed before any command is issued
    pub min_preview_days: usize,

    /// Historical days needed for a full-confidence command
    pub min_full_days: usize,

    /// Lower bound for the scaled MAD
    pub mad_floor: f64,

    /// MAD consistency constant
    pub mad_scale: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            rest: -1.0,
            perform: 0.5,
            min_preview_days: 3,
            min_full_days: 7,
            mad_floor: MAD_FLOOR,
            mad_scale: MAD_SCALE,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        for (name, value) in [
            ("rest", self.rest),
            ("perform", self.perform),
            ("mad_floor", self.mad_floor),
            ("mad_scale", self.mad_scale),
        ] {
            if !value.is_finite() {
                return Err(ThresholdError::NotFinite { name, value });
            }
        }

        if self.rest >= self.perform {
            return Err(ThresholdError::InvertedBands {
                rest: self.rest,
                perform: self.perform,
            });
        }

        if self.min_preview_days == 0 || self.min_preview_days > self.min_full_days {
            return Err(ThresholdError::InvalidWindow {
                preview: self.min_preview_days,
                full: self.min_full_days,
            });
        }

        if self.mad_floor <= 0.0 {
            return Err(ThresholdError::NotPositive {
                name: "mad_floor",
                value: self.mad_floor,
            });
        }
        if self.mad_scale <= 0.0 {
            return Err(ThresholdError::NotPositive {
                name: "mad_scale",
                value: self.mad_scale,
            });
        }

        Ok(())
    }
}

/// Result of evaluating one day's reading
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub command_key: Command,
    #[serde(flatten)]
    pub detail: EvaluationDetail,
}

/// Statistics behind an evaluation.
///
/// With insufficient history no statistics exist at all, so a caller cannot
/// mistake "no data" for a zero z-score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EvaluationDetail {
    #[serde(rename_all = "camelCase")]
    Insufficient { days_needed: usize },
    #[serde(rename_all = "camelCase")]
    Baseline {
        baseline: f64,
        mad: f64,
        z_score: f64,
        today_value: f64,
        is_preview: bool,
        days_until_full: usize,
    },
}

impl Evaluation {
    pub fn command(&self) -> Command {
        self.command_key
    }

    pub fn is_learning(&self) -> bool {
        matches!(self.detail, EvaluationDetail::Insufficient { .. })
    }

    pub fn is_preview(&self) -> bool {
        matches!(
            self.detail,
            EvaluationDetail::Baseline {
                is_preview: true,
                ..
            }
        )
    }

    pub fn days_needed(&self) -> Option<usize> {
        match self.detail {
            EvaluationDetail::Insufficient { days_needed } => Some(days_needed),
            EvaluationDetail::Baseline { .. } => None,
        }
    }

    pub fn days_until_full(&self) -> Option<usize> {
        match self.detail {
            EvaluationDetail::Baseline {
                days_until_full, ..
            } => Some(days_until_full),
            EvaluationDetail::Insufficient { .. } => None,
        }
    }

    pub fn z_score(&self) -> Option<f64> {
        match self.detail {
            EvaluationDetail::Baseline { z_score, .. } => Some(z_score),
            EvaluationDetail::Insufficient { .. } => None,
        }
    }

    pub fn stats(&self) -> Option<BaselineStats> {
        match self.detail {
            EvaluationDetail::Baseline { baseline, mad, .. } => Some(BaselineStats {
                median: baseline,
                mad,
            }),
            EvaluationDetail::Insufficient { .. } => None,
        }
    }
}

/// Maps readings to commands under a set of thresholds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classifier {
    thresholds: Thresholds,
}

impl Classifier {
    pub fn new(thresholds: Thresholds) -> Result<Self, ThresholdError> {
        thresholds.validate()?;
        Ok(Classifier { thresholds })
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Command for a z-score; the band edges are exact
    pub fn classify(&self, z_score: f64) -> Command {
        if z_score < self.thresholds.rest {
            Command::Rest
        } else if z_score >= self.thresholds.perform {
            Command::Perform
        } else {
            Command::Build
        }
    }

    /// Evaluate `today_value` against the baseline window `history`.
    ///
    /// `history` must already exclude the day being evaluated. `today_value`
    /// must pass [`Reading::is_valid_value`]; a NaN would otherwise fall
    /// through every band and come out as BUILD.
    pub fn evaluate(&self, today_value: f64, history: &[f64]) -> Evaluation {
        debug_assert!(
            Reading::is_valid_value(today_value),
            "evaluate called with invalid reading {}",
            today_value
        );
        let count = history.len();
        let t = &self.thresholds;

        let stats = match BaselineStats::from_values_with(history, t.mad_scale, t.mad_floor) {
            Some(stats) if count >= t.min_preview_days => stats,
            _ => {
                debug!(count, "Not enough history to classify");
                return Evaluation {
                    command_key: Command::Learning,
                    detail: EvaluationDetail::Insufficient {
                        days_needed: t.min_preview_days.saturating_sub(count).max(1),
                    },
                };
            }
        };
        let z_score = stats.z_score_of(today_value);
        let command = self.classify(z_score);
        let is_preview = count < t.min_full_days;

        debug!(
            count,
            baseline = stats.median,
            mad = stats.mad,
            z_score,
            command = %command,
            is_preview,
            "Evaluated reading"
        );

        Evaluation {
            command_key: command,
            detail: EvaluationDetail::Baseline {
                baseline: stats.median,
                mad: stats.mad,
                z_score,
                today_value,
                is_preview,
                days_until_full: if is_preview { t.min_full_days - count } else { 0 },
            },
        }
    }
}
