//! Unified error hierarchy for ReadyRS
//!
//! Mirrors the three failure kinds the tracker distinguishes (invalid input,
//! unavailable persistence, malformed persisted state) and adds the ambient
//! configuration/IO kinds the CLI needs. Only `InvalidReading` is ever returned
//! to a caller of the core along with `OutsideWindow`; persistence problems are
//! recovered locally.

use chrono::NaiveDate;
use thiserror::Error;

use crate::classifier::ThresholdError;
use crate::export::ExportError;
use crate::storage::StorageError;

/// Top-level error type for all ReadyRS operations
#[derive(Debug, Error)]
pub enum ReadyError {
    /// Reading value is non-numeric, non-finite or not strictly positive
    #[error("Invalid reading: {input}")]
    InvalidReading { input: String },

    /// Reading is dated before the oldest day of a full baseline window
    #[error("Reading for {date} is older than the baseline window")]
    OutsideWindow { date: NaiveDate },

    /// The persistence collaborator failed on get/set/delete
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(#[from] StorageError),

    /// The stored blob could not be parsed
    #[error("Malformed persisted state: {reason}")]
    MalformedPersistedState { reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Threshold validation errors
    #[error("Threshold error: {0}")]
    Thresholds(#[from] ThresholdError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for ReadyRS operations
pub type Result<T> = std::result::Result<T, ReadyError>;

impl ReadyError {
    /// Build an `InvalidReading` from whatever the caller typed
    pub fn invalid_reading(input: impl ToString) -> Self {
        ReadyError::InvalidReading {
            input: input.to_string(),
        }
    }

    /// Whether the tracker keeps operating on degraded state after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReadyError::PersistenceUnavailable(_) | ReadyError::MalformedPersistedState { .. }
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ReadyError::InvalidReading { .. } => ErrorSeverity::Info,
            ReadyError::OutsideWindow { .. } => ErrorSeverity::Info,
            ReadyError::PersistenceUnavailable(_) => ErrorSeverity::Warning,
            ReadyError::MalformedPersistedState { .. } => ErrorSeverity::Warning,
            ReadyError::Configuration(_) | ReadyError::Thresholds(_) => ErrorSeverity::Error,
            ReadyError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            ReadyError::InvalidReading { .. } => "Enter valid HRV".to_string(),
            ReadyError::OutsideWindow { date } => format!(
                "Reading for {} is older than the 14-day baseline window and was not saved",
                date
            ),
            ReadyError::PersistenceUnavailable(_) => {
                "Could not reach saved data. Your readings are kept for this session only."
                    .to_string()
            }
            ReadyError::MalformedPersistedState { .. } => {
                "Saved data could not be read. Starting with an empty history.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
