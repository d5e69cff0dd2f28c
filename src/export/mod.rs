use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use crate::models::{Command, Energy, Followed};
use crate::session::SessionState;

pub mod csv;
pub mod json;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] ::csv::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// One exported day: the outer join of history and compliance log on date
#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub hrv: Option<f64>,
    pub command: Option<Command>,
    pub followed: Option<Followed>,
    pub energy: Option<Energy>,
    pub source: Option<String>,
}

/// Join readings and compliance entries by date, ascending
pub fn day_records(state: &SessionState) -> Vec<DayRecord> {
    let dates: BTreeSet<NaiveDate> = state
        .history
        .iter()
        .map(|r| r.date)
        .chain(state.compliance.dates())
        .collect();

    let source = state.source.as_ref().map(|s| s.label.clone());

    dates
        .into_iter()
        .map(|date| {
            let entry = state.compliance.get(date);
            DayRecord {
                date,
                hrv: state.history.get(date).map(|r| r.value),
                command: entry.map(|e| e.command),
                followed: entry.and_then(|e| e.followed),
                energy: entry.and_then(|e| e.energy),
                source: source.clone(),
            }
        })
        .collect()
}

/// Suggested file name, e.g. `readyrs_hrv_sam_2024-03-01.csv`
pub fn default_file_name(user_name: &str, on: NaiveDate, format: ExportFormat) -> String {
    let user: String = user_name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let user = if user.is_empty() { "data".to_string() } else { user };
    format!(
        "readyrs_hrv_{}_{}.{}",
        user,
        on.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Write `state` to `output_path` in the requested format
pub fn export_state<P: AsRef<Path>>(
    state: &SessionState,
    format: ExportFormat,
    output_path: P,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Csv => csv::export_day_records(&day_records(state), output_path),
        ExportFormat::Json => json::export_json(state, output_path),
    }
}
