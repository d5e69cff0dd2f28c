//! Source of "today"
//!
//! Which calendar day a reading belongs to depends on where the day boundary
//! sits. The tracker never reads the wall clock directly; it asks a [`Clock`].

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Where a calendar day starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayBoundary {
    /// Midnight UTC
    #[default]
    Utc,
    /// Midnight in the system's local time zone
    Local,
}

impl FromStr for DayBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "utc" => Ok(DayBoundary::Utc),
            "local" => Ok(DayBoundary::Local),
            _ => Err(format!("Invalid day boundary: {} (expected utc or local)", s)),
        }
    }
}

pub trait Clock {
    fn today(&self) -> NaiveDate;

    /// The day before today; `None` only at the start of the calendar
    fn yesterday(&self) -> Option<NaiveDate> {
        self.today().pred_opt()
    }
}

/// Wall-clock date at the configured day boundary
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    boundary: DayBoundary,
}

impl SystemClock {
    pub fn new(boundary: DayBoundary) -> Self {
        SystemClock { boundary }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        match self.boundary {
            DayBoundary::Utc => Utc::now().date_naive(),
            DayBoundary::Local => Local::now().date_naive(),
        }
    }
}

/// Always returns the same date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(clock.yesterday(), NaiveDate::from_ymd_opt(2024, 2, 29));
    }

    #[test]
    fn test_day_boundary_parsing() {
        assert_eq!("UTC".parse::<DayBoundary>().unwrap(), DayBoundary::Utc);
        assert_eq!("local".parse::<DayBoundary>().unwrap(), DayBoundary::Local);
        assert!("pst".parse::<DayBoundary>().is_err());
        assert_eq!(DayBoundary::default(), DayBoundary::Utc);
    }

    #[test]
    fn test_system_clock_utc_matches_chrono() {
        let clock = SystemClock::new(DayBoundary::Utc);
        let before = Utc::now().date_naive();
        let today = clock.today();
        let after = Utc::now().date_naive();
        assert!(today == before || today == after);
    }
}
