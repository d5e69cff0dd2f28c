//! Rolling window of daily HRV readings
//!
//! The history holds at most [`HISTORY_CAPACITY`] readings, one per calendar
//! day, always sorted ascending by date. Writing a second reading for a day
//! replaces the first. When a new day pushes the window past capacity the
//! oldest day is evicted.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::{ReadyError, Result};
use crate::models::Reading;

/// Maximum number of days kept in the baseline window
pub const HISTORY_CAPACITY: usize = 14;

/// Date-deduplicated, capacity-bounded reading history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingHistory {
    readings: Vec<Reading>,
}

impl ReadingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from arbitrary readings, restoring the invariants.
    ///
    /// Invalid values are dropped, later duplicates of a date win, and only
    /// the newest [`HISTORY_CAPACITY`] days are kept.
    pub fn from_readings<I>(readings: I) -> Self
    where
        I: IntoIterator<Item = Reading>,
    {
        let mut history = Self::new();
        for reading in readings {
            if Reading::is_valid_value(reading.value) {
                history.insert_sorted(reading);
            }
        }
        history.trim_to_capacity();
        history
    }

    /// Insert or replace the reading for `date`.
    ///
    /// Returns the reading evicted to stay within capacity, if any. Fails with
    /// `InvalidReading` when `value` is not finite or not positive, leaving the
    /// history untouched.
    pub fn upsert(&mut self, date: NaiveDate, value: f64) -> Result<Option<Reading>> {
        if !Reading::is_valid_value(value) {
            return Err(ReadyError::invalid_reading(value));
        }

        self.insert_sorted(Reading::new(date, value));
        let evicted = self.trim_to_capacity();
        if let Some(old) = evicted {
            debug!(date = %old.date, value = old.value, "Evicted oldest reading");
        }
        Ok(evicted)
    }

    /// Remove the reading for `date`; absent dates are ignored
    pub fn remove(&mut self, date: NaiveDate) -> Option<Reading> {
        self.position(date)
            .ok()
            .map(|index| self.readings.remove(index))
    }

    /// Values of every reading except the one on `date`, oldest first
    pub fn values_excluding(&self, date: NaiveDate) -> Vec<f64> {
        self.readings
            .iter()
            .filter(|r| r.date != date)
            .map(|r| r.value)
            .collect()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Reading> {
        self.position(date).ok().map(|index| &self.readings[index])
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.position(date).is_ok()
    }

    /// Whether an upsert on `date` would keep that reading in the window
    pub fn accepts(&self, date: NaiveDate) -> bool {
        if self.readings.len() < HISTORY_CAPACITY || self.contains(date) {
            return true;
        }
        self.readings.first().map_or(true, |oldest| date > oldest.date)
    }

    /// Most recent reading
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reading> {
        self.readings.iter()
    }

    pub fn as_slice(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    fn position(&self, date: NaiveDate) -> std::result::Result<usize, usize> {
        self.readings.binary_search_by(|r| r.date.cmp(&date))
    }

    fn insert_sorted(&mut self, reading: Reading) {
        match self.position(reading.date) {
            Ok(index) => self.readings[index] = reading,
            Err(index) => self.readings.insert(index, reading),
        }
    }

    fn trim_to_capacity(&mut self) -> Option<Reading> {
        let mut evicted = None;
        while self.readings.len() > HISTORY_CAPACITY {
            evicted = Some(self.readings.remove(0));
        }
        evicted
    }
}

impl<'a> IntoIterator for &'a ReadingHistory {
    type Item = &'a Reading;
    type IntoIter = std::slice::Iter<'a, Reading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.iter()
    }
}

impl Serialize for ReadingHistory {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.readings.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReadingHistory {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let readings = Vec::<Reading>::deserialize(deserializer)?;
        Ok(ReadingHistory::from_readings(readings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(d as i64 - 1)
    }

    #[test]
    fn test_upsert_keeps_dates_sorted() {
        let mut history = ReadingHistory::new();
        history.upsert(day(3), 50.0).unwrap();
        history.upsert(day(1), 48.0).unwrap();
        history.upsert(day(2), 49.0).unwrap();

        let dates: Vec<NaiveDate> = history.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
    }

    #[test]
    fn test_upsert_replaces_existing_date() {
        let mut history = ReadingHistory::new();
        history.upsert(day(1), 48.0).unwrap();
        history.upsert(day(2), 49.0).unwrap();
        history.upsert(day(2), 55.0).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.get(day(2)).unwrap().value, 55.0);
    }

    #[test]
    fn test_upsert_rejects_invalid_values() {
        let mut history = ReadingHistory::new();
        history.upsert(day(1), 48.0).unwrap();

        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = history.upsert(day(2), bad);
            assert!(matches!(result, Err(ReadyError::InvalidReading { .. })));
        }
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_fifteenth_day_evicts_oldest() {
        let mut history = ReadingHistory::new();
        for d in 1..=14 {
            assert_eq!(history.upsert(day(d), 40.0 + d as f64).unwrap(), None);
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);

        let evicted = history.upsert(day(15), 60.0).unwrap();
        assert_eq!(evicted.map(|r| r.date), Some(day(1)));
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.iter().next().unwrap().date, day(2));
        assert_eq!(history.latest().unwrap().date, day(15));
    }

    #[test]
    fn test_backfill_older_than_full_window_is_evicted() {
        let mut history = ReadingHistory::new();
        for d in 2..=15 {
            history.upsert(day(d), 50.0).unwrap();
        }

        let evicted = history.upsert(day(1), 42.0).unwrap();
        assert_eq!(evicted.map(|r| r.date), Some(day(1)));
        assert!(!history.contains(day(1)));
    }

    #[test]
    fn test_accepts_only_dates_inside_full_window() {
        let mut history = ReadingHistory::new();
        assert!(history.accepts(day(1)));
        for d in 2..=15 {
            history.upsert(day(d), 50.0).unwrap();
        }

        assert!(!history.accepts(day(1)));
        assert!(history.accepts(day(2)));
        assert!(history.accepts(day(3)));
        assert!(history.accepts(day(16)));

        history.remove(day(9));
        assert!(history.accepts(day(1)));
    }

    #[test]
    fn test_remove_and_values_excluding() {
        let mut history = ReadingHistory::new();
        history.upsert(day(1), 48.0).unwrap();
        history.upsert(day(2), 50.0).unwrap();
        history.upsert(day(3), 52.0).unwrap();

        assert_eq!(history.values_excluding(day(2)), vec![48.0, 52.0]);
        assert_eq!(history.values_excluding(day(9)), vec![48.0, 50.0, 52.0]);

        assert_eq!(history.remove(day(2)).map(|r| r.value), Some(50.0));
        assert_eq!(history.remove(day(2)), None);
        assert_eq!(history.len(), 2);

        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_deserialize_restores_invariants() {
        let json = r#"[
            {"date":"2024-03-05","value":50},
            {"date":"2024-03-01","value":47},
            {"date":"2024-03-05","value":53},
            {"date":"2024-03-02","value":-1}
        ]"#;
        let history: ReadingHistory = serde_json::from_str(json).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().next().unwrap().date, day(1));
        assert_eq!(history.get(day(5)).unwrap().value, 53.0);
    }

    #[test]
    fn test_from_readings_keeps_newest_days() {
        let readings = (1..=20).map(|d| Reading::new(day(d), 50.0));
        let history = ReadingHistory::from_readings(readings);

        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.iter().next().unwrap().date, day(7));
    }
}
