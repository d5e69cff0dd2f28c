//! Daily command and compliance log
//!
//! One entry per calendar day records the command issued that day, whether
//! the user later reported following it, and a self-reported energy level.
//! The three fields are written at different times and never overwrite each
//! other.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::{Command, ComplianceEntry, Energy, Followed};

/// Per-date compliance entries, iterated in ascending date order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplianceLog {
    entries: BTreeMap<NaiveDate, ComplianceEntry>,
}

impl ComplianceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the command issued for `date`.
    ///
    /// Creates the entry if needed; otherwise only `command` changes, leaving
    /// `followed` and `energy` as they were.
    pub fn record_command(&mut self, date: NaiveDate, command: Command) -> &ComplianceEntry {
        self.entries
            .entry(date)
            .and_modify(|entry| {
                if entry.command != command {
                    debug!(%date, from = %entry.command, to = %command, "Command updated");
                }
                entry.command = command;
            })
            .or_insert_with(|| ComplianceEntry::new(date, command))
    }

    /// Set `followed` on an existing entry. Returns false if no command was
    /// recorded for `date`.
    pub fn record_followed(&mut self, date: NaiveDate, followed: Followed) -> bool {
        match self.entries.get_mut(&date) {
            Some(entry) => {
                entry.followed = Some(followed);
                true
            }
            None => {
                debug!(%date, "No command recorded, ignoring compliance answer");
                false
            }
        }
    }

    /// Set `energy` on an existing entry. Returns false if no command was
    /// recorded for `date`.
    pub fn record_energy(&mut self, date: NaiveDate, energy: Energy) -> bool {
        match self.entries.get_mut(&date) {
            Some(entry) => {
                entry.energy = Some(energy);
                true
            }
            None => {
                debug!(%date, "No command recorded, ignoring energy level");
                false
            }
        }
    }

    /// Entry still awaiting a compliance answer.
    ///
    /// LEARNING days are never asked about since no real recommendation was
    /// issued.
    pub fn pending_compliance_for(&self, date: NaiveDate) -> Option<&ComplianceEntry> {
        self.entries
            .get(&date)
            .filter(|entry| entry.command.is_recommendation() && entry.followed.is_none())
    }

    /// Entry with a command but no energy level yet
    pub fn pending_energy_for(&self, date: NaiveDate) -> Option<&ComplianceEntry> {
        self.entries
            .get(&date)
            .filter(|entry| entry.energy.is_none())
    }

    pub fn get(&self, date: NaiveDate) -> Option<&ComplianceEntry> {
        self.entries.get(&date)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComplianceEntry> {
        self.entries.values()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl FromIterator<ComplianceEntry> for ComplianceLog {
    fn from_iter<I: IntoIterator<Item = ComplianceEntry>>(iter: I) -> Self {
        ComplianceLog {
            entries: iter.into_iter().map(|entry| (entry.date, entry)).collect(),
        }
    }
}

impl Serialize for ComplianceLog {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.entries.values())
    }
}

impl<'de> Deserialize<'de> for ComplianceLog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<ComplianceEntry>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_record_command_creates_blank_entry() {
        let mut log = ComplianceLog::new();
        let entry = log.record_command(date(1), Command::Build);

        assert_eq!(entry.command, Command::Build);
        assert_eq!(entry.followed, None);
        assert_eq!(entry.energy, None);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_record_command_preserves_followed_and_energy() {
        let mut log = ComplianceLog::new();
        log.record_command(date(1), Command::Build);
        assert!(log.record_followed(date(1), Followed::Partial));
        assert!(log.record_energy(date(1), Energy::High));

        log.record_command(date(1), Command::Rest);
        log.record_command(date(1), Command::Rest);

        let entry = log.get(date(1)).unwrap();
        assert_eq!(entry.command, Command::Rest);
        assert_eq!(entry.followed, Some(Followed::Partial));
        assert_eq!(entry.energy, Some(Energy::High));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_updates_without_command_are_noops() {
        let mut log = ComplianceLog::new();
        assert!(!log.record_followed(date(2), Followed::Yes));
        assert!(!log.record_energy(date(2), Energy::Low));
        assert!(log.is_empty());
    }

    #[test]
    fn test_followed_and_energy_do_not_clobber_each_other() {
        let mut log = ComplianceLog::new();
        log.record_command(date(3), Command::Perform);
        log.record_energy(date(3), Energy::Normal);
        log.record_followed(date(3), Followed::No);

        let entry = log.get(date(3)).unwrap();
        assert_eq!(entry.energy, Some(Energy::Normal));
        assert_eq!(entry.followed, Some(Followed::No));
    }

    #[test]
    fn test_pending_compliance() {
        let mut log = ComplianceLog::new();
        log.record_command(date(1), Command::Learning);
        log.record_command(date(2), Command::Rest);

        assert!(log.pending_compliance_for(date(1)).is_none());
        assert_eq!(
            log.pending_compliance_for(date(2)).map(|e| e.command),
            Some(Command::Rest)
        );
        assert!(log.pending_compliance_for(date(9)).is_none());

        log.record_followed(date(2), Followed::Yes);
        assert!(log.pending_compliance_for(date(2)).is_none());
    }

    #[test]
    fn test_pending_energy() {
        let mut log = ComplianceLog::new();
        assert!(log.pending_energy_for(date(4)).is_none());

        log.record_command(date(4), Command::Learning);
        assert!(log.pending_energy_for(date(4)).is_some());

        log.record_energy(date(4), Energy::Skipped);
        assert!(log.pending_energy_for(date(4)).is_none());
    }

    #[test]
    fn test_serializes_as_sorted_sequence() {
        let mut log = ComplianceLog::new();
        log.record_command(date(5), Command::Build);
        log.record_command(date(2), Command::Rest);

        let json = serde_json::to_string(&log).unwrap();
        assert!(json.starts_with(r#"[{"date":"2024-05-02","command":"REST""#));

        let restored: ComplianceLog = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, log);
    }
}
