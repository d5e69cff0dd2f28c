//! Session state and its transitions
//!
//! [`SessionState`] bundles the reading history, the compliance log and the
//! user's profile. Every logical event (submitting today's reading, backfilling
//! a past day, answering a compliance prompt) is one method here, so a snapshot
//! taken after any call is consistent: a reading is never stored without the
//! command it produced.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::{Classifier, Evaluation, Thresholds};
use crate::compliance::ComplianceLog;
use crate::error::{ReadyError, Result};
use crate::history::{ReadingHistory, HISTORY_CAPACITY};
use crate::models::{ComplianceEntry, Energy, Followed, HrvSource, Reading};

/// Everything persisted for the single user of the tracker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionState {
    #[serde(rename = "hrvHistory")]
    pub history: ReadingHistory,

    #[serde(rename = "complianceLog")]
    pub compliance: ComplianceLog,

    pub user_name: String,

    #[serde(rename = "hrvSource")]
    pub source: Option<HrvSource>,
}

/// Re-derive today's evaluation without touching the state.
///
/// Returns `None` when no reading exists for `today`.
pub fn evaluate_today(
    state: &SessionState,
    classifier: &Classifier,
    today: NaiveDate,
) -> Option<Evaluation> {
    let reading = state.history.get(today)?;
    let baseline = state.history.values_excluding(today);
    Some(classifier.evaluate(reading.value, &baseline))
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` as the reading for `date`, classify it against the other
    /// days and record the resulting command.
    ///
    /// Resubmitting the same day replaces the earlier value and command but
    /// keeps any compliance or energy answers. An invalid value, or a date
    /// older than a full window, changes nothing.
    pub fn submit_reading(
        &mut self,
        classifier: &Classifier,
        date: NaiveDate,
        value: f64,
    ) -> Result<Evaluation> {
        self.check_storable(date, value)?;
        self.history.upsert(date, value)?;

        let baseline = self.history.values_excluding(date);
        let evaluation = classifier.evaluate(value, &baseline);
        self.compliance.record_command(date, evaluation.command());

        info!(
            %date,
            value,
            command = %evaluation.command(),
            history = self.history.len(),
            "Reading submitted"
        );
        Ok(evaluation)
    }

    /// Add or correct a reading for a past day, then re-derive today.
    ///
    /// Dates the full window would evict immediately are rejected.
    pub fn backfill_reading(
        &mut self,
        classifier: &Classifier,
        date: NaiveDate,
        value: f64,
        today: NaiveDate,
    ) -> Result<Option<Evaluation>> {
        self.check_storable(date, value)?;
        self.history.upsert(date, value)?;
        info!(%date, value, history = self.history.len(), "Reading backfilled");
        Ok(self.refresh_today(classifier, today))
    }

    /// Drop the reading for `date`, then re-derive today.
    ///
    /// The compliance entry for `date` is kept: the command was issued even if
    /// the reading is later withdrawn.
    pub fn remove_reading(
        &mut self,
        classifier: &Classifier,
        date: NaiveDate,
        today: NaiveDate,
    ) -> (Option<Reading>, Option<Evaluation>) {
        let removed = self.history.remove(date);
        if removed.is_some() {
            info!(%date, history = self.history.len(), "Reading removed");
        }
        (removed, self.refresh_today(classifier, today))
    }

    fn check_storable(&self, date: NaiveDate, value: f64) -> Result<()> {
        if !Reading::is_valid_value(value) {
            return Err(ReadyError::invalid_reading(value));
        }
        if !self.history.accepts(date) {
            return Err(ReadyError::OutsideWindow { date });
        }
        Ok(())
    }

    /// Evaluate today (if a reading exists) and make sure the compliance log
    /// carries the resulting command. Safe to call any number of times.
    pub fn refresh_today(&mut self, classifier: &Classifier, today: NaiveDate) -> Option<Evaluation> {
        let evaluation = evaluate_today(self, classifier, today)?;
        self.compliance.record_command(today, evaluation.command());
        Some(evaluation)
    }

    pub fn evaluate_today(&self, classifier: &Classifier, today: NaiveDate) -> Option<Evaluation> {
        evaluate_today(self, classifier, today)
    }

    pub fn record_followed(&mut self, date: NaiveDate, followed: Followed) -> bool {
        let recorded = self.compliance.record_followed(date, followed);
        if recorded {
            info!(%date, %followed, "Compliance recorded");
        }
        recorded
    }

    pub fn record_energy(&mut self, date: NaiveDate, energy: Energy) -> bool {
        let recorded = self.compliance.record_energy(date, energy);
        if recorded {
            info!(%date, %energy, "Energy recorded");
        }
        recorded
    }

    /// Yesterday's entry if the user still has to say whether they followed it
    pub fn pending_compliance(&self, today: NaiveDate) -> Option<&ComplianceEntry> {
        let yesterday = today.pred_opt()?;
        self.compliance.pending_compliance_for(yesterday)
    }

    /// Today's entry if a command was issued but no energy level reported
    pub fn pending_energy(&self, today: NaiveDate) -> Option<&ComplianceEntry> {
        self.compliance.pending_energy_for(today)
    }

    /// Empty history and compliance log, keeping the profile
    pub fn clear(&mut self) {
        self.history.clear();
        self.compliance.clear();
        info!("History and compliance log cleared");
    }

    pub fn set_user_name(&mut self, name: impl Into<String>) {
        self.user_name = name.into().trim().to_string();
    }

    pub fn set_source(&mut self, source: Option<HrvSource>) {
        self.source = source;
    }

    /// Progress against the default preview/full windows
    pub fn baseline_progress(&self) -> BaselineProgress {
        let t = Thresholds::default();
        BaselineProgress::new(self.history.len(), (t.min_preview_days, t.min_full_days))
    }

    /// Progress measured against a specific classifier's windows
    pub fn baseline_progress_for(&self, classifier: &Classifier) -> BaselineProgress {
        let t = classifier.thresholds();
        BaselineProgress::new(self.history.len(), (t.min_preview_days, t.min_full_days))
    }
}

/// How far the baseline window has filled up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineProgress {
    pub count: usize,
    pub capacity: usize,
    pub phase: BaselinePhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum BaselinePhase {
    /// No commands yet
    #[serde(rename_all = "camelCase")]
    Learning { days_until_preview: usize },
    /// Preview commands, reduced confidence
    #[serde(rename_all = "camelCase")]
    Preview { days_until_full: usize },
    Full,
}

impl BaselineProgress {
    fn new(count: usize, (preview, full): (usize, usize)) -> Self {
        let phase = if count >= full {
            BaselinePhase::Full
        } else if count >= preview {
            BaselinePhase::Preview {
                days_until_full: full - count,
            }
        } else {
            BaselinePhase::Learning {
                days_until_preview: preview - count,
            }
        };

        BaselineProgress {
            count,
            capacity: HISTORY_CAPACITY,
            phase,
        }
    }

    /// Share of the full-confidence window collected, capped at 1.0
    pub fn fraction_to_full(&self, full: usize) -> f64 {
        if full == 0 {
            return 1.0;
        }
        (self.count as f64 / full as f64).min(1.0)
    }

    pub fn message(&self) -> String {
        match self.phase {
            BaselinePhase::Full => "Full baseline active".to_string(),
            BaselinePhase::Preview { days_until_full } => format!(
                "Preview active. {} more day{} for full accuracy",
                days_until_full,
                if days_until_full == 1 { "" } else { "s" }
            ),
            BaselinePhase::Learning { days_until_preview } => format!(
                "{} more day{} until preview commands",
                days_until_preview,
                if days_until_preview == 1 { "" } else { "s" }
            ),
        }
    }
}
