use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tempfile::tempdir;

/// Integration tests that exercise complete daily workflows

#[cfg(test)]
mod integration_tests {
    use super::*;
    use readyrs::export::{self, ExportFormat};
    use readyrs::storage::{FileStore, SqliteStore};
    use readyrs::{
        Classifier, Command, Energy, Followed, HrvSource, HrvSourceKind, KeyValueStore,
        MemoryStore, ReadyError, SessionState, SessionStore, WriteBehind,
    };

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap() + Duration::days(offset)
    }

    /// Backfill `values` on consecutive days ending the day before `today`
    fn seeded_state(values: &[f64], today: NaiveDate) -> SessionState {
        let mut state = SessionState::new();
        for (i, value) in values.iter().enumerate() {
            let date = today - Duration::days((values.len() - i) as i64);
            state.history.upsert(date, *value).unwrap();
        }
        state
    }

    #[test]
    fn test_full_baseline_build_day() {
        let classifier = Classifier::default();
        let today = day(7);
        let mut state = seeded_state(&[48.0, 50.0, 49.0, 51.0, 47.0, 50.0, 49.0], today);

        let evaluation = state.submit_reading(&classifier, today, 50.0).unwrap();
        assert_eq!(evaluation.command(), Command::Build);
        assert!(!evaluation.is_preview());

        let stats = evaluation.stats().unwrap();
        assert_eq!(stats.median, 49.0);
        assert_eq!(stats.mad, 3.0);
        assert!((evaluation.z_score().unwrap() - 1.0 / 3.0).abs() < 1e-9);

        assert_eq!(state.compliance.get(today).unwrap().command, Command::Build);
    }

    #[test]
    fn test_preview_rest_day() {
        let classifier = Classifier::default();
        let today = day(3);
        let mut state = seeded_state(&[60.0, 62.0, 61.0], today);

        let evaluation = state.submit_reading(&classifier, today, 40.0).unwrap();
        assert_eq!(evaluation.command(), Command::Rest);
        assert!(evaluation.is_preview());
        assert_eq!(evaluation.days_until_full(), Some(4));
        assert!((evaluation.z_score().unwrap() + 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_day_is_learning() {
        let classifier = Classifier::default();
        let mut state = SessionState::new();

        let evaluation = state.submit_reading(&classifier, day(0), 55.0).unwrap();
        assert_eq!(evaluation.command(), Command::Learning);
        assert_eq!(evaluation.days_needed(), Some(3));
        assert!(evaluation.stats().is_none());

        let json = serde_json::to_value(&evaluation).unwrap();
        assert_eq!(json["commandKey"], "LEARNING");
        assert_eq!(json["daysNeeded"], 3);
        assert!(json.get("zScore").is_none());
    }

    #[test]
    fn test_resubmission_replaces_value_keeps_answers() {
        let classifier = Classifier::default();
        let today = day(7);
        let mut state = seeded_state(&[48.0, 50.0, 49.0, 51.0, 47.0, 50.0, 49.0], today);

        state.submit_reading(&classifier, today, 50.0).unwrap();
        assert!(state.record_energy(today, Energy::High));

        let evaluation = state.submit_reading(&classifier, today, 30.0).unwrap();
        assert_eq!(evaluation.command(), Command::Rest);
        assert_eq!(state.history.len(), 8);
        assert_eq!(state.history.get(today).unwrap().value, 30.0);

        let entry = state.compliance.get(today).unwrap();
        assert_eq!(entry.command, Command::Rest);
        assert_eq!(entry.energy, Some(Energy::High));
    }

    #[test]
    fn test_invalid_reading_leaves_state_untouched() {
        let classifier = Classifier::default();
        let mut state = seeded_state(&[48.0, 50.0, 49.0], day(3));
        let before = state.clone();

        for bad in [0.0, -12.0, f64::NAN, f64::INFINITY] {
            let err = state.submit_reading(&classifier, day(3), bad).unwrap_err();
            assert!(matches!(err, ReadyError::InvalidReading { .. }));
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_two_weeks_of_daily_use() {
        let classifier = Classifier::default();
        let mut state = SessionState::new();
        let values = [
            52.0, 49.0, 55.0, 51.0, 48.0, 53.0, 50.0, 47.0, 54.0, 52.0, 38.0, 50.0, 61.0, 51.0,
            49.0, 50.0,
        ];

        for (i, value) in values.iter().enumerate() {
            let today = day(i as i64);
            if let Some(pending) = state.pending_compliance(today).cloned() {
                assert_eq!(pending.date, today - Duration::days(1));
                state.record_followed(pending.date, Followed::Yes);
            }
            state.submit_reading(&classifier, today, *value).unwrap();
            state.record_energy(today, Energy::Normal);
        }

        assert_eq!(state.history.len(), 14);
        assert_eq!(state.history.iter().next().unwrap().date, day(2));
        assert_eq!(state.compliance.len(), values.len());

        // The first three days never ask for compliance
        let learning_days = state
            .compliance
            .iter()
            .filter(|e| e.command == Command::Learning)
            .count();
        assert_eq!(learning_days, 3);
        assert!(state
            .compliance
            .iter()
            .filter(|e| e.command == Command::Learning)
            .all(|e| e.followed.is_none()));

        assert_eq!(state.compliance.get(day(10)).unwrap().command, Command::Rest);
        assert_eq!(state.compliance.get(day(12)).unwrap().command, Command::Perform);
    }

    #[test]
    fn test_backfill_rederives_today() {
        let classifier = Classifier::default();
        let today = day(3);
        let mut state = seeded_state(&[60.0, 62.0], today);

        let evaluation = state.submit_reading(&classifier, today, 40.0).unwrap();
        assert_eq!(evaluation.command(), Command::Learning);

        let refreshed = state
            .backfill_reading(&classifier, today - Duration::days(3), 61.0, today)
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.command(), Command::Rest);
        assert_eq!(state.compliance.get(today).unwrap().command, Command::Rest);

        let (removed, refreshed) =
            state.remove_reading(&classifier, today - Duration::days(3), today);
        assert_eq!(removed.unwrap().value, 61.0);
        assert_eq!(refreshed.unwrap().command(), Command::Learning);
    }

    #[test]
    fn test_persistence_round_trip_file_and_sqlite() {
        let classifier = Classifier::default();
        let temp_dir = tempdir().unwrap();

        let backends: Vec<Arc<dyn KeyValueStore>> = vec![
            Arc::new(FileStore::new(temp_dir.path().join("files"))),
            Arc::new(SqliteStore::open(temp_dir.path().join("readyrs.db")).unwrap()),
        ];

        for backend in backends {
            let store = SessionStore::new(backend, "readyrs_user_data");
            let mut state = seeded_state(&[48.0, 50.0, 49.0], day(3));
            state.submit_reading(&classifier, day(3), 52.0).unwrap();
            state.set_user_name("  Ana ");
            state.set_source(Some(HrvSource::new(
                HrvSourceKind::Other,
                Some("Polar H10".to_string()),
            )));

            assert!(store.save(&state));
            let loaded = store.load();
            assert_eq!(loaded, state);
            assert_eq!(loaded.user_name, "Ana");
            assert_eq!(loaded.source.unwrap().label, "Polar H10");

            let fresh = store.reset();
            assert_eq!(fresh, SessionState::default());
            assert_eq!(store.try_load().unwrap(), None);
        }
    }

    #[test]
    fn test_malformed_blob_starts_fresh() {
        let backend = Arc::new(MemoryStore::new());
        backend.set("readyrs_user_data", "{ not json").unwrap();

        let store = SessionStore::new(backend.clone(), "readyrs_user_data");
        assert!(matches!(
            store.try_load(),
            Err(ReadyError::MalformedPersistedState { .. })
        ));
        assert_eq!(store.load(), SessionState::default());
    }

    #[test]
    fn test_loads_blob_written_by_earlier_versions() {
        let blob = r#"{
            "hrvHistory": [
                {"date": "2024-05-03", "value": 50},
                {"date": "2024-05-01", "value": 48},
                {"date": "2024-05-01", "value": 47}
            ],
            "complianceLog": [
                {"date": "2024-05-03", "command": "BUILD", "followed": null}
            ],
            "hrvSource": {"type": "fitbit", "label": "Fitbit"}
        }"#;

        let backend = Arc::new(MemoryStore::new());
        backend.set("readyrs_user_data", blob).unwrap();
        let state = SessionStore::new(backend, "readyrs_user_data").load();

        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history.iter().next().unwrap().date, day(0));
        assert_eq!(state.compliance.get(day(2)).unwrap().energy, None);
        assert_eq!(state.user_name, "");
        assert_eq!(state.source.unwrap().kind, HrvSourceKind::Other);
    }

    #[test]
    fn test_csv_export_joins_history_and_log() {
        let classifier = Classifier::default();
        let temp_dir = tempdir().unwrap();
        let mut state = seeded_state(&[48.0, 50.0, 49.0], day(3));
        state.submit_reading(&classifier, day(3), 50.0).unwrap();
        state.record_energy(day(3), Energy::Low);
        state.set_source(Some(HrvSource::new(HrvSourceKind::Oura, None)));

        let name = export::default_file_name("", day(3), ExportFormat::Csv);
        assert_eq!(name, "readyrs_hrv_data_2024-05-04.csv");

        let path = temp_dir.path().join(name);
        export::export_state(&state, ExportFormat::Csv, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Date,HRV (ms),Command,Followed,Energy,Source");
        assert_eq!(lines[1], "2024-05-01,48,,,,Oura");
        assert_eq!(lines[4], "2024-05-04,50,BUILD,,low,Oura");
    }

    #[tokio::test]
    async fn test_write_behind_persists_latest_state() {
        let classifier = Classifier::default();
        let temp_dir = tempdir().unwrap();
        let backend: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(temp_dir.path()));
        let writer = WriteBehind::spawn(backend.clone(), "readyrs_user_data");

        let mut state = SessionState::new();
        state.submit_reading(&classifier, day(0), 50.0).unwrap();
        writer.save(&state);
        state.submit_reading(&classifier, day(0), 44.0).unwrap();
        writer.save(&state);

        let stats = writer.shutdown().await;
        assert_eq!(stats.failed, 0);

        let loaded = SessionStore::new(backend, "readyrs_user_data").load();
        assert_eq!(loaded.history.get(day(0)).unwrap().value, 44.0);
    }
}
