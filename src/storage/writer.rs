//! Ordered write-behind persistence
//!
//! Callers hand snapshots to [`WriteBehind`] and carry on; a background task
//! writes them in submission order. When several snapshots queue up only the
//! newest is written, since each one fully supersedes the previous. Failed
//! writes are logged and dropped: the in-memory state stays authoritative.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{encode_state, KeyValueStore};
use crate::session::SessionState;

/// Counters reported when the writer shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub written: usize,
    pub deleted: usize,
    pub superseded: usize,
    pub failed: usize,
}

enum WriteRequest {
    Save(String),
    Delete,
    Flush(oneshot::Sender<()>),
}

enum PendingWrite {
    Save(String),
    Delete,
}

/// Handle to the background writer task
pub struct WriteBehind {
    tx: mpsc::UnboundedSender<WriteRequest>,
    handle: JoinHandle<WriteStats>,
}

impl WriteBehind {
    /// Start the writer on the current tokio runtime
    pub fn spawn(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(backend, key.into(), rx));
        WriteBehind { tx, handle }
    }

    /// Queue a snapshot of `state`
    pub fn save(&self, state: &SessionState) {
        match encode_state(state) {
            Ok(blob) => self.send(WriteRequest::Save(blob)),
            Err(e) => error!(error = %e, "Could not encode session snapshot"),
        }
    }

    /// Queue removal of the stored state
    pub fn delete(&self) {
        self.send(WriteRequest::Delete);
    }

    /// Wait until everything queued so far has been attempted
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(WriteRequest::Flush(ack_tx));
        if ack_rx.await.is_err() {
            warn!("Writer stopped before flush completed");
        }
    }

    /// Flush outstanding writes and stop the task
    pub async fn shutdown(self) -> WriteStats {
        let WriteBehind { tx, handle } = self;
        drop(tx);
        match handle.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Writer task failed");
                WriteStats::default()
            }
        }
    }

    fn send(&self, request: WriteRequest) {
        if self.tx.send(request).is_err() {
            warn!("Writer task is gone, dropping request");
        }
    }
}

async fn run_writer(
    backend: Arc<dyn KeyValueStore>,
    key: String,
    mut rx: mpsc::UnboundedReceiver<WriteRequest>,
) -> WriteStats {
    let mut stats = WriteStats::default();

    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        let mut pending: Option<PendingWrite> = None;
        for request in batch {
            match request {
                WriteRequest::Save(blob) => {
                    if pending.replace(PendingWrite::Save(blob)).is_some() {
                        stats.superseded += 1;
                    }
                }
                WriteRequest::Delete => {
                    if pending.replace(PendingWrite::Delete).is_some() {
                        stats.superseded += 1;
                    }
                }
                WriteRequest::Flush(ack) => {
                    if let Some(write) = pending.take() {
                        apply(&backend, &key, write, &mut stats).await;
                    }
                    let _ = ack.send(());
                }
            }
        }

        if let Some(write) = pending.take() {
            apply(&backend, &key, write, &mut stats).await;
        }
    }

    debug!(?stats, "Writer stopped");
    stats
}

async fn apply(
    backend: &Arc<dyn KeyValueStore>,
    key: &str,
    write: PendingWrite,
    stats: &mut WriteStats,
) {
    let backend = Arc::clone(backend);
    let key_owned = key.to_string();
    let is_delete = matches!(write, PendingWrite::Delete);

    let outcome = tokio::task::spawn_blocking(move || match write {
        PendingWrite::Save(blob) => backend.set(&key_owned, &blob),
        PendingWrite::Delete => backend.delete(&key_owned),
    })
    .await;

    match outcome {
        Ok(Ok(())) if is_delete => stats.deleted += 1,
        Ok(Ok(())) => stats.written += 1,
        Ok(Err(e)) => {
            stats.failed += 1;
            warn!(key, error = %e, "Persistence write failed, keeping in-memory state");
        }
        Err(e) => {
            stats.failed += 1;
            error!(key, error = %e, "Persistence write panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StorageError, StorageResult};
    use chrono::NaiveDate;

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Ok(None)
        }

        fn set(&self, key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable {
                key: key.to_string(),
                reason: "read-only".to_string(),
            })
        }

        fn delete(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }
    }

    fn state_named(name: &str) -> SessionState {
        let mut state = SessionState::new();
        state.set_user_name(name);
        state
    }

    #[tokio::test]
    async fn test_latest_snapshot_wins() {
        let backend = Arc::new(MemoryStore::new());
        let writer = WriteBehind::spawn(backend.clone(), "state");

        for name in ["a", "b", "c"] {
            writer.save(&state_named(name));
        }
        writer.flush().await;

        let blob = backend.get("state").unwrap().unwrap();
        assert!(blob.contains(r#""userName":"c""#));

        let stats = writer.shutdown().await;
        assert_eq!(stats.written + stats.superseded, 3);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_delete_after_save_is_ordered() {
        let backend = Arc::new(MemoryStore::new());
        let writer = WriteBehind::spawn(backend.clone(), "state");

        let classifier = crate::classifier::Classifier::default();
        let mut state = SessionState::new();
        let day = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        state.submit_reading(&classifier, day, 48.0).unwrap();

        writer.save(&state);
        writer.delete();
        writer.flush().await;
        assert_eq!(backend.get("state").unwrap(), None);

        writer.delete();
        writer.save(&state);
        writer.shutdown().await;
        assert!(backend.get("state").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_propagated() {
        let writer = WriteBehind::spawn(Arc::new(ReadOnlyStore), "state");
        writer.save(&state_named("x"));
        writer.flush().await;
        writer.save(&state_named("y"));

        let stats = writer.shutdown().await;
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.written, 0);
    }
}
