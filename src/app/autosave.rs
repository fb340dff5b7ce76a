//! Debounced background snapshot writer
//!
//! The editor hands every committed state to the worker; the worker writes
//! the latest one once the editor has been quiet for the debounce period.
//! A state whose write failed is kept until a newer one arrives, so the
//! next flush retries it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::errors::DomainError;
use crate::domain::model::Draft;
use crate::ports::{DraftStorePort, FeedbackPort};

/// Quiet period unless configured otherwise
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(600);

enum Command {
    Snapshot(Box<Draft>),
    Flush(oneshot::Sender<Result<(), DomainError>>),
}

/// Handle to a running autosave task
pub struct AutosaveWorker {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl AutosaveWorker {
    /// Start the worker on the current tokio runtime
    pub fn spawn(
        store: Arc<dyn DraftStorePort>,
        feedback: Arc<dyn FeedbackPort>,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(rx, store, feedback, debounce));
        Self { tx, task }
    }

    /// Queue `draft` as the latest state; restarts the quiet period
    pub fn schedule(&self, draft: Draft) {
        if self.tx.send(Command::Snapshot(Box::new(draft))).is_err() {
            warn!("Autosave worker has stopped; snapshot not queued");
        }
    }

    /// Write the latest queued state now and wait for the result
    pub async fn flush(&self) -> Result<(), DomainError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Command::Flush(ack))
            .map_err(|_| DomainError::InternalError("Autosave worker has stopped".to_string()))?;
        done.await
            .map_err(|_| DomainError::InternalError("Autosave worker dropped the flush".to_string()))?
    }

    /// Flush, then stop the worker
    pub async fn shutdown(self) -> Result<(), DomainError> {
        let result = self.flush().await;
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Autosave worker ended abnormally");
        }
        result
    }
}

async fn write(
    store: &dyn DraftStorePort,
    feedback: &dyn FeedbackPort,
    draft: &Draft,
) -> Result<(), DomainError> {
    match store.save_snapshot(draft).await {
        Ok(()) => {
            debug!(draft_id = %draft.id, "Autosaved");
            Ok(())
        }
        Err(e) => {
            warn!(draft_id = %draft.id, error = %e, "Autosave failed");
            feedback.persistence_failed(&draft.id, &e);
            Err(e)
        }
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Command>,
    store: Arc<dyn DraftStorePort>,
    feedback: Arc<dyn FeedbackPort>,
    debounce: Duration,
) {
    let mut pending: Option<Box<Draft>> = None;
    // Latest state whose write failed; retried by the next flush unless superseded
    let mut unsaved: Option<Box<Draft>> = None;
    loop {
        let command = if pending.is_some() {
            tokio::select! {
                command = rx.recv() => command,
                _ = tokio::time::sleep(debounce) => {
                    if let Some(draft) = pending.take() {
                        if write(store.as_ref(), feedback.as_ref(), &draft).await.is_err() {
                            unsaved = Some(draft);
                        }
                    }
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match command {
            Some(Command::Snapshot(draft)) => {
                unsaved = None;
                pending = Some(draft);
            }
            Some(Command::Flush(ack)) => {
                let result = match pending.take().or_else(|| unsaved.take()) {
                    Some(draft) => {
                        let result = write(store.as_ref(), feedback.as_ref(), &draft).await;
                        if result.is_err() {
                            unsaved = Some(draft);
                        }
                        result
                    }
                    None => Ok(()),
                };
                let _ = ack.send(result);
            }
            None => {
                // Every handle is gone; keep the last state rather than lose it
                if let Some(draft) = pending.take().or_else(|| unsaved.take()) {
                    let _ = write(store.as_ref(), feedback.as_ref(), &draft).await;
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::RecordingFeedback;
    use crate::adapters::tracing_feedback::FeedbackEvent;
    use crate::domain::model::{DraftId, MediaAsset};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        saves: Mutex<Vec<Draft>>,
        failures_left: Mutex<usize>,
    }

    impl MemoryStore {
        fn failing(times: usize) -> Self {
            Self {
                failures_left: Mutex::new(times),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl DraftStorePort for MemoryStore {
        async fn save_snapshot(&self, draft: &Draft) -> Result<(), DomainError> {
            {
                let mut failures_left = self.failures_left.lock().unwrap();
                if *failures_left > 0 {
                    *failures_left -= 1;
                    return Err(DomainError::PersistenceError("disk full".to_string()));
                }
            }
            self.saves.lock().unwrap().push(draft.clone());
            Ok(())
        }
        async fn load_draft(&self, _id: &DraftId) -> Result<Option<Draft>, DomainError> {
            Ok(None)
        }
        async fn delete_draft(&self, _id: &DraftId) -> Result<(), DomainError> {
            Ok(())
        }
        async fn list_drafts(&self) -> Result<Vec<DraftId>, DomainError> {
            Ok(Vec::new())
        }
    }

    fn titled(title: &str) -> Draft {
        Draft::new(MediaAsset::new("/v.mp4", 10.0, 30.0), title)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_collapse_into_one_write() {
        let store = Arc::new(MemoryStore::default());
        let worker = AutosaveWorker::spawn(store.clone(), Arc::new(RecordingFeedback::new()), DEFAULT_DEBOUNCE);

        for title in ["a", "b", "c"] {
            worker.schedule(titled(title));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(store.saves.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(700)).await;
        let saves = store.saves.lock().unwrap().clone();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].timeline.title, "c");
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let store = Arc::new(MemoryStore::default());
        let worker = AutosaveWorker::spawn(store.clone(), Arc::new(RecordingFeedback::new()), DEFAULT_DEBOUNCE);

        worker.schedule(titled("latest"));
        worker.flush().await.unwrap();
        assert_eq!(store.saves.lock().unwrap().len(), 1);

        // Nothing pending: a second flush writes nothing
        worker.flush().await.unwrap();
        worker.shutdown().await.unwrap();
        assert_eq!(store.saves.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_reaches_feedback() {
        let store = Arc::new(MemoryStore::failing(usize::MAX));
        let feedback = Arc::new(RecordingFeedback::new());
        let worker = AutosaveWorker::spawn(store, feedback.clone(), DEFAULT_DEBOUNCE);

        let draft = titled("x");
        worker.schedule(draft.clone());
        assert!(worker.flush().await.is_err());
        assert!(matches!(
            feedback.events().as_slice(),
            [FeedbackEvent::PersistenceFailed { draft_id, .. }] if draft_id == &draft.id
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_debounced_write_is_retried_on_shutdown() {
        let store = Arc::new(MemoryStore::failing(1));
        let worker = AutosaveWorker::spawn(store.clone(), Arc::new(RecordingFeedback::new()), DEFAULT_DEBOUNCE);

        worker.schedule(titled("final"));
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(store.saves.lock().unwrap().is_empty());

        worker.shutdown().await.unwrap();
        let saves = store.saves.lock().unwrap().clone();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].timeline.title, "final");
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_reaches_flush_caller() {
        let store = Arc::new(MemoryStore::failing(2));
        let worker = AutosaveWorker::spawn(store.clone(), Arc::new(RecordingFeedback::new()), DEFAULT_DEBOUNCE);

        worker.schedule(titled("final"));
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(worker.flush().await.is_err());

        // The state is still held and a later flush succeeds
        worker.flush().await.unwrap();
        assert_eq!(store.saves.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_snapshot_supersedes_failed_write() {
        let store = Arc::new(MemoryStore::failing(1));
        let worker = AutosaveWorker::spawn(store.clone(), Arc::new(RecordingFeedback::new()), DEFAULT_DEBOUNCE);

        worker.schedule(titled("old"));
        tokio::time::sleep(Duration::from_millis(800)).await;
        worker.schedule(titled("new"));
        worker.flush().await.unwrap();
        worker.flush().await.unwrap();

        let saves = store.saves.lock().unwrap().clone();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].timeline.title, "new");
    }
}
