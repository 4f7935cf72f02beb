//! Draft snapshots and the autosave timer
//!
//! Every snapshot serializes the current answers and overwrites the single
//! draft record of the form. Snapshot failures are logged and swallowed so
//! that losing the safety net never blocks composing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use veilform_core::{Answers, FormId};
use veilform_storage::{Draft, DraftStore, StorageResult};

/// Shortest autosave period; shorter requests are raised to it
pub const MIN_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(1);

/// Writes the answers of one session to its draft record
pub struct DraftSnapshotter {
    form_id: FormId,
    answers: Arc<RwLock<Answers>>,
    drafts: Arc<dyn DraftStore>,
    /// Serializes snapshots against discard
    write_lock: Mutex<()>,
    discarded: AtomicBool,
    snapshots: AtomicU64,
}

impl std::fmt::Debug for DraftSnapshotter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftSnapshotter")
            .field("form_id", &self.form_id)
            .field("discarded", &self.discarded.load(Ordering::Relaxed))
            .field("snapshots", &self.snapshots.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl DraftSnapshotter {
    /// Create a snapshotter for one form
    pub fn new(
        form_id: FormId,
        answers: Arc<RwLock<Answers>>,
        drafts: Arc<dyn DraftStore>,
    ) -> Self {
        Self {
            form_id,
            answers,
            drafts,
            write_lock: Mutex::new(()),
            discarded: AtomicBool::new(false),
            snapshots: AtomicU64::new(0),
        }
    }

    /// Save the current answers
    ///
    /// Returns `Ok(false)` without writing once the draft was discarded.
    pub async fn snapshot(&self) -> StorageResult<bool> {
        let _write = self.write_lock.lock().await;
        if self.discarded.load(Ordering::Acquire) {
            return Ok(false);
        }

        let answers = self.answers.read().await.clone();
        self.drafts
            .save(&Draft::new(self.form_id.clone(), answers))
            .await?;
        self.snapshots.fetch_add(1, Ordering::Relaxed);
        trace!(form_id = %self.form_id, "Draft snapshot saved");
        Ok(true)
    }

    /// Save the current answers, logging and swallowing failures
    pub async fn snapshot_or_warn(&self) {
        if let Err(e) = self.snapshot().await {
            warn!(form_id = %self.form_id, error = %e, "Draft snapshot failed");
        }
    }

    /// Delete the draft and refuse later snapshots
    pub async fn discard(&self) -> StorageResult<()> {
        let _write = self.write_lock.lock().await;
        self.discarded.store(true, Ordering::Release);
        self.drafts.delete(&self.form_id).await
    }

    /// Number of snapshots written
    pub fn snapshot_count(&self) -> u64 {
        self.snapshots.load(Ordering::Relaxed)
    }
}

/// Background task snapshotting a draft at a fixed interval
pub struct AutosaveTask {
    snapshotter: Arc<DraftSnapshotter>,
    interval: Duration,
    shutdown_rx: broadcast::Receiver<()>,
}

impl AutosaveTask {
    /// Spawn the autosave task
    ///
    /// The first snapshot happens one full interval after spawning. The
    /// interval is raised to [`MIN_AUTOSAVE_INTERVAL`] if shorter.
    pub fn spawn(snapshotter: Arc<DraftSnapshotter>, interval: Duration) -> AutosaveHandle {
        if interval < MIN_AUTOSAVE_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "Autosave interval below minimum, using {:?}", MIN_AUTOSAVE_INTERVAL
            );
        }
        let interval = interval.max(MIN_AUTOSAVE_INTERVAL);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = Self {
            snapshotter,
            interval,
            shutdown_rx,
        };
        let join = tokio::spawn(async move {
            task.run().await;
        });
        AutosaveHandle {
            shutdown_tx,
            join: Some(join),
        }
    }

    async fn run(mut self) {
        debug!(
            form_id = %self.snapshotter.form_id,
            interval_ms = self.interval.as_millis() as u64,
            "Autosave started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    debug!(form_id = %self.snapshotter.form_id, "Autosave shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.snapshotter.snapshot_or_warn().await;
                }
            }
        }
    }
}

/// Handle to a running autosave task
///
/// Dropping the handle aborts the task.
#[derive(Debug)]
pub struct AutosaveHandle {
    shutdown_tx: broadcast::Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl AutosaveHandle {
    /// Signal shutdown and wait for an in-progress snapshot to finish
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Autosave task ended abnormally");
                }
            }
        }
        info!("Autosave stopped");
    }

    /// Whether the task is still running
    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use veilform_storage::{DraftQuota, InMemoryDraftStore};

    use super::*;

    fn snapshotter(store: Arc<dyn DraftStore>) -> (Arc<RwLock<Answers>>, Arc<DraftSnapshotter>) {
        let answers = Arc::new(RwLock::new(Answers::new()));
        let snapshotter = Arc::new(DraftSnapshotter::new(
            FormId::new("form-1"),
            Arc::clone(&answers),
            store,
        ));
        (answers, snapshotter)
    }

    #[tokio::test]
    async fn test_snapshot_overwrites_single_record() {
        let store = Arc::new(InMemoryDraftStore::new());
        let (answers, snapshotter) = snapshotter(store.clone());

        answers.write().await.insert("q1".into(), json!("a"));
        assert!(snapshotter.snapshot().await.unwrap());
        answers.write().await.insert("q1".into(), json!("b"));
        assert!(snapshotter.snapshot().await.unwrap());

        assert_eq!(store.len(), 1);
        let draft = store.load(&FormId::new("form-1")).await.unwrap().unwrap();
        assert_eq!(draft.answers.get("q1"), Some(&json!("b")));
        assert_eq!(snapshotter.snapshot_count(), 2);
    }

    #[tokio::test]
    async fn test_discard_blocks_later_snapshots() {
        let store = Arc::new(InMemoryDraftStore::new());
        let (_answers, snapshotter) = snapshotter(store.clone());

        snapshotter.snapshot().await.unwrap();
        snapshotter.discard().await.unwrap();
        assert!(!snapshotter.snapshot().await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_swallowed() {
        let quota = DraftQuota::new(8, 10);
        let store = Arc::new(InMemoryDraftStore::with_quota(quota));
        let (answers, snapshotter) = snapshotter(store.clone());

        answers
            .write()
            .await
            .insert("q1".into(), json!("far more than eight bytes"));
        assert!(snapshotter.snapshot().await.is_err());
        snapshotter.snapshot_or_warn().await;
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_skips_first_tick() {
        let store = Arc::new(InMemoryDraftStore::new());
        let (_answers, snapshotter) = snapshotter(store.clone());

        let handle = AutosaveTask::spawn(Arc::clone(&snapshotter), Duration::from_secs(30));
        tokio::task::yield_now().await;
        assert_eq!(snapshotter.snapshot_count(), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(snapshotter.snapshot_count(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(snapshotter.snapshot_count(), 2);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(snapshotter.snapshot_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        let store = Arc::new(InMemoryDraftStore::new());
        let (_answers, snapshotter) = snapshotter(store);

        let handle = AutosaveTask::spawn(Arc::clone(&snapshotter), Duration::ZERO);
        tokio::task::yield_now().await;
        assert!(handle.is_running());
        assert_eq!(snapshotter.snapshot_count(), 0);

        tokio::time::sleep(MIN_AUTOSAVE_INTERVAL + Duration::from_millis(10)).await;
        assert!(handle.is_running());
        assert_eq!(snapshotter.snapshot_count(), 1);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_aborts_task() {
        let store = Arc::new(InMemoryDraftStore::new());
        let (_answers, snapshotter) = snapshotter(store);

        let handle = AutosaveTask::spawn(Arc::clone(&snapshotter), Duration::from_secs(10));
        assert!(handle.is_running());
        drop(handle);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(snapshotter.snapshot_count(), 0);
    }
}
