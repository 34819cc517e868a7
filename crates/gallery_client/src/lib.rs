use std::{sync::Arc, time::Duration};

use shared::domain::{GalleryCollection, SelectionSet, UploadBatch};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

mod backend;
pub mod error;
mod read_model;
pub mod status;

pub use backend::{GalleryBackend, HttpGalleryBackend};
pub use error::GalleryError;
pub use read_model::{GalleryReadModel, Refresh};

// Cosmetic preparation progress, one point per step.
const PREPARE_TARGET: u8 = 20;
const PREPARE_STEP: Duration = Duration::from_millis(50);
const COMPLETE_HOLD: Duration = Duration::from_millis(1000);
const RESET_DELAY: Duration = Duration::from_millis(2000);
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Upload,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    Idle,
    Preparing,
    InProgress,
    Complete,
    Error,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationState {
    pub status: OperationStatus,
    pub progress: u8,
    pub message: Option<String>,
    pub item_count: usize,
}

impl OperationState {
    fn idle() -> Self {
        Self {
            status: OperationStatus::Idle,
            progress: 0,
            message: None,
            item_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Skipped,
    Busy,
    Completed { affected: usize },
    Failed(GalleryError),
}

#[derive(Debug, Clone)]
pub enum GalleryEvent {
    Status {
        kind: OperationKind,
        state: OperationState,
    },
    CollectionChanged(GalleryCollection),
    SelectionChanged(SelectionSet),
    RefreshFailed(String),
}

struct CoordinatorState {
    active: Option<OperationKind>,
    upload: OperationState,
    delete: OperationState,
    upload_generation: u64,
    delete_generation: u64,
    selection: SelectionSet,
}

impl CoordinatorState {
    fn slot(&mut self, kind: OperationKind) -> &mut OperationState {
        match kind {
            OperationKind::Upload => &mut self.upload,
            OperationKind::Delete => &mut self.delete,
        }
    }

    fn generation(&mut self, kind: OperationKind) -> &mut u64 {
        match kind {
            OperationKind::Upload => &mut self.upload_generation,
            OperationKind::Delete => &mut self.delete_generation,
        }
    }

    fn begin(&mut self, kind: OperationKind) -> Option<u64> {
        if self.active.is_some() {
            return None;
        }
        self.active = Some(kind);
        let generation = self.generation(kind);
        *generation += 1;
        Some(*generation)
    }
}

/// Runs gallery uploads and deletes one at a time and keeps the read model
/// in step with the store. Failures end up in the status, never as `Err`.
pub struct GalleryCoordinator {
    backend: Arc<dyn GalleryBackend>,
    read_model: GalleryReadModel,
    state: Mutex<CoordinatorState>,
    events: broadcast::Sender<GalleryEvent>,
}

impl GalleryCoordinator {
    pub fn new(backend: Arc<dyn GalleryBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            read_model: GalleryReadModel::new(Arc::clone(&backend)),
            backend,
            state: Mutex::new(CoordinatorState {
                active: None,
                upload: OperationState::idle(),
                delete: OperationState::idle(),
                upload_generation: 0,
                delete_generation: 0,
                selection: SelectionSet::default(),
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<GalleryEvent> {
        self.events.subscribe()
    }

    pub async fn collection(&self) -> GalleryCollection {
        self.read_model.collection().await
    }

    pub async fn status(&self, kind: OperationKind) -> OperationState {
        self.state.lock().await.slot(kind).clone()
    }

    pub async fn is_busy(&self) -> bool {
        self.state.lock().await.active.is_some()
    }

    pub async fn refresh(&self) -> Result<Refresh, GalleryError> {
        match self.read_model.refresh().await {
            Ok(Refresh::Applied(collection)) => {
                let _ = self
                    .events
                    .send(GalleryEvent::CollectionChanged(collection.clone()));
                Ok(Refresh::Applied(collection))
            }
            Ok(Refresh::Stale) => Ok(Refresh::Stale),
            Err(err) => {
                warn!(error = %err, "gallery refresh failed");
                let _ = self.events.send(GalleryEvent::RefreshFailed(err.to_string()));
                Err(err)
            }
        }
    }

    pub async fn selection(&self) -> SelectionSet {
        self.state.lock().await.selection.clone()
    }

    pub async fn select(&self, url: &str) -> bool {
        let collection = self.read_model.collection().await;
        self.update_selection(|selection| selection.select(&collection, url))
            .await
    }

    pub async fn deselect(&self, url: &str) -> bool {
        self.update_selection(|selection| selection.deselect(url)).await
    }

    pub async fn toggle(&self, url: &str) -> bool {
        let collection = self.read_model.collection().await;
        self.update_selection(|selection| {
            let before = selection.contains(url);
            selection.toggle(&collection, url) != before
        })
        .await;
        self.state.lock().await.selection.contains(url)
    }

    pub async fn select_all(&self) {
        let collection = self.read_model.collection().await;
        self.update_selection(|selection| {
            let before = selection.len();
            selection.select_all(&collection);
            selection.len() != before
        })
        .await;
    }

    pub async fn clear_selection(&self) {
        self.update_selection(|selection| {
            let changed = !selection.is_empty();
            selection.clear();
            changed
        })
        .await;
    }

    async fn update_selection(
        &self,
        change: impl FnOnce(&mut SelectionSet) -> bool,
    ) -> bool {
        let mut state = self.state.lock().await;
        let changed = change(&mut state.selection);
        if changed {
            let _ = self
                .events
                .send(GalleryEvent::SelectionChanged(state.selection.clone()));
        }
        changed
    }

    /// The status falls back to `Idle` two seconds after the operation ends,
    /// unless another upload has started by then.
    pub async fn upload(self: &Arc<Self>, batch: UploadBatch) -> OperationOutcome {
        if batch.is_empty() {
            return OperationOutcome::Skipped;
        }
        let item_count = batch.len();
        let Some(generation) = self.state.lock().await.begin(OperationKind::Upload) else {
            debug!("upload ignored while another operation is active");
            return OperationOutcome::Busy;
        };
        info!(files = item_count, "gallery upload started");

        self.set_status(
            OperationKind::Upload,
            OperationStatus::Preparing,
            0,
            None,
            item_count,
        )
        .await;
        for progress in 1..=PREPARE_TARGET {
            time::sleep(PREPARE_STEP).await;
            self.set_progress(OperationKind::Upload, progress).await;
        }
        self.set_status(
            OperationKind::Upload,
            OperationStatus::InProgress,
            PREPARE_TARGET,
            None,
            item_count,
        )
        .await;

        let outcome = match self.backend.upload(batch).await {
            Ok(()) => {
                info!(files = item_count, "gallery upload complete");
                self.set_status(
                    OperationKind::Upload,
                    OperationStatus::Complete,
                    100,
                    None,
                    item_count,
                )
                .await;
                time::sleep(COMPLETE_HOLD).await;
                let _ = self.refresh().await;
                OperationOutcome::Completed {
                    affected: item_count,
                }
            }
            Err(err) => {
                warn!(error = %err, files = item_count, "gallery upload failed");
                self.fail(OperationKind::Upload, &err, item_count).await;
                OperationOutcome::Failed(err)
            }
        };

        self.finish().await;
        self.schedule_reset(OperationKind::Upload, generation);
        outcome
    }

    // The selection is cleared only when the batch succeeds.
    pub async fn delete_selected(self: &Arc<Self>) -> OperationOutcome {
        let (urls, generation) = {
            let mut state = self.state.lock().await;
            if state.selection.is_empty() {
                return OperationOutcome::Skipped;
            }
            let urls = state.selection.urls();
            let Some(generation) = state.begin(OperationKind::Delete) else {
                debug!("delete ignored while another operation is active");
                return OperationOutcome::Busy;
            };
            (urls, generation)
        };
        let item_count = urls.len();
        info!(selected = item_count, "gallery delete started");

        self.set_status(
            OperationKind::Delete,
            OperationStatus::InProgress,
            0,
            None,
            item_count,
        )
        .await;

        let outcome = match self.backend.delete(urls).await {
            Ok(deleted) => {
                info!(deleted, selected = item_count, "gallery delete complete");
                self.set_status(
                    OperationKind::Delete,
                    OperationStatus::Complete,
                    100,
                    None,
                    item_count,
                )
                .await;
                time::sleep(COMPLETE_HOLD).await;
                let _ = self.refresh().await;
                self.clear_selection().await;
                OperationOutcome::Completed { affected: deleted }
            }
            Err(err) => {
                warn!(error = %err, selected = item_count, "gallery delete failed");
                self.fail(OperationKind::Delete, &err, item_count).await;
                OperationOutcome::Failed(err)
            }
        };

        self.finish().await;
        self.schedule_reset(OperationKind::Delete, generation);
        outcome
    }

    pub fn spawn_reconciliation(self: &Arc<Self>, every: Duration) -> ReconciliationHandle {
        let coordinator = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                // The operation refreshes on its own when it ends.
                if coordinator.is_busy().await {
                    debug!("skipping gallery reconciliation during an operation");
                    continue;
                }
                let _ = coordinator.refresh().await;
            }
        });
        ReconciliationHandle { task }
    }

    async fn set_status(
        &self,
        kind: OperationKind,
        status: OperationStatus,
        progress: u8,
        message: Option<String>,
        item_count: usize,
    ) {
        let mut state = self.state.lock().await;
        let slot = state.slot(kind);
        *slot = OperationState {
            status,
            progress,
            message,
            item_count,
        };
        let _ = self.events.send(GalleryEvent::Status {
            kind,
            state: slot.clone(),
        });
    }

    async fn set_progress(&self, kind: OperationKind, progress: u8) {
        let mut state = self.state.lock().await;
        let slot = state.slot(kind);
        if progress <= slot.progress {
            return;
        }
        slot.progress = progress;
        let _ = self.events.send(GalleryEvent::Status {
            kind,
            state: slot.clone(),
        });
    }

    async fn fail(&self, kind: OperationKind, err: &GalleryError, item_count: usize) {
        let progress = self.state.lock().await.slot(kind).progress;
        self.set_status(
            kind,
            OperationStatus::Error,
            progress,
            Some(err.to_string()),
            item_count,
        )
        .await;
    }

    async fn finish(&self) {
        self.state.lock().await.active = None;
    }

    fn schedule_reset(self: &Arc<Self>, kind: OperationKind, generation: u64) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            time::sleep(RESET_DELAY).await;
            let mut state = coordinator.state.lock().await;
            if *state.generation(kind) != generation {
                debug!(?kind, "status reset skipped; a newer operation owns the display");
                return;
            }
            let slot = state.slot(kind);
            if !slot.status.is_terminal() {
                return;
            }
            *slot = OperationState::idle();
            let _ = coordinator.events.send(GalleryEvent::Status {
                kind,
                state: slot.clone(),
            });
        });
    }
}

/// Dropping it stops the reconciliation task.
pub struct ReconciliationHandle {
    task: JoinHandle<()>,
}

impl Drop for ReconciliationHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
