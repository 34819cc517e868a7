use std::sync::Arc;

use shared::domain::GalleryCollection;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{backend::GalleryBackend, error::GalleryError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh {
    Applied(GalleryCollection),
    Stale,
}

struct ReadModelState {
    collection: GalleryCollection,
    issued: u64,
    applied: u64,
}

// Listings are numbered when requested and only applied when newer than the
// last applied one.
pub struct GalleryReadModel {
    backend: Arc<dyn GalleryBackend>,
    state: Mutex<ReadModelState>,
}

impl GalleryReadModel {
    pub fn new(backend: Arc<dyn GalleryBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(ReadModelState {
                collection: GalleryCollection::default(),
                issued: 0,
                applied: 0,
            }),
        }
    }

    pub async fn collection(&self) -> GalleryCollection {
        self.state.lock().await.collection.clone()
    }

    pub async fn refresh(&self) -> Result<Refresh, GalleryError> {
        let seq = {
            let mut state = self.state.lock().await;
            state.issued += 1;
            state.issued
        };

        let urls = self.backend.list().await?;

        let mut state = self.state.lock().await;
        if seq <= state.applied {
            debug!(seq, applied = state.applied, "discarding stale gallery listing");
            return Ok(Refresh::Stale);
        }
        state.applied = seq;
        state.collection = GalleryCollection::from_urls(urls);
        debug!(seq, count = state.collection.len(), "gallery listing applied");
        Ok(Refresh::Applied(state.collection.clone()))
    }
}
