use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::cache::{CollectionSource, Generation, Record, RemoteCollectionCache};

/// Server-side write operations for one record type.
#[async_trait]
pub trait RecordStore<T>: Send + Sync {
    type Create: Send + Sync;
    type Update: Send + Sync;

    async fn create(&self, request: &Self::Create) -> Result<T, ApiError>;
    async fn update(&self, id: &str, request: &Self::Update) -> Result<T, ApiError>;
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}

/// Where a record stands relative to the server after a local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    /// The server has acknowledged the last create or update.
    Confirmed,
    /// Applied locally; the server call has not resolved yet.
    PendingLocal,
    /// The server rejected the mutation and the cache was re-fetched.
    RolledBack,
}

/// Local-first deletes and confirm-then-merge creates/updates over a
/// collection cache.
pub struct OptimisticMutator<T: Record, S> {
    cache: Arc<RemoteCollectionCache<T>>,
    store: S,
    source: Arc<dyn CollectionSource<T>>,
    states: Mutex<HashMap<String, MutationState>>,
}

impl<T: Record, S: RecordStore<T>> OptimisticMutator<T, S> {
    pub fn new(
        cache: Arc<RemoteCollectionCache<T>>,
        store: S,
        source: Arc<dyn CollectionSource<T>>,
    ) -> Self {
        Self {
            cache,
            store,
            source,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<RemoteCollectionCache<T>> {
        &self.cache
    }

    pub fn state_of(&self, id: &str) -> Option<MutationState> {
        let states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states.get(id).copied()
    }

    /// Wait for the server, then merge the created record.
    pub async fn create(&self, request: &S::Create) -> Result<T, ApiError> {
        let generation = self.cache.generation();
        let record = self.store.create(request).await?;
        if self.cache.upsert_in(generation, record.clone()) {
            self.set_state(record.id(), MutationState::Confirmed);
        }
        Ok(record)
    }

    /// Wait for the server, then merge the updated record.
    pub async fn update(&self, id: &str, request: &S::Update) -> Result<T, ApiError> {
        let generation = self.cache.generation();
        let record = self.store.update(id, request).await?;
        if self.cache.upsert_in(generation, record.clone()) {
            self.set_state(id, MutationState::Confirmed);
        }
        Ok(record)
    }

    /// First phase of a delete: drop the record from the cache now.
    ///
    /// Nothing is sent until the returned `PendingDelete` is committed.
    pub fn begin_delete(&self, id: &str) -> PendingDelete<'_, T, S> {
        let generation = self.cache.generation();
        let removed = self.cache.remove(id);
        self.set_state(id, MutationState::PendingLocal);
        debug!(cache = self.cache.name(), id = id, "Removed locally, delete pending");
        PendingDelete {
            mutator: self,
            id: id.to_string(),
            removed,
            generation,
        }
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.begin_delete(id).commit().await
    }

    fn set_state(&self, id: &str, state: MutationState) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states.insert(id.to_string(), state);
    }

    fn forget_state(&self, id: &str) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states.remove(id);
    }

    pub fn clear(&self) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// A delete that has been applied locally but not yet sent.
#[must_use = "the server delete is only issued on commit()"]
pub struct PendingDelete<'a, T: Record, S> {
    mutator: &'a OptimisticMutator<T, S>,
    id: String,
    removed: Option<T>,
    generation: Generation,
}

impl<T: Record, S: RecordStore<T>> PendingDelete<'_, T, S> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The record that was taken out of the cache, if it was cached.
    pub fn removed(&self) -> Option<&T> {
        self.removed.as_ref()
    }

    /// Issue the server delete. On failure the whole collection is
    /// re-fetched and the original error is returned.
    ///
    /// An acknowledged delete leaves no state behind for the id. If the cache
    /// was cleared in the meantime, the outcome is not recorded.
    pub async fn commit(self) -> Result<(), ApiError> {
        let mutator = self.mutator;
        let result = mutator.store.delete(&self.id).await;
        if mutator.cache.generation() != self.generation {
            debug!(cache = mutator.cache.name(), id = %self.id, "Cache cleared during delete");
            return result;
        }
        match result {
            Ok(()) => {
                mutator.forget_state(&self.id);
                Ok(())
            }
            Err(e) => {
                warn!(
                    cache = mutator.cache.name(),
                    id = %self.id,
                    error = %e,
                    "Delete failed, refreshing"
                );
                mutator.set_state(&self.id, MutationState::RolledBack);
                if let Err(refresh_err) = mutator.cache.refresh(mutator.source.as_ref()).await {
                    warn!(error = %refresh_err, "Refresh after failed delete also failed");
                }
                Err(e)
            }
        }
    }
}
