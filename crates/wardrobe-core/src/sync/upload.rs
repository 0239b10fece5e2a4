use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{CreateItemRequest, ImageSource, WardrobeItem};

use super::mutation::OptimisticMutator;
use super::sources::ItemStore;

const QUEUE_ID_LEN: usize = 9;
const QUEUE_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadQueueError {
    #[error("Too many images selected: {selected} (limit {limit})")]
    TooMany { selected: usize, limit: usize },

    #[error("Uploads are already running")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Uploading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadQueueItem {
    pub id: String,
    pub image: ImageSource,
    pub status: UploadStatus,
    pub result: Option<WardrobeItem>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Uploads a batch of images as independent item creations.
///
/// One failing upload never affects the others; failed entries stay in the
/// queue until retried or cleared.
pub struct BulkUploadCoordinator {
    mutator: Arc<OptimisticMutator<WardrobeItem, ItemStore>>,
    queue: Mutex<Vec<UploadQueueItem>>,
    limit: usize,
}

impl BulkUploadCoordinator {
    pub fn new(mutator: Arc<OptimisticMutator<WardrobeItem, ItemStore>>, limit: usize) -> Self {
        Self {
            mutator,
            queue: Mutex::new(Vec::new()),
            limit,
        }
    }

    pub fn queue(&self) -> Vec<UploadQueueItem> {
        self.lock().clone()
    }

    /// Replace the queue with one pending entry per image.
    pub fn initialize_queue(&self, images: Vec<ImageSource>) -> Result<(), UploadQueueError> {
        if images.len() > self.limit {
            return Err(UploadQueueError::TooMany {
                selected: images.len(),
                limit: self.limit,
            });
        }
        let mut queue = self.lock();
        if queue.iter().any(|q| q.status == UploadStatus::Uploading) {
            return Err(UploadQueueError::Busy);
        }
        *queue = images
            .into_iter()
            .map(|image| UploadQueueItem {
                id: queue_id(),
                image,
                status: UploadStatus::Pending,
                result: None,
                error: None,
            })
            .collect();
        Ok(())
    }

    /// Upload every pending entry concurrently and wait for all of them.
    pub async fn start_uploads(&self) -> UploadCounts {
        let ids: Vec<String> = self
            .lock()
            .iter()
            .filter(|q| q.status == UploadStatus::Pending)
            .map(|q| q.id.clone())
            .collect();
        self.run(ids).await;
        self.counts()
    }

    /// Move every failed entry back to pending and upload them again.
    pub async fn retry_failed(&self) -> UploadCounts {
        {
            let mut queue = self.lock();
            for entry in queue.iter_mut().filter(|q| q.status == UploadStatus::Error) {
                entry.status = UploadStatus::Pending;
                entry.error = None;
            }
        }
        self.start_uploads().await
    }

    /// Retry a single entry. Returns `false` if it is not in the error state.
    pub async fn retry_one(&self, id: &str) -> bool {
        {
            let mut queue = self.lock();
            match queue
                .iter_mut()
                .find(|q| q.id == id && q.status == UploadStatus::Error)
            {
                Some(entry) => {
                    entry.status = UploadStatus::Pending;
                    entry.error = None;
                }
                None => return false,
            }
        }
        self.run(vec![id.to_string()]).await;
        true
    }

    /// True once no entry is pending or uploading.
    pub fn is_complete(&self) -> bool {
        self.lock()
            .iter()
            .all(|q| matches!(q.status, UploadStatus::Success | UploadStatus::Error))
    }

    pub fn is_uploading(&self) -> bool {
        self.lock()
            .iter()
            .any(|q| q.status == UploadStatus::Uploading)
    }

    pub fn counts(&self) -> UploadCounts {
        let queue = self.lock();
        UploadCounts {
            total: queue.len(),
            succeeded: queue
                .iter()
                .filter(|q| q.status == UploadStatus::Success)
                .count(),
            failed: queue
                .iter()
                .filter(|q| q.status == UploadStatus::Error)
                .count(),
        }
    }

    pub fn clear_queue(&self) {
        self.lock().clear();
    }

    async fn run(&self, ids: Vec<String>) {
        let jobs: Vec<(String, CreateItemRequest)> = {
            let mut queue = self.lock();
            queue
                .iter_mut()
                .filter(|q| ids.contains(&q.id) && q.status == UploadStatus::Pending)
                .map(|q| {
                    q.status = UploadStatus::Uploading;
                    (q.id.clone(), CreateItemRequest::from_image(q.image.clone()))
                })
                .collect()
        };
        if jobs.is_empty() {
            return;
        }

        info!(count = jobs.len(), "Starting uploads");
        join_all(jobs.iter().map(|(id, request)| self.upload_one(id, request))).await;
    }

    async fn upload_one(&self, id: &str, request: &CreateItemRequest) {
        let result = self.mutator.create(request).await;

        let mut queue = self.lock();
        let Some(entry) = queue.iter_mut().find(|q| q.id == id) else {
            // Queue was cleared mid-upload.
            return;
        };
        match result {
            Ok(item) => {
                entry.status = UploadStatus::Success;
                entry.result = Some(item);
            }
            Err(e) => {
                warn!(file = %entry.image.file_name, error = %e, "Upload failed");
                entry.status = UploadStatus::Error;
                entry.error = Some(e.to_string());
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UploadQueueItem>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn queue_id() -> String {
    let mut rng = rand::thread_rng();
    (0..QUEUE_ID_LEN)
        .map(|_| QUEUE_ID_CHARSET[rng.gen_range(0..QUEUE_ID_CHARSET.len())] as char)
        .collect()
}
