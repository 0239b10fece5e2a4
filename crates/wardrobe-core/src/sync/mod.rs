//! Controllers that keep the caches in step with the backend.
//!
//! - `PaginatedFetcher`: page-by-page item loading with id dedup
//! - `PollingController`: background refresh with a circuit breaker
//! - `OptimisticMutator`: local-first deletes, confirm-then-merge writes
//! - `BulkUploadCoordinator`: concurrent, independently failing uploads
//! - `RefreshHub`: parent-triggered refresh via subscribe/unsubscribe

pub mod mutation;
pub mod observer;
pub mod pagination;
pub mod polling;
pub mod sources;
pub mod upload;

pub use mutation::{MutationState, OptimisticMutator, PendingDelete, RecordStore};
pub use observer::{RefreshHub, RefreshListener, Subscription};
pub use pagination::{PageCursor, PaginatedFetcher};
pub use polling::{PollConfig, PollHandle, PollStatus, PollingController, CONNECTION_FAILED_MESSAGE};
pub use sources::{EventSource, EventStore, ItemStore};
pub use upload::{BulkUploadCoordinator, UploadCounts, UploadQueueError, UploadQueueItem, UploadStatus};
