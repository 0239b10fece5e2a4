//! In-memory caches for remote data.
//!
//! This module provides:
//! - `RemoteCollectionCache`: last-known-good copy of items or events
//! - `SignedUrlResolver`: TTL cache of time-limited image URLs
//! - `ScheduleCache` / `Schedules`: weekly plans keyed by week start
//! - `ProfileCache`: the signed-in user's profile
//!
//! Nothing here survives a restart. Every cache is owned by the session and
//! reset through `clear()` at sign-out.

pub mod collection;
pub mod entry;
pub mod profile;
pub mod schedule;
pub mod signed_urls;

pub use collection::{CollectionSource, Generation, Record, RemoteCollectionCache, Snapshot};
pub use entry::{age_display, system_clock, CacheEntry, Clock};
pub use profile::ProfileCache;
pub use schedule::{week_key, week_start, ScheduleCache, Schedules};
pub use signed_urls::{ImageMount, MountState, SignedUrlResolver};
