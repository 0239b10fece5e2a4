use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::ApiError;

use super::entry::{system_clock, Clock};

/// An entity with a stable server-assigned id.
pub trait Record: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    /// Canonical cache order. `Equal` everywhere keeps server order.
    fn canonical_cmp(&self, _other: &Self) -> Ordering {
        Ordering::Equal
    }
}

/// Where an authoritative copy of a collection comes from.
#[async_trait]
pub trait CollectionSource<T>: Send + Sync {
    async fn fetch(&self) -> Result<Vec<T>, ApiError>;
}

/// Point-in-time view of a collection cache.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub records: Arc<Vec<T>>,
    /// Whether any refresh has ever succeeded. An empty, loaded collection is
    /// a genuinely empty one; an empty, unloaded one is still loading.
    pub loaded: bool,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub revision: u64,
}

impl<T: Record> Snapshot<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.id().to_string()).collect()
    }
}

/// Identifies the session a write was issued in. `clear()` starts a new
/// one, and writes tagged with an older generation are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

struct CollectionState<T> {
    records: Arc<Vec<T>>,
    loaded: bool,
    refreshed_at: Option<DateTime<Utc>>,
    revision: u64,
    generation: u64,
}

/// Session-scoped, last-known-good copy of a remote collection.
///
/// Reads never wait on the network. Every write bumps a revision counter
/// published on `changes()`.
pub struct RemoteCollectionCache<T: Record> {
    name: &'static str,
    state: RwLock<CollectionState<T>>,
    changes: watch::Sender<u64>,
    clock: Clock,
}

impl<T: Record> RemoteCollectionCache<T> {
    pub fn new(name: &'static str) -> Self {
        Self::with_clock(name, system_clock())
    }

    pub fn with_clock(name: &'static str, clock: Clock) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            name,
            state: RwLock::new(CollectionState {
                records: Arc::new(Vec::new()),
                loaded: false,
                refreshed_at: None,
                revision: 0,
                generation: 0,
            }),
            changes,
            clock,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn read(&self) -> Snapshot<T> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Snapshot {
            records: Arc::clone(&state.records),
            loaded: state.loaded,
            refreshed_at: state.refreshed_at,
            revision: state.revision,
        }
    }

    pub fn get(&self, id: &str) -> Option<T> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.records.iter().find(|r| r.id() == id).cloned()
    }

    pub fn generation(&self) -> Generation {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Generation(state.generation)
    }

    /// Receiver that observes the revision number after every write.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Fetch from `source` and replace the contents wholesale.
    ///
    /// Overlapping refreshes are not ordered: whichever response arrives
    /// last is the one that sticks. A response that arrives after `clear()`
    /// is discarded.
    pub async fn refresh(&self, source: &dyn CollectionSource<T>) -> Result<(), ApiError> {
        let generation = self.generation();
        match source.fetch().await {
            Ok(records) => {
                self.replace_in(generation, records);
                Ok(())
            }
            Err(e) => {
                warn!(cache = self.name, error = %e, "Refresh failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Replace the contents with an authoritative list, marking the cache loaded.
    pub fn replace(&self, records: Vec<T>) {
        self.replace_in(self.generation(), records);
    }

    /// `replace`, unless the cache was cleared since `generation` was taken.
    pub fn replace_in(&self, generation: Generation, records: Vec<T>) -> bool {
        let mut records = dedup_by_id(records);
        records.sort_by(|a, b| a.canonical_cmp(b));
        let now = (self.clock)();

        let Some(mut state) = self.write_in(generation) else {
            return false;
        };
        debug!(cache = self.name, count = records.len(), "Cache replaced");
        state.records = Arc::new(records);
        state.loaded = true;
        state.refreshed_at = Some(now);
        self.bump(&mut state);
        true
    }

    /// Append records whose ids are not already cached. Returns how many were added.
    ///
    /// Merging does not mark the cache loaded; only an authoritative
    /// `replace` does.
    pub fn merge_page(&self, page: Vec<T>) -> usize {
        self.merge_page_in(self.generation(), page).unwrap_or(0)
    }

    /// `merge_page`, or `None` if the cache was cleared since `generation`.
    pub fn merge_page_in(&self, generation: Generation, page: Vec<T>) -> Option<usize> {
        let mut state = self.write_in(generation)?;
        let mut seen: HashSet<String> = state.records.iter().map(|r| r.id().to_string()).collect();
        let fresh: Vec<T> = page
            .into_iter()
            .filter(|r| seen.insert(r.id().to_string()))
            .collect();
        let added = fresh.len();

        let records = Arc::make_mut(&mut state.records);
        records.extend(fresh);
        records.sort_by(|a, b| a.canonical_cmp(b));
        debug!(cache = self.name, added = added, total = state.records.len(), "Page merged");
        self.bump(&mut state);
        Some(added)
    }

    /// Insert or replace a single record by id.
    pub fn upsert(&self, record: T) {
        self.upsert_in(self.generation(), record);
    }

    /// `upsert`, unless the cache was cleared since `generation` was taken.
    pub fn upsert_in(&self, generation: Generation, record: T) -> bool {
        let Some(mut state) = self.write_in(generation) else {
            return false;
        };
        let records = Arc::make_mut(&mut state.records);
        match records.iter_mut().find(|r| r.id() == record.id()) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        records.sort_by(|a, b| a.canonical_cmp(b));
        self.bump(&mut state);
        true
    }

    pub fn remove(&self, id: &str) -> Option<T> {
        let mut state = self.write();
        let position = state.records.iter().position(|r| r.id() == id)?;
        let removed = Arc::make_mut(&mut state.records).remove(position);
        self.bump(&mut state);
        Some(removed)
    }

    /// Reset to empty and mark as never loaded. Called at session end.
    pub fn clear(&self) {
        let mut state = self.write();
        state.records = Arc::new(Vec::new());
        state.loaded = false;
        state.refreshed_at = None;
        state.generation += 1;
        self.bump(&mut state);
    }

    fn write(&self) -> RwLockWriteGuard<'_, CollectionState<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_in(
        &self,
        generation: Generation,
    ) -> Option<RwLockWriteGuard<'_, CollectionState<T>>> {
        let state = self.write();
        if state.generation != generation.0 {
            debug!(cache = self.name, "Cache cleared since request was issued, dropping write");
            return None;
        }
        Some(state)
    }

    fn bump(&self, state: &mut CollectionState<T>) {
        state.revision += 1;
        self.changes.send_replace(state.revision);
    }
}

/// Keep the first occurrence of every id.
fn dedup_by_id<T: Record>(records: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.id().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, WardrobeItem};
    use crate::testing::{event, item, ScriptedSource};

    fn items_cache() -> RemoteCollectionCache<WardrobeItem> {
        RemoteCollectionCache::new("items")
    }

    #[tokio::test]
    async fn test_read_before_load_is_distinct_from_empty_load() {
        let never_loaded = items_cache();
        let loaded_empty = items_cache();
        let source = ScriptedSource::<WardrobeItem>::new(vec![Ok(vec![])]);
        loaded_empty.refresh(&source).await.expect("refresh");

        let a = never_loaded.read();
        let b = loaded_empty.read();
        assert!(a.is_empty() && b.is_empty());
        assert!(!a.loaded);
        assert!(b.loaded);
        assert!(a.refreshed_at.is_none());
        assert!(b.refreshed_at.is_some());
    }

    #[tokio::test]
    async fn test_refresh_replaces_wholesale() {
        let cache = items_cache();
        let source = ScriptedSource::new(vec![
            Ok(vec![item("a"), item("b"), item("c")]),
            Ok(vec![item("c"), item("d")]),
        ]);

        cache.refresh(&source).await.expect("first refresh");
        cache.refresh(&source).await.expect("second refresh");
        assert_eq!(cache.read().ids(), vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let cache = items_cache();
        let server = vec![item("a"), item("b")];
        let source = ScriptedSource::new(vec![Ok(server.clone()), Ok(server)]);

        cache.refresh(&source).await.expect("first refresh");
        let first = cache.read();
        cache.refresh(&source).await.expect("second refresh");
        let second = cache.read();

        assert_eq!(*first.records, *second.records);
        assert_eq!(
            serde_json::to_string(&*first.records).expect("serialize"),
            serde_json::to_string(&*second.records).expect("serialize")
        );
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot() {
        let cache = items_cache();
        let source = ScriptedSource::new(vec![
            Ok(vec![item("a")]),
            Err(ApiError::ServerError("down".into())),
        ]);

        cache.refresh(&source).await.expect("first refresh");
        let before = cache.read();
        assert!(cache.refresh(&source).await.is_err());
        let after = cache.read();

        assert_eq!(after.ids(), vec!["a"]);
        assert!(after.loaded);
        assert_eq!(before.revision, after.revision);
    }

    #[tokio::test]
    async fn test_events_sorted_by_date_ascending() {
        let cache: RemoteCollectionCache<Event> = RemoteCollectionCache::new("events");
        let source = ScriptedSource::new(vec![Ok(vec![
            event("late", "2024-06-20"),
            event("early", "2024-06-01"),
            event("mid", "2024-06-10"),
        ])]);

        cache.refresh(&source).await.expect("refresh");
        assert_eq!(cache.read().ids(), vec!["early", "mid", "late"]);

        cache.upsert(event("first", "2024-05-30"));
        assert_eq!(cache.read().ids(), vec!["first", "early", "mid", "late"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_landing_after_clear_is_dropped() {
        let cache = Arc::new(items_cache());
        let source = Arc::new(
            ScriptedSource::new(vec![Ok(vec![item("old-user")])])
                .with_delay(std::time::Duration::from_secs(5)),
        );

        let pending = {
            let cache = Arc::clone(&cache);
            let source = Arc::clone(&source);
            tokio::spawn(async move { cache.refresh(source.as_ref()).await })
        };
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        cache.clear();
        let revision = cache.read().revision;

        pending.await.expect("join").expect("refresh");
        let snapshot = cache.read();
        assert!(!snapshot.loaded);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.revision, revision);

        let stale = cache.generation();
        cache.clear();
        assert!(!cache.upsert_in(stale, item("late")));
        assert_eq!(cache.merge_page_in(stale, vec![item("late")]), None);
        assert!(cache.read().is_empty());
    }

    #[test]
    fn test_merge_page_does_not_mark_loaded() {
        let cache = items_cache();
        assert_eq!(cache.merge_page(vec![item("a")]), 1);
        assert!(!cache.read().loaded);
        assert_eq!(cache.read().ids(), vec!["a"]);
    }

    #[test]
    fn test_replace_drops_duplicate_ids() {
        let cache = items_cache();
        cache.replace(vec![item("a"), item("b"), item("a")]);
        assert_eq!(cache.read().ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_merge_page_skips_known_ids() {
        let cache = items_cache();
        cache.replace(vec![item("a"), item("b")]);

        let added = cache.merge_page(vec![item("b"), item("c"), item("c"), item("d")]);
        assert_eq!(added, 2);
        assert_eq!(cache.read().ids(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let cache = items_cache();
        cache.replace(vec![item("a"), item("b")]);

        let mut renamed = item("a");
        renamed.name = "Renamed".into();
        cache.upsert(renamed);

        let snapshot = cache.read();
        assert_eq!(snapshot.ids(), vec!["a", "b"]);
        assert_eq!(snapshot.get("a").map(|i| i.name.as_str()), Some("Renamed"));
    }

    #[test]
    fn test_clear_resets_loaded_flag() {
        let cache = items_cache();
        cache.replace(vec![item("a")]);
        cache.clear();

        let snapshot = cache.read();
        assert!(snapshot.is_empty());
        assert!(!snapshot.loaded);
    }

    #[test]
    fn test_snapshots_are_isolated_from_later_writes() {
        let cache = items_cache();
        cache.replace(vec![item("a"), item("b")]);
        let before = cache.read();

        cache.remove("a");
        assert_eq!(before.ids(), vec!["a", "b"]);
        assert_eq!(cache.read().ids(), vec!["b"]);
    }

    #[test]
    fn test_changes_track_revisions() {
        let cache = items_cache();
        let rx = cache.changes();
        cache.replace(vec![item("a")]);
        cache.upsert(item("b"));
        assert_eq!(*rx.borrow(), 2);
        assert!(cache.remove("missing").is_none());
        assert_eq!(*rx.borrow(), 2);
    }
}
