use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::api::{ApiError, WardrobeApi};
use crate::cache::{CollectionSource, Generation, RemoteCollectionCache};
use crate::models::{ItemPage, ItemQuery, WardrobeItem};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub current_page: u32,
    pub total_pages: u32,
    pub total: u32,
}

impl PageCursor {
    pub fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// Page-by-page loader for the item collection.
///
/// Page 1 is the authoritative refresh; later pages are merged into the
/// cache, skipping any id it already holds.
pub struct PaginatedFetcher {
    api: Arc<dyn WardrobeApi>,
    cache: Arc<RemoteCollectionCache<WardrobeItem>>,
    query: ItemQuery,
    cursor: Mutex<PageCursor>,
    in_flight: AtomicBool,
}

impl PaginatedFetcher {
    pub fn new(
        api: Arc<dyn WardrobeApi>,
        cache: Arc<RemoteCollectionCache<WardrobeItem>>,
        page_size: u32,
    ) -> Self {
        Self::with_query(api, cache, ItemQuery::page(1, page_size))
    }

    /// Fetch with filters (category, search, sort) applied to every page.
    pub fn with_query(
        api: Arc<dyn WardrobeApi>,
        cache: Arc<RemoteCollectionCache<WardrobeItem>>,
        query: ItemQuery,
    ) -> Self {
        Self {
            api,
            cache,
            query,
            cursor: Mutex::new(PageCursor::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> &Arc<RemoteCollectionCache<WardrobeItem>> {
        &self.cache
    }

    pub fn cursor(&self) -> PageCursor {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has_more(&self) -> bool {
        self.cursor().has_more()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Replace the cache with page 1.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        self.cache.refresh(self).await
    }

    /// Fetch page `page` and merge it. Returns how many new items were added.
    ///
    /// A page that arrives after the cache was cleared is dropped and counts
    /// as zero added.
    pub async fn load_page(&self, page: u32) -> Result<usize, ApiError> {
        let generation = self.cache.generation();
        let response = self.fetch_page(generation, page).await?;
        let added = self
            .cache
            .merge_page_in(generation, response.items)
            .unwrap_or(0);
        debug!(page = page, added = added, "Merged item page");
        Ok(added)
    }

    /// Load the next page. Does nothing while another load is running or
    /// when every page has been fetched.
    pub async fn load_more(&self) -> Result<usize, ApiError> {
        if !self.has_more() {
            return Ok(0);
        }
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            return Ok(0);
        };
        let next = self.cursor().current_page + 1;
        self.load_page(next).await
    }

    pub fn reset(&self) {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = PageCursor::default();
    }

    /// The cursor only moves if the cache is still in `generation`.
    async fn fetch_page(&self, generation: Generation, page: u32) -> Result<ItemPage, ApiError> {
        let query = ItemQuery {
            page,
            ..self.query.clone()
        };
        let response = self.api.list_items(&query).await?;

        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        if self.cache.generation() != generation {
            return Ok(response);
        }
        *cursor = PageCursor {
            current_page: page,
            total_pages: response.pages,
            total: response.total,
        };
        Ok(response)
    }
}

#[async_trait]
impl CollectionSource<WardrobeItem> for PaginatedFetcher {
    async fn fetch(&self) -> Result<Vec<WardrobeItem>, ApiError> {
        Ok(self.fetch_page(self.cache.generation(), 1).await?.items)
    }
}

/// Clears the in-flight flag when dropped, including on error.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{item, FakeApi};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn fetcher(api: &Arc<FakeApi>, page_size: u32) -> PaginatedFetcher {
        PaginatedFetcher::new(
            Arc::clone(api) as Arc<dyn WardrobeApi>,
            Arc::new(RemoteCollectionCache::new("items")),
            page_size,
        )
    }

    #[tokio::test]
    async fn test_refresh_loads_first_page() {
        let api = Arc::new(FakeApi::with_items(5));
        let fetcher = fetcher(&api, 2);

        fetcher.refresh().await.expect("refresh");
        assert_eq!(fetcher.cache().read().len(), 2);
        assert_eq!(
            fetcher.cursor(),
            PageCursor {
                current_page: 1,
                total_pages: 3,
                total: 5
            }
        );
        assert!(fetcher.has_more());
    }

    #[tokio::test]
    async fn test_load_more_until_exhausted() {
        let api = Arc::new(FakeApi::with_items(5));
        let fetcher = fetcher(&api, 2);
        fetcher.refresh().await.expect("refresh");

        assert_eq!(fetcher.load_more().await.expect("page 2"), 2);
        assert_eq!(fetcher.load_more().await.expect("page 3"), 1);
        assert!(!fetcher.has_more());

        assert_eq!(fetcher.load_more().await.expect("no-op"), 0);
        assert_eq!(api.calls("list_items"), 3);
        assert_eq!(fetcher.cache().read().len(), 5);
    }

    #[tokio::test]
    async fn test_refresh_resets_cursor() {
        let api = Arc::new(FakeApi::with_items(5));
        let fetcher = fetcher(&api, 2);
        fetcher.refresh().await.expect("refresh");
        fetcher.load_more().await.expect("page 2");

        fetcher.refresh().await.expect("refresh again");
        assert_eq!(fetcher.cursor().current_page, 1);
        assert_eq!(fetcher.cache().read().len(), 2);
    }

    #[tokio::test]
    async fn test_load_page_skips_ids_already_cached() {
        let api = Arc::new(FakeApi::with_items(4));
        let fetcher = fetcher(&api, 2);
        fetcher.refresh().await.expect("refresh");

        // Server order shifted: page 2 now repeats an id from page 1.
        api.insert_item_front(item("new-front"));
        let added = fetcher.load_page(2).await.expect("page 2");
        assert_eq!(added, 1);

        let ids = fetcher.cache().read().ids();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(ids.len(), unique.len());
    }

    #[tokio::test]
    async fn test_failed_page_keeps_cursor() {
        let api = Arc::new(FakeApi::with_items(5));
        let fetcher = fetcher(&api, 2);
        fetcher.refresh().await.expect("refresh");

        api.fail_next("list_items", 1);
        assert!(fetcher.load_more().await.is_err());
        assert_eq!(fetcher.cursor().current_page, 1);
        assert!(!fetcher.is_loading());
        assert_eq!(fetcher.load_more().await.expect("retry"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_arriving_after_clear_is_dropped() {
        let api = Arc::new(FakeApi::with_items(5));
        let fetcher = Arc::new(fetcher(&api, 2));
        fetcher.refresh().await.expect("refresh");

        api.set_latency(std::time::Duration::from_secs(5));
        let loader = Arc::clone(&fetcher);
        let pending = tokio::spawn(async move { loader.load_more().await });
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        fetcher.cache().clear();
        fetcher.reset();

        assert_eq!(pending.await.expect("join").expect("load more"), 0);
        assert!(fetcher.cache().read().is_empty());
        assert!(!fetcher.cache().read().loaded);
        assert_eq!(fetcher.cursor(), PageCursor::default());
    }

    #[tokio::test]
    async fn test_load_page_alone_does_not_mark_loaded() {
        let api = Arc::new(FakeApi::with_items(5));
        let fetcher = fetcher(&api, 2);

        assert_eq!(fetcher.load_page(2).await.expect("page 2"), 2);
        assert_eq!(fetcher.cache().read().len(), 2);
        assert!(!fetcher.cache().read().loaded);

        fetcher.refresh().await.expect("refresh");
        assert!(fetcher.cache().read().loaded);
    }

    #[test]
    fn test_in_flight_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let guard = InFlight::acquire(&flag);
        assert!(guard.is_some());
        assert!(InFlight::acquire(&flag).is_none());
        drop(guard);
        assert!(InFlight::acquire(&flag).is_some());
    }

    proptest! {
        #[test]
        fn test_merged_pages_never_duplicate(
            first in proptest::collection::vec(0u8..30, 0..20),
            pages in proptest::collection::vec(proptest::collection::vec(0u8..30, 0..20), 0..6),
        ) {
            let cache = RemoteCollectionCache::new("items");
            cache.replace(first.iter().map(|n| item(&n.to_string())).collect());
            for page in &pages {
                cache.merge_page(page.iter().map(|n| item(&n.to_string())).collect());
            }

            let ids = cache.read().ids();
            let unique: HashSet<_> = ids.iter().cloned().collect();
            prop_assert_eq!(ids.len(), unique.len());

            let expected: HashSet<String> = first
                .iter()
                .chain(pages.iter().flatten())
                .map(|n| n.to_string())
                .collect();
            prop_assert_eq!(unique, expected);
        }
    }
}
