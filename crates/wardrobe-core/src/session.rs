//! The per-user cache service.
//!
//! A `WardrobeSession` is built after sign-in and owns every cache and
//! controller for that user. `clear()` stops polling and resets all of them
//! at sign-out.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::api::WardrobeApi;
use crate::auth::KeyValueStore;
use crate::cache::{
    CollectionSource, ProfileCache, RemoteCollectionCache, Schedules, SignedUrlResolver,
};
use crate::config::Config;
use crate::models::{Event, WardrobeItem};
use crate::preferences::Preferences;
use crate::sync::{
    BulkUploadCoordinator, EventSource, EventStore, ItemStore, OptimisticMutator,
    PaginatedFetcher, PollConfig, PollHandle, PollingController, RefreshHub, RefreshListener,
};

pub type ItemMutator = OptimisticMutator<WardrobeItem, ItemStore>;
pub type EventMutator = OptimisticMutator<Event, EventStore>;

pub struct WardrobeSession {
    items: Arc<RemoteCollectionCache<WardrobeItem>>,
    item_pages: Arc<PaginatedFetcher>,
    item_mutator: Arc<ItemMutator>,
    item_poller: Arc<PollingController<WardrobeItem>>,

    events: Arc<RemoteCollectionCache<Event>>,
    event_source: Arc<EventSource>,
    event_mutator: Arc<EventMutator>,
    event_poller: Arc<PollingController<Event>>,

    signed_urls: SignedUrlResolver,
    schedules: Schedules,
    profile: ProfileCache,
    uploads: BulkUploadCoordinator,
    refresh_hub: RefreshHub,
    preferences: Preferences,
    polls: Mutex<Vec<PollHandle>>,
}

impl WardrobeSession {
    pub fn new(api: Arc<dyn WardrobeApi>, store: Arc<dyn KeyValueStore>, config: &Config) -> Self {
        let poll_config = PollConfig::from_config(config);
        let preferences = Preferences::new(store);

        let items = Arc::new(RemoteCollectionCache::new("items"));
        let item_pages = Arc::new(PaginatedFetcher::new(
            Arc::clone(&api),
            Arc::clone(&items),
            config.page_size,
        ));
        let item_mutator = Arc::new(OptimisticMutator::new(
            Arc::clone(&items),
            ItemStore::new(Arc::clone(&api)),
            Arc::clone(&item_pages) as Arc<dyn CollectionSource<WardrobeItem>>,
        ));
        let item_poller = Arc::new(PollingController::new(
            Arc::clone(&items),
            Arc::clone(&item_pages) as Arc<dyn CollectionSource<WardrobeItem>>,
            poll_config,
        ));

        let events = Arc::new(RemoteCollectionCache::new("events"));
        let event_source = Arc::new(EventSource::new(Arc::clone(&api)));
        let event_mutator = Arc::new(OptimisticMutator::new(
            Arc::clone(&events),
            EventStore::new(Arc::clone(&api)),
            Arc::clone(&event_source) as Arc<dyn CollectionSource<Event>>,
        ));
        let event_poller = Arc::new(PollingController::new(
            Arc::clone(&events),
            Arc::clone(&event_source) as Arc<dyn CollectionSource<Event>>,
            poll_config,
        ));

        let refresh_hub = RefreshHub::new();
        refresh_hub.subscribe(Arc::clone(&item_poller) as Arc<dyn RefreshListener>);
        refresh_hub.subscribe(Arc::clone(&event_poller) as Arc<dyn RefreshListener>);

        Self {
            uploads: BulkUploadCoordinator::new(Arc::clone(&item_mutator), config.max_bulk_uploads),
            signed_urls: SignedUrlResolver::new(Arc::clone(&api), config),
            schedules: Schedules::new(Arc::clone(&api), preferences.clone()),
            profile: ProfileCache::new(api),
            items,
            item_pages,
            item_mutator,
            item_poller,
            events,
            event_source,
            event_mutator,
            event_poller,
            refresh_hub,
            preferences,
            polls: Mutex::new(Vec::new()),
        }
    }

    // ===== Items =====

    pub fn items(&self) -> &Arc<RemoteCollectionCache<WardrobeItem>> {
        &self.items
    }

    pub fn item_pages(&self) -> &Arc<PaginatedFetcher> {
        &self.item_pages
    }

    pub fn item_mutator(&self) -> &Arc<ItemMutator> {
        &self.item_mutator
    }

    pub fn item_poller(&self) -> &Arc<PollingController<WardrobeItem>> {
        &self.item_poller
    }

    pub fn uploads(&self) -> &BulkUploadCoordinator {
        &self.uploads
    }

    pub fn signed_urls(&self) -> &SignedUrlResolver {
        &self.signed_urls
    }

    // ===== Events =====

    pub fn events(&self) -> &Arc<RemoteCollectionCache<Event>> {
        &self.events
    }

    pub fn event_source(&self) -> &Arc<EventSource> {
        &self.event_source
    }

    pub fn event_mutator(&self) -> &Arc<EventMutator> {
        &self.event_mutator
    }

    pub fn event_poller(&self) -> &Arc<PollingController<Event>> {
        &self.event_poller
    }

    // ===== Schedule, profile, preferences =====

    pub fn schedules(&self) -> &Schedules {
        &self.schedules
    }

    pub fn profile(&self) -> &ProfileCache {
        &self.profile
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Hub with the item and event pollers subscribed.
    pub fn refresh_hub(&self) -> &RefreshHub {
        &self.refresh_hub
    }

    // ===== Lifecycle =====

    /// Start background polling for items and events. The loops are owned
    /// by the session and stop on `stop_polling()` or `clear()`.
    pub fn start_polling(&self) {
        let mut polls = self.polls.lock().unwrap_or_else(PoisonError::into_inner);
        if !polls.is_empty() {
            return;
        }
        polls.push(self.item_poller.start());
        polls.push(self.event_poller.start());
    }

    pub fn stop_polling(&self) {
        let handles: Vec<PollHandle> = self
            .polls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in &handles {
            handle.cancel();
        }
    }

    pub fn is_polling(&self) -> bool {
        !self
            .polls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Reset every cache to its never-loaded state. Preferences are kept.
    ///
    /// Responses to requests issued before this call are dropped when they
    /// arrive, and both circuit breakers are closed again.
    pub fn clear(&self) {
        self.stop_polling();
        self.items.clear();
        self.item_pages.reset();
        self.item_mutator.clear();
        self.item_poller.reset();
        self.events.clear();
        self.event_mutator.clear();
        self.event_poller.reset();
        self.signed_urls.clear();
        self.schedules.clear();
        self.profile.clear();
        self.uploads.clear_queue();
        info!("Session caches cleared");
    }
}
